use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};
use ratatui::DefaultTerminal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

mod controller;
mod domain;
mod export;
mod filter;
mod inputter;
mod model;
mod prepare;
mod schema;
mod stats;
mod table;
mod ui;

use controller::Controller;
use domain::{DashboardConfig, JoyError};
use export::EXPORT_FILE_NAME;
use filter::Criteria;
use model::{Model, Status};
use schema::Indicator;
use table::Table;
use ui::TableUI;

const DEFAULT_DATA_FILE: &str = "cleandata.csv";
const LOG_ENV: &str = "JOY_LOG";

#[derive(Parser, Debug)]
#[command(name = "joy", version, about = "Finding joy in country-level socioeconomic data")]
struct Cli {
    /// File receiving the application log
    #[arg(long, global = true, default_value = "joy.log")]
    log_file: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the interactive dashboard (default)
    View {
        #[arg(default_value = DEFAULT_DATA_FILE)]
        path: String,
        /// Where the Data tab saves the filtered rows
        #[arg(short, long, default_value = EXPORT_FILE_NAME)]
        output: String,
        /// Countries shown in the ranking when nothing is selected
        #[arg(long, default_value_t = 10)]
        top_n: usize,
    },
    /// Clean a raw CSV: fill missing values and drop unused columns
    Prepare { input: String, output: String },
    /// Filter the cleaned CSV and write the matching rows without the dashboard
    Export {
        #[arg(default_value = DEFAULT_DATA_FILE)]
        path: String,
        /// Restrict to a country, may be repeated
        #[arg(long = "country")]
        countries: Vec<String>,
        /// Poverty rate range as LO:HI
        #[arg(long, value_parser = parse_range)]
        poverty: Option<(f64, f64)>,
        /// Literacy rate range as LO:HI
        #[arg(long, value_parser = parse_range)]
        literacy: Option<(f64, f64)>,
        #[arg(short, long, default_value = EXPORT_FILE_NAME)]
        output: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Err(e) => {
            error!("Exiting with error: {e:?}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(cli: Cli) -> Result<(), JoyError> {
    init_logging(&expand(&cli.log_file)?)?;
    info!("Starting joy!");

    let command = cli.command.unwrap_or(Command::View {
        path: DEFAULT_DATA_FILE.to_string(),
        output: EXPORT_FILE_NAME.to_string(),
        top_n: DashboardConfig::default().top_n,
    });
    match command {
        Command::View {
            path,
            output,
            top_n,
        } => {
            let config = DashboardConfig::default().with_top_n(top_n);
            view(&expand(&path)?, expand(&output)?, &config)
        }
        Command::Prepare { input, output } => {
            let cleaned = prepare::prepare(&expand(&input)?, &expand(&output)?)?;
            println!("Wrote {} rows to {output}", cleaned.height());
            Ok(())
        }
        Command::Export {
            path,
            countries,
            poverty,
            literacy,
            output,
        } => {
            let table = Table::load(&expand(&path)?)?;
            let rows = export_filtered(&table, &countries, poverty, literacy, &expand(&output)?)?;
            println!("Wrote {rows} rows to {output}");
            Ok(())
        }
    }
}

/// Logs go to a file, the terminal belongs to the dashboard.
fn init_logging(log_file: &Path) -> Result<(), JoyError> {
    let file = File::create(log_file)?;
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(false),
        )
        .with(tracing_error::ErrorLayer::default())
        .init();
    Ok(())
}

fn expand(path: &str) -> Result<PathBuf, JoyError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| JoyError::LoadingFailed(format!("{path}: {e}")))
}

fn parse_range(s: &str) -> Result<(f64, f64), String> {
    let (lo, hi) = s
        .split_once(':')
        .ok_or_else(|| format!("expected LO:HI, got \"{s}\""))?;
    let lo: f64 = lo.trim().parse().map_err(|e| format!("invalid low bound: {e}"))?;
    let hi: f64 = hi.trim().parse().map_err(|e| format!("invalid high bound: {e}"))?;
    if lo > hi {
        return Err(format!("low bound {lo} is above high bound {hi}"));
    }
    Ok((lo, hi))
}

fn view(path: &Path, export_path: PathBuf, config: &DashboardConfig) -> Result<(), JoyError> {
    let table = Arc::new(Table::load(path)?);
    let mut model = Model::init(table, config, export_path)?;
    let mut ui = TableUI::new(config);
    let controller = Controller::new(config);

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &mut model, &mut ui, &controller);
    ratatui::restore();
    result
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    model: &mut Model,
    ui: &mut TableUI,
    controller: &Controller,
) -> Result<(), JoyError> {
    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(model)?;
        model.update(message)?;
    }
    info!("Bye");
    Ok(())
}

/// Headless Filter and Export. Returns the number of rows written.
fn export_filtered(
    table: &Table,
    countries: &[String],
    poverty: Option<(f64, f64)>,
    literacy: Option<(f64, f64)>,
    output: &Path,
) -> Result<usize, JoyError> {
    let mut criteria = Criteria::defaults(table)?;
    let known = table.countries();
    for country in countries {
        if !known.contains(country) {
            warn!("Country {country:?} is not in {}", table.name());
        }
        criteria.toggle_country(country);
    }
    for (field, range) in [(Indicator::Poverty, poverty), (Indicator::Literacy, literacy)] {
        if let (Some((lo, hi)), Some(filter)) = (range, criteria.range_mut(field)) {
            filter.lo = lo;
            filter.hi = hi;
        }
    }

    let view = filter::apply(table, &criteria)?;
    if view.is_empty() {
        return Err(JoyError::EmptyView);
    }
    let bytes = export::to_csv_bytes(table, &view)?;
    export::write_file(output, &bytes)?;
    Ok(view.len())
}
