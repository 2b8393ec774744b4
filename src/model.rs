use arboard::Clipboard;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::domain::{DashboardConfig, JoyError, Message, Tab};
use crate::export::{self, ExportCache};
use crate::filter::{self, Criteria, FilteredView, SelectionMode};
use crate::inputter::{self, InputResult, Inputter};
use crate::schema::Indicator;
use crate::stats::{self, Breakdown, Correlation, Ranked, Summary};
use crate::table::Table;

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Focus {
    Countries,
    Slider(Indicator),
}

impl Focus {
    fn next(&self) -> Focus {
        match self {
            Focus::Countries => Focus::Slider(Indicator::SLIDERS[0]),
            Focus::Slider(current) => match Indicator::SLIDERS.iter().position(|i| i == current) {
                Some(idx) if idx + 1 < Indicator::SLIDERS.len() => {
                    Focus::Slider(Indicator::SLIDERS[idx + 1])
                }
                _ => Focus::Countries,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Lo,
    Hi,
}

/// Every panel derived from one filtered view.
#[derive(Debug, Clone, PartialEq)]
pub struct Panels {
    pub mode: SelectionMode,
    pub view: FilteredView,
    pub summary: Summary,
    pub ranking: Vec<Ranked>,
    pub breakdown: Option<Breakdown>,
    pub scatter: Vec<(f64, f64)>,
    pub correlation: Correlation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Dashboard {
    /// Nothing matched; the UI shows a single message instead of the panels.
    Empty,
    Ready(Box<Panels>),
}

impl Dashboard {
    pub fn compute(
        table: &Table,
        criteria: &Criteria,
        metric: Indicator,
        axes: (&str, &str),
        config: &DashboardConfig,
    ) -> Result<Dashboard, JoyError> {
        let start_time = Instant::now();
        let view = filter::apply(table, criteria)?;
        if view.is_empty() {
            debug!("Filters matched no rows");
            return Ok(Dashboard::Empty);
        }
        let mode = criteria.mode();
        let panels = Panels {
            summary: stats::summary(table, &view, &mode)?,
            ranking: stats::rank(table, &view, metric, &mode, config.top_n)?,
            breakdown: stats::poverty_breakdown(table, &view, &mode, config.breakdown_n)?,
            scatter: stats::scatter(table, &view, axes.0, axes.1)?,
            correlation: stats::correlation(table, &view)?,
            mode,
            view,
        };
        trace!(
            "Dashboard over {} rows took {}us",
            panels.view.len(),
            start_time.elapsed().as_micros()
        );
        Ok(Dashboard::Ready(Box::new(panels)))
    }

    pub fn panels(&self) -> Option<&Panels> {
        match self {
            Dashboard::Empty => None,
            Dashboard::Ready(panels) => Some(panels.as_ref()),
        }
    }
}

pub struct Model {
    config: DashboardConfig,
    table: Arc<Table>,
    pub status: Status,
    tab: Tab,
    focus: Focus,
    bound: Bound,
    criteria: Criteria,
    slider_bounds: Vec<(Indicator, (f64, f64))>,
    countries: Vec<String>,
    country_cursor: usize,
    input: Inputter,
    last_input: InputResult,
    active_search: bool,
    metric: Indicator,
    x_axis: String,
    y_axis: String,
    data_offset: usize,
    dashboard: Dashboard,
    export_cache: ExportCache,
    export_path: PathBuf,
    clipboard: Option<Clipboard>,
    show_help: bool,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(
        table: Arc<Table>,
        config: &DashboardConfig,
        export_path: PathBuf,
    ) -> Result<Self, JoyError> {
        let criteria = Criteria::defaults(&table)?;
        let slider_bounds = Indicator::SLIDERS
            .iter()
            .map(|&i| filter::slider_bounds(&table, i).map(|b| (i, b)))
            .collect::<Result<Vec<_>, JoyError>>()?;
        let (x_axis, y_axis) = stats::default_axes(&table)?;
        let countries = table.countries();

        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            tab: Tab::Dashboard,
            focus: Focus::Countries,
            bound: Bound::Lo,
            criteria,
            slider_bounds,
            countries,
            country_cursor: 0,
            input: Inputter::default(),
            last_input: InputResult::default(),
            active_search: false,
            metric: Indicator::ALL[0],
            x_axis,
            y_axis,
            data_offset: 0,
            dashboard: Dashboard::Empty,
            export_cache: ExportCache::default(),
            export_path,
            clipboard: None,
            show_help: false,
            status_message: String::new(),
            last_status_message_update: Instant::now(),
            table,
        };
        model.refresh()?;
        model.set_status_message(format!(
            "Loaded {} countries from {}",
            model.table.nrows(),
            model.table.name()
        ));
        Ok(model)
    }

    fn refresh(&mut self) -> Result<(), JoyError> {
        self.dashboard = Dashboard::compute(
            &self.table,
            &self.criteria,
            self.metric,
            (self.x_axis.as_str(), self.y_axis.as_str()),
            &self.config,
        )?;
        let nrows = self.dashboard.panels().map(|p| p.view.len()).unwrap_or(0);
        self.data_offset = self.data_offset.min(nrows.saturating_sub(1));
        Ok(())
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_search
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), JoyError> {
        let Some(msg) = message else {
            return Ok(());
        };
        trace!("Update: {:?}", msg);

        if self.show_help {
            match msg {
                Message::Quit => self.quit(),
                Message::Exit | Message::Help => self.show_help = false,
                _ => (),
            }
            return Ok(());
        }

        if self.active_search {
            if let Message::RawKey(key) = msg {
                self.search_input(key);
            }
            return Ok(());
        }

        match msg {
            Message::Quit => self.quit(),
            Message::NextTab => self.tab = self.tab.next(),
            Message::PreviousTab => self.tab = self.tab.previous(),
            Message::SelectTab(tab) => self.tab = tab,
            Message::CycleFocus => {
                self.focus = self.focus.next();
                self.bound = Bound::Lo;
            }
            Message::MoveUp => self.move_up(),
            Message::MoveDown => self.move_down(),
            Message::MoveLeft => self.nudge_slider(-self.config.slider_step),
            Message::MoveRight => self.nudge_slider(self.config.slider_step),
            Message::ScrollUp => self.data_offset = self.data_offset.saturating_sub(10),
            Message::ScrollDown => self.data_offset += 10,
            Message::ToggleCountry => self.toggle_country(),
            Message::Search => self.enter_search(),
            Message::NextMetric => self.metric = self.metric.next(),
            Message::PreviousMetric => self.metric = self.metric.previous(),
            Message::CycleXAxis => self.x_axis = self.next_axis(&self.x_axis),
            Message::CycleYAxis => self.y_axis = self.next_axis(&self.y_axis),
            Message::ResetFilters => self.reset_filters()?,
            Message::SaveCsv => self.save_csv(),
            Message::CopyCsv => self.copy_csv(),
            Message::Help => self.show_help = true,
            Message::Exit | Message::RawKey(_) => (),
        }

        // Every interaction recomputes the whole dashboard from scratch.
        // A failed recomputation blanks the panels but keeps the session.
        if let Err(e) = self.refresh() {
            error!("Recomputing the dashboard failed: {e}");
            self.dashboard = Dashboard::Empty;
            self.set_status_message(format!("Error: {e}"));
        }
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn move_up(&mut self) {
        match self.focus {
            Focus::Countries => self.country_cursor = self.country_cursor.saturating_sub(1),
            Focus::Slider(_) => self.bound = Bound::Lo,
        }
    }

    fn move_down(&mut self) {
        match self.focus {
            Focus::Countries => {
                let n = self.visible_countries().len();
                if self.country_cursor + 1 < n {
                    self.country_cursor += 1;
                }
            }
            Focus::Slider(_) => self.bound = Bound::Hi,
        }
    }

    fn nudge_slider(&mut self, delta: f64) {
        let Focus::Slider(field) = self.focus else {
            return;
        };
        let Some(bounds) = self.slider_bounds(field) else {
            return;
        };
        let bound = self.bound;
        if let Some(range) = self.criteria.range_mut(field) {
            match bound {
                Bound::Lo => range.nudge_lo(delta, bounds),
                Bound::Hi => range.nudge_hi(delta, bounds),
            }
            trace!("Slider {:?} now [{}, {}]", field, range.lo, range.hi);
        }
    }

    fn toggle_country(&mut self) {
        let Some(country) = self.visible_countries().get(self.country_cursor).cloned() else {
            return;
        };
        self.criteria.toggle_country(&country);
        debug!("Selection: {:?}", self.criteria.countries);
    }

    fn enter_search(&mut self) {
        trace!("Entering country search ...");
        self.focus = Focus::Countries;
        self.active_search = true;
        self.input.clear();
        self.last_input = self.input.get();
    }

    fn search_input(&mut self, key: ratatui::crossterm::event::KeyEvent) {
        self.last_input = self.input.read(key);
        self.country_cursor = 0;
        if self.last_input.finished {
            self.active_search = false;
            let found = self.visible_countries().len();
            self.set_status_message(if self.last_input.query.is_empty() {
                "Showing all countries".to_string()
            } else {
                format!("{found} countries match \"{}\"", self.last_input.query)
            });
        }
    }

    fn next_axis(&self, current: &str) -> String {
        let numeric = self.table.numeric_columns();
        let idx = numeric.iter().position(|c| *c == current).unwrap_or(0);
        numeric
            .get((idx + 1) % numeric.len().max(1))
            .map(|s| s.to_string())
            .unwrap_or_else(|| current.to_string())
    }

    fn reset_filters(&mut self) -> Result<(), JoyError> {
        self.criteria = Criteria::defaults(&self.table)?;
        self.input.clear();
        self.last_input = self.input.get();
        self.country_cursor = 0;
        self.data_offset = 0;
        self.set_status_message("Filters reset");
        Ok(())
    }

    fn current_view(&self) -> Option<FilteredView> {
        self.dashboard.panels().map(|p| p.view.clone())
    }

    fn save_csv(&mut self) {
        let Some(view) = self.current_view() else {
            self.set_status_message("Nothing to save, no rows match the filters");
            return;
        };
        let result = self
            .export_cache
            .get_or_render(&self.table, &view)
            .and_then(|bytes| export::write_file(&self.export_path, &bytes));
        match result {
            Ok(()) => {
                info!("Saved {} rows to {:?}", view.len(), self.export_path);
                debug!(
                    "Export cache holds {} renderings, {} hits",
                    self.export_cache.len(),
                    self.export_cache.hits()
                );
                self.set_status_message(format!(
                    "Saved {} rows to {}",
                    view.len(),
                    self.export_path.display()
                ));
            }
            Err(e) => {
                warn!("Saving failed: {e}");
                self.set_status_message(format!("Saving failed: {e}"));
            }
        }
    }

    fn copy_csv(&mut self) {
        let Some(view) = self.current_view() else {
            self.set_status_message("Nothing to copy, no rows match the filters");
            return;
        };
        let result = self
            .export_cache
            .get_or_render(&self.table, &view)
            .and_then(|bytes| {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                if self.clipboard.is_none() {
                    self.clipboard =
                        Some(Clipboard::new().map_err(|e| JoyError::Clipboard(e.to_string()))?);
                }
                match self.clipboard.as_mut() {
                    Some(clipboard) => clipboard
                        .set_text(text)
                        .map_err(|e| JoyError::Clipboard(e.to_string())),
                    None => Err(JoyError::Clipboard("unavailable".into())),
                }
            });
        match result {
            Ok(()) => self.set_status_message(format!("Copied {} rows to clipboard", view.len())),
            Err(e) => {
                trace!("Error copying to clipboard: {:?}", e);
                self.set_status_message(format!("{e}"));
            }
        }
    }

    // ----------------------------- Accessors ------------------------------ //

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn bound(&self) -> Bound {
        self.bound
    }

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    pub fn metric(&self) -> Indicator {
        self.metric
    }

    pub fn axes(&self) -> (&str, &str) {
        (self.x_axis.as_str(), self.y_axis.as_str())
    }

    pub fn data_offset(&self) -> usize {
        self.data_offset
    }

    pub fn slider_bounds(&self, field: Indicator) -> Option<(f64, f64)> {
        self.slider_bounds
            .iter()
            .find(|(i, _)| *i == field)
            .map(|(_, b)| *b)
    }

    /// Countries that match the current search query.
    pub fn visible_countries(&self) -> Vec<String> {
        self.countries
            .iter()
            .filter(|c| inputter::matches(&self.last_input.query, c))
            .cloned()
            .collect()
    }

    pub fn country_cursor(&self) -> usize {
        self.country_cursor
    }

    pub fn search(&self) -> (bool, &InputResult) {
        (self.active_search, &self.last_input)
    }

    pub fn show_help(&self) -> bool {
        self.show_help
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn status_age(&self) -> std::time::Duration {
        self.last_status_message_update.elapsed()
    }
}
