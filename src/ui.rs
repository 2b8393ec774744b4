use std::time::{Duration, Instant};
use tracing::trace;

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::{self, border},
    text::{Line, Span, Text},
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Cell, Chart, Clear, Dataset, GraphType, List,
        ListItem, ListState, Paragraph, Row, Table as TableWidget, Tabs, Wrap,
    },
};

use crate::domain::{DashboardConfig, HELP_TEXT, Tab};
use crate::export::EXPORT_FILE_NAME;
use crate::filter::RangeFilter;
use crate::model::{Bound, Dashboard, Focus, Model, Panels};
use crate::schema::Indicator;
use crate::stats::{Correlation, Summary};

pub const SIDEBAR_WIDTH: u16 = 34;
pub const SLIDER_HEIGHT: u16 = 4;
pub const STATUSLINE_HEIGHT: u16 = 1;
pub const STATUS_FADE: Duration = Duration::from_secs(8);
pub const CORRELATION_COLUMN_WIDTH: usize = 10;

const NO_DATA: &str =
    "No data available for the selected filters. Please adjust the sidebar filters.";
const NEED_MORE_DATA: &str =
    "Correlation heatmap requires at least two data points. Please select more countries.";

pub struct TableUI {
    max_column_width: usize,
    last_draw: Instant,
}

impl TableUI {
    pub fn new(config: &DashboardConfig) -> Self {
        Self {
            max_column_width: config.max_column_width,
            last_draw: Instant::now(),
        }
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let [title_area, tabs_area, body_area, status_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(STATUSLINE_HEIGHT),
        ])
        .areas(frame.area());

        frame.render_widget(
            Paragraph::new(Line::from(" Finding Joy in Data ".bold())).centered(),
            title_area,
        );
        self.render_tabs(model, frame, tabs_area);

        let [sidebar_area, main_area] =
            Layout::horizontal([Constraint::Length(SIDEBAR_WIDTH), Constraint::Fill(1)])
                .areas(body_area);
        self.render_sidebar(model, frame, sidebar_area);

        match model.dashboard() {
            Dashboard::Empty => render_no_data(frame, main_area),
            Dashboard::Ready(panels) => match model.tab() {
                Tab::Dashboard => self.render_dashboard(model, panels, frame, main_area),
                Tab::Analysis => self.render_analysis(model, panels, frame, main_area),
                Tab::Data => self.render_data(model, panels, frame, main_area),
            },
        }

        self.render_statusline(model, frame, status_area);
        if model.show_help() {
            render_help(frame);
        }

        trace!("Frame drawn {}ms after the previous one", self.last_draw.elapsed().as_millis());
        self.last_draw = Instant::now();
    }

    fn render_tabs(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let titles = Tab::ALL
            .iter()
            .enumerate()
            .map(|(i, t)| Line::from(format!(" {} {} ", i + 1, t.title())));
        let tabs = Tabs::new(titles)
            .select(model.tab().index())
            .block(Block::bordered().border_set(border::ROUNDED))
            .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
        frame.render_widget(tabs, area);
    }

    // ------------------------------ Sidebar ------------------------------- //

    fn render_sidebar(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let [list_area, poverty_area, literacy_area] = Layout::vertical([
            Constraint::Fill(1),
            Constraint::Length(SLIDER_HEIGHT),
            Constraint::Length(SLIDER_HEIGHT),
        ])
        .areas(area);

        self.render_country_list(model, frame, list_area);
        for (field, slider_area) in Indicator::SLIDERS.iter().zip([poverty_area, literacy_area]) {
            self.render_slider(model, *field, frame, slider_area);
        }
    }

    fn render_country_list(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let selected = &model.criteria().countries;
        let focused = model.focus() == Focus::Countries;
        let items: Vec<ListItem> = model
            .visible_countries()
            .into_iter()
            .map(|c| {
                let mark = if selected.contains(&c) { "[x] " } else { "[ ] " };
                let style = if selected.contains(&c) {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default()
                };
                ListItem::new(Line::from(vec![Span::raw(mark), Span::styled(c, style)]))
            })
            .collect();

        let (searching, input) = model.search();
        let title = if searching || !input.query.is_empty() {
            format!(" Countries /{} ", input.query)
        } else if selected.is_empty() {
            " Countries (all) ".to_string()
        } else {
            format!(" Countries ({} selected) ", selected.len())
        };
        let list = List::new(items)
            .block(focus_block(title, focused))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");
        let mut state = ListState::default().with_selected(Some(model.country_cursor()));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn render_slider(&self, model: &Model, field: Indicator, frame: &mut Frame, area: Rect) {
        let (Some(range), Some(bounds)) = (model.criteria().range(field), model.slider_bounds(field))
        else {
            return;
        };
        let focused = model.focus() == Focus::Slider(field);
        let active = |b: Bound| {
            if focused && model.bound() == b {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            }
        };

        let width = area.width.saturating_sub(2) as usize;
        let lines = vec![
            Line::from(slider_track(range, bounds, width)),
            Line::from(vec![
                Span::styled(format!("{:.0}", range.lo), active(Bound::Lo)),
                Span::raw(" .. "),
                Span::styled(format!("{:.0}", range.hi), active(Bound::Hi)),
                Span::raw(format!("  of {:.0}..{:.0}", bounds.0, bounds.1)).dim(),
            ]),
        ];
        let title = format!(" {} (%) ", field.label());
        frame.render_widget(Paragraph::new(lines).block(focus_block(title, focused)), area);
    }

    // ----------------------------- Dashboard ------------------------------ //

    fn render_dashboard(&self, model: &Model, panels: &Panels, frame: &mut Frame, area: Rect) {
        let [cards_area, charts_area] =
            Layout::vertical([Constraint::Length(4), Constraint::Fill(1)]).areas(area);
        render_metric_cards(&panels.summary, frame, cards_area);

        match &panels.breakdown {
            Some(_) => {
                let [ranking_area, breakdown_area] = Layout::horizontal([
                    Constraint::Percentage(60),
                    Constraint::Percentage(40),
                ])
                .areas(charts_area);
                render_ranking(model, panels, frame, ranking_area);
                render_breakdown(panels, frame, breakdown_area);
            }
            None => render_ranking(model, panels, frame, charts_area),
        }
    }

    // ------------------------------ Analysis ------------------------------ //

    fn render_analysis(&self, model: &Model, panels: &Panels, frame: &mut Frame, area: Rect) {
        let [scatter_area, corr_area] =
            Layout::vertical([Constraint::Percentage(55), Constraint::Percentage(45)]).areas(area);
        render_scatter(model, panels, frame, scatter_area);
        render_correlation(&panels.correlation, frame, corr_area);
    }

    // -------------------------------- Data -------------------------------- //

    fn render_data(&self, model: &Model, panels: &Panels, frame: &mut Frame, area: Rect) {
        let table = model.table();
        let visible_rows = area.height.saturating_sub(3) as usize;
        let begin = model.data_offset();
        let end = std::cmp::min(begin + visible_rows, panels.view.len());

        let widths: Vec<Constraint> = table
            .columns()
            .iter()
            .map(|c| Constraint::Length(std::cmp::min(c.max_width(), self.max_column_width) as u16))
            .collect();
        let header = Row::new(
            table
                .columns()
                .iter()
                .map(|c| Cell::from(get_visible_name(c.name(), self.max_column_width))),
        )
        .style(Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED));

        let rows = panels.view.rows()[begin..end].iter().map(|&r| {
            Row::new(
                (0..table.columns().len())
                    .map(|c| Cell::from(get_visible_name(table.cell(r, c), self.max_column_width))),
            )
        });

        let title = format!(
            " Filtered Data: rows {}-{} of {} ",
            if end > begin { begin + 1 } else { 0 },
            end,
            panels.view.len()
        );
        let hint = Line::from(vec![
            " Save as ".into(),
            EXPORT_FILE_NAME.yellow(),
            " <s>  Copy CSV <c> ".into(),
        ]);
        let widget = TableWidget::new(rows, widths)
            .header(header)
            .column_spacing(1)
            .block(
                Block::bordered()
                    .title(Line::from(title).bold())
                    .title_bottom(hint.centered()),
            );
        frame.render_widget(widget, area);
    }

    fn render_statusline(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let (searching, input) = model.search();
        if searching {
            let prompt = format!("/{}", input.query);
            frame.render_widget(Paragraph::new(prompt), area);
            frame.set_cursor_position((area.x + 1 + input.cursor as u16, area.y));
            return;
        }

        let [message_area, keys_area] =
            Layout::horizontal([Constraint::Fill(1), Constraint::Length(20)]).areas(area);
        let mut message = Span::raw(model.status_message());
        if model.status_age() > STATUS_FADE {
            message = message.dim();
        }
        frame.render_widget(Paragraph::new(Line::from(message)), message_area);
        frame.render_widget(
            Paragraph::new(Line::from(vec!["?".blue().bold(), " help  ".into(), "q".blue().bold(), " quit".into()]))
                .right_aligned(),
            keys_area,
        );
    }
}

fn focus_block<'a>(title: String, focused: bool) -> Block<'a> {
    let block = Block::bordered().title(Line::from(title));
    if focused {
        block
            .border_set(border::THICK)
            .border_style(Style::default().fg(Color::Yellow))
    } else {
        block.border_set(border::PLAIN)
    }
}

/// Text track with the selected range drawn heavy between the two handles.
fn slider_track(range: &RangeFilter, bounds: (f64, f64), width: usize) -> String {
    if width < 2 {
        return String::new();
    }
    let span = (bounds.1 - bounds.0).max(f64::EPSILON);
    let pos = |v: f64| (((v - bounds.0) / span) * (width - 1) as f64).round() as usize;
    let (lo, hi) = (pos(range.lo), pos(range.hi));
    (0..width)
        .map(|i| {
            if i == lo || i == hi {
                '●'
            } else if i > lo && i < hi {
                '━'
            } else {
                '─'
            }
        })
        .collect()
}

pub(crate) fn get_visible_name(name: &str, width: usize) -> String {
    if width < 3 {
        return String::new();
    }
    if name.chars().count() > width {
        let mut reduced: String = name.chars().take(width - 3).collect();
        reduced.push_str("...");
        reduced
    } else {
        name.to_string()
    }
}

pub(crate) fn format_value(indicator: Indicator, value: f64) -> String {
    if value.is_nan() {
        "n/a".to_string()
    } else if indicator.is_percentage() {
        format!("{value:.2} %")
    } else {
        format!("{value:.2}")
    }
}

fn render_no_data(frame: &mut Frame, area: Rect) {
    let text = Text::from(vec![Line::from(""), Line::from(NO_DATA.yellow().bold())]);
    frame.render_widget(
        Paragraph::new(text)
            .centered()
            .wrap(Wrap { trim: true })
            .block(Block::bordered().border_set(border::THICK)),
        area,
    );
}

fn render_metric_cards(summary: &Summary, frame: &mut Frame, area: Rect) {
    let cards: Vec<(String, String)> = match summary {
        Summary::Country {
            literacy,
            unemployment,
            poverty,
            happiness,
            ..
        } => vec![
            (Indicator::Literacy, *literacy),
            (Indicator::Unemployment, *unemployment),
            (Indicator::Poverty, *poverty),
            (Indicator::Happiness, *happiness),
        ]
        .into_iter()
        .map(|(i, v)| (i.label().to_string(), format_value(i, v)))
        .collect(),
        Summary::Average {
            literacy,
            unemployment,
            poverty,
        } => vec![
            (Indicator::Literacy, *literacy),
            (Indicator::Unemployment, *unemployment),
            (Indicator::Poverty, *poverty),
        ]
        .into_iter()
        .map(|(i, v)| (format!("AVG. {}", i.label()), format_value(i, v)))
        .collect(),
    };

    let areas = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(vec![Constraint::Ratio(1, cards.len() as u32); cards.len()])
        .split(area);
    for ((label, value), card_area) in cards.into_iter().zip(areas.iter()) {
        let card = Paragraph::new(Line::from(Span::from(value).bold().green()))
            .centered()
            .block(Block::bordered().title(Line::from(format!(" {label} ")).centered()));
        frame.render_widget(card, *card_area);
    }
}

/// Bar values are integers, so the chart works in hundredths.
fn bar_value(value: f64) -> u64 {
    if value.is_nan() || value <= 0.0 {
        0
    } else {
        (value * 100.0).round() as u64
    }
}

fn render_ranking(model: &Model, panels: &Panels, frame: &mut Frame, area: Rect) {
    let metric = model.metric();
    let bars: Vec<Bar> = panels
        .ranking
        .iter()
        .map(|r| {
            Bar::default()
                .value(bar_value(r.value))
                .label(Line::from(get_visible_name(&r.country, 14)))
                .text_value(format_value(metric, r.value))
        })
        .collect();

    let scope = if panels.ranking.len() < panels.view.len() {
        format!("top {}", panels.ranking.len())
    } else {
        format!("{} countries", panels.ranking.len())
    };
    let title = Line::from(vec![
        " Country Rankings by ".into(),
        metric.label().yellow().bold(),
        format!(" ({scope}) ").into(),
    ]);
    let chart = BarChart::default()
        .block(
            Block::bordered()
                .title(title)
                .title_bottom(Line::from(" <m> next metric  <M> previous ").centered()),
        )
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(0)
        .bar_style(Style::default().fg(Color::Cyan))
        .value_style(Style::default().fg(Color::Black).bg(Color::Cyan))
        .data(BarGroup::default().bars(&bars));
    frame.render_widget(chart, area);
}

fn render_breakdown(panels: &Panels, frame: &mut Frame, area: Rect) {
    let Some(breakdown) = &panels.breakdown else {
        return;
    };
    let bars: Vec<Bar> = breakdown
        .shares
        .iter()
        .map(|s| {
            Bar::default()
                .value(bar_value(s.percent))
                .label(Line::from(get_visible_name(&s.country, 14)))
                .text_value(format!("{:.1}%", s.percent))
        })
        .collect();
    let chart = BarChart::default()
        .block(Block::bordered().title(Line::from(format!(" {} ", breakdown.title))))
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(0)
        .max(10_000)
        .bar_style(Style::default().fg(Color::Magenta))
        .value_style(Style::default().fg(Color::Black).bg(Color::Magenta))
        .data(BarGroup::default().bars(&bars));
    frame.render_widget(chart, area);
}

fn axis_bounds(values: impl Iterator<Item = f64>) -> [f64; 2] {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() {
        [0.0, 1.0]
    } else if lo == hi {
        [lo - 1.0, hi + 1.0]
    } else {
        [lo, hi]
    }
}

fn axis_labels(bounds: [f64; 2]) -> Vec<String> {
    let mid = (bounds[0] + bounds[1]) / 2.0;
    [bounds[0], mid, bounds[1]]
        .iter()
        .map(|v| format!("{v:.1}"))
        .collect()
}

fn render_scatter(model: &Model, panels: &Panels, frame: &mut Frame, area: Rect) {
    let (x_name, y_name) = model.axes();
    let points: Vec<(f64, f64)> = panels
        .scatter
        .iter()
        .copied()
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();
    let x_bounds = axis_bounds(points.iter().map(|p| p.0));
    let y_bounds = axis_bounds(points.iter().map(|p| p.1));

    let dataset = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Scatter)
        .style(Style::default().fg(Color::Cyan))
        .data(&points);
    let label = |name: &str| {
        Indicator::from_column(name)
            .map_or(name.trim_end(), |i| i.label())
            .to_string()
    };
    let title = format!(" {} vs. {} ", label(y_name), label(x_name));
    let chart = Chart::new(vec![dataset])
        .block(
            Block::bordered()
                .title(Line::from(title).bold())
                .title_bottom(Line::from(" <x> / <y> change axes ").centered()),
        )
        .x_axis(
            Axis::default()
                .title(x_name.to_string())
                .style(Style::default().fg(Color::Gray))
                .bounds(x_bounds)
                .labels(axis_labels(x_bounds)),
        )
        .y_axis(
            Axis::default()
                .title(y_name.to_string())
                .style(Style::default().fg(Color::Gray))
                .bounds(y_bounds)
                .labels(axis_labels(y_bounds)),
        );
    frame.render_widget(chart, area);
}

/// Viridis-like ramp from -1 (purple) over 0 (teal) to 1 (yellow).
fn heat_color(value: f64) -> Color {
    if value.is_nan() {
        return Color::DarkGray;
    }
    let lerp = |a: (f64, f64, f64), b: (f64, f64, f64), t: f64| {
        Color::Rgb(
            (a.0 + (b.0 - a.0) * t) as u8,
            (a.1 + (b.1 - a.1) * t) as u8,
            (a.2 + (b.2 - a.2) * t) as u8,
        )
    };
    let low = (68.0, 1.0, 84.0);
    let mid = (33.0, 145.0, 140.0);
    let high = (253.0, 231.0, 37.0);
    let t = (value.clamp(-1.0, 1.0) + 1.0) / 2.0;
    if t < 0.5 {
        lerp(low, mid, t * 2.0)
    } else {
        lerp(mid, high, (t - 0.5) * 2.0)
    }
}

fn render_correlation(correlation: &Correlation, frame: &mut Frame, area: Rect) {
    let block = Block::bordered().title(Line::from(" Correlation Matrix of Numeric Features ").bold());
    let Correlation::Matrix { fields, values } = correlation else {
        frame.render_widget(
            Paragraph::new(NEED_MORE_DATA).wrap(Wrap { trim: true }).block(block),
            area,
        );
        return;
    };

    let header = Row::new(
        std::iter::once(Cell::from(""))
            .chain(fields.iter().map(|f| Cell::from(get_visible_name(f.trim_end(), CORRELATION_COLUMN_WIDTH)))),
    )
    .style(Style::default().add_modifier(Modifier::BOLD));
    let rows = fields.iter().zip(values).map(|(field, row)| {
        let cells = row.iter().map(|&v| {
            let fg = if v > 0.3 { Color::Black } else { Color::White };
            Cell::from(format!("{v:>6.2}")).style(Style::default().bg(heat_color(v)).fg(fg))
        });
        Row::new(
            std::iter::once(Cell::from(get_visible_name(field.trim_end(), 20)).bold()).chain(cells),
        )
    });
    let widths = std::iter::once(Constraint::Length(20))
        .chain(fields.iter().map(|_| Constraint::Length(CORRELATION_COLUMN_WIDTH as u16)));
    frame.render_widget(
        TableWidget::new(rows, widths)
            .header(header)
            .column_spacing(1)
            .block(block),
        area,
    );
}

fn render_help(frame: &mut Frame) {
    let area = frame.area();
    let width = std::cmp::min(area.width, 72);
    let height = std::cmp::min(area.height, HELP_TEXT.lines().count() as u16 + 2);
    let popup = Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    };
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(HELP_TEXT).block(
            Block::bordered()
                .title(Line::from(" Help ").bold().centered())
                .title_bottom(Line::from(" <Esc> close ").centered())
                .border_set(border::DOUBLE),
        ),
        popup,
    );
}
