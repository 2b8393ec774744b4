use std::fmt;
use std::io::Error;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

use crate::stats;

pub const HELP_TEXT: &str = "\
 q          Quit
 Tab/S-Tab  Next / previous tab
 1 2 3      Dashboard / Analysis / Data
 f          Cycle sidebar focus (countries, poverty, literacy)
 Up/Down    Move the country cursor, or pick the slider's low/high bound
 Left/Right Move the focused slider bound
 PgUp/PgDn  Scroll the data table
 Space      Toggle the country under the cursor
 /          Search countries
 m / M      Next / previous ranking metric
 x / y      Cycle scatter X / Y axis
 r          Reset all filters
 s          Save filtered data as CSV
 c          Copy filtered data to the clipboard
 ?          Show this help
 Esc        Close popup";

#[derive(Debug)]
pub enum JoyError {
    IoError(Error),
    PolarsError(PolarsError),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
    SchemaMismatch(String),
    UnknownField(String),
    EmptyView,
    Clipboard(String),
}

impl fmt::Display for JoyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoyError::IoError(e) => write!(f, "I/O error: {e}"),
            JoyError::PolarsError(e) => write!(f, "data error: {e}"),
            JoyError::LoadingFailed(msg) => write!(f, "loading failed: {msg}"),
            JoyError::FileNotFound => write!(f, "file not found"),
            JoyError::PermissionDenied => write!(f, "permission denied"),
            JoyError::UnknownFileType => write!(f, "unknown file type, expected a .csv file"),
            JoyError::SchemaMismatch(msg) => write!(f, "schema mismatch: {msg}"),
            JoyError::UnknownField(name) => write!(f, "unknown field \"{name}\""),
            JoyError::EmptyView => write!(f, "no rows match the current filters"),
            JoyError::Clipboard(msg) => write!(f, "clipboard: {msg}"),
        }
    }
}

impl std::error::Error for JoyError {}

impl From<Error> for JoyError {
    fn from(err: Error) -> Self {
        JoyError::IoError(err)
    }
}

impl From<PolarsError> for JoyError {
    fn from(err: PolarsError) -> Self {
        JoyError::PolarsError(err)
    }
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct DashboardConfig {
    pub event_poll_time: u64,
    pub max_column_width: usize,
    /// Rows shown in the ranking when no country is selected.
    pub top_n: usize,
    /// Rows in the poverty breakdown when no country is selected.
    pub breakdown_n: usize,
    pub slider_step: f64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            max_column_width: 24,
            top_n: stats::TOP_N,
            breakdown_n: stats::BREAKDOWN_N,
            slider_step: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Dashboard,
    Analysis,
    Data,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::Dashboard, Tab::Analysis, Tab::Data];

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Dashboard => "Dashboard",
            Tab::Analysis => "Analysis",
            Tab::Data => "Data",
        }
    }

    pub fn index(&self) -> usize {
        Tab::ALL.iter().position(|t| t == self).unwrap_or(0)
    }

    pub fn next(&self) -> Tab {
        Tab::ALL[(self.index() + 1) % Tab::ALL.len()]
    }

    pub fn previous(&self) -> Tab {
        Tab::ALL[(self.index() + Tab::ALL.len() - 1) % Tab::ALL.len()]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    NextTab,
    PreviousTab,
    SelectTab(Tab),
    CycleFocus,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    ScrollUp,
    ScrollDown,
    ToggleCountry,
    Search,
    NextMetric,
    PreviousMetric,
    CycleXAxis,
    CycleYAxis,
    ResetFilters,
    SaveCsv,
    CopyCsv,
    Help,
    Exit,
    RawKey(KeyEvent),
}
