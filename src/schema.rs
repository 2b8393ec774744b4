use polars::prelude::DataType;
use tracing::{debug, error};

use crate::domain::JoyError;

pub const COUNTRY_COLUMN: &str = "Country";

/// The indicators the dashboard knows by name. Their header strings are part
/// of the input file format and are matched verbatim, including the two
/// trailing spaces of the poverty column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Indicator {
    Literacy,
    GdpPerCapita,
    Unemployment,
    Poverty,
    Happiness,
}

impl Indicator {
    /// Ranking order offered by the metric selector.
    pub const ALL: [Indicator; 5] = [
        Indicator::Literacy,
        Indicator::GdpPerCapita,
        Indicator::Unemployment,
        Indicator::Poverty,
        Indicator::Happiness,
    ];

    /// Indicators with a range slider in the sidebar.
    pub const SLIDERS: [Indicator; 2] = [Indicator::Poverty, Indicator::Literacy];

    pub fn column(&self) -> &'static str {
        match self {
            Indicator::Literacy => "Literacy_Rate(%)",
            Indicator::GdpPerCapita => "GDP_per_Capita_USD",
            Indicator::Unemployment => "Unemployment_Rate(%)",
            Indicator::Poverty => "Poverty_Rate(%)  ",
            Indicator::Happiness => "Happiness_Score",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Indicator::Literacy => "Literacy Rate",
            Indicator::GdpPerCapita => "GDP per Capita",
            Indicator::Unemployment => "Unemployment Rate",
            Indicator::Poverty => "Poverty Rate",
            Indicator::Happiness => "Happiness Score",
        }
    }

    pub fn is_percentage(&self) -> bool {
        !matches!(self, Indicator::GdpPerCapita | Indicator::Happiness)
    }

    pub fn from_column(name: &str) -> Option<Indicator> {
        Indicator::ALL.into_iter().find(|i| i.column() == name)
    }

    pub fn next(&self) -> Indicator {
        let idx = Indicator::ALL.iter().position(|i| i == self).unwrap_or(0);
        Indicator::ALL[(idx + 1) % Indicator::ALL.len()]
    }

    pub fn previous(&self) -> Indicator {
        let n = Indicator::ALL.len();
        let idx = Indicator::ALL.iter().position(|i| i == self).unwrap_or(0);
        Indicator::ALL[(idx + n - 1) % n]
    }
}

pub fn is_numeric_type(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Checks the loaded columns against the cleaned-file contract: a textual
/// `Country` column plus every indicator as a numeric column.
pub fn validate(columns: &[(String, DataType)]) -> Result<(), JoyError> {
    let lookup = |name: &str| columns.iter().find(|(n, _)| n == name).map(|(_, d)| d);

    match lookup(COUNTRY_COLUMN) {
        Some(DataType::String) => {}
        Some(other) => {
            error!("Column \"{COUNTRY_COLUMN}\" has type {other:?}");
            return Err(JoyError::SchemaMismatch(format!(
                "column \"{COUNTRY_COLUMN}\" must be text, found {other:?}"
            )));
        }
        None => {
            return Err(JoyError::SchemaMismatch(format!(
                "missing column \"{COUNTRY_COLUMN}\""
            )));
        }
    }

    for indicator in Indicator::ALL {
        let name = indicator.column();
        match lookup(name) {
            Some(dtype) if is_numeric_type(dtype) => {}
            Some(dtype) => {
                return Err(JoyError::SchemaMismatch(format!(
                    "column \"{name}\" must be numeric, found {dtype:?}"
                )));
            }
            None => {
                return Err(JoyError::SchemaMismatch(format!("missing column \"{name}\"")));
            }
        }
    }
    debug!("Schema ok: {} columns", columns.len());
    Ok(())
}
