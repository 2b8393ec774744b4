use polars::prelude::*;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, trace};

use crate::domain::JoyError;
use crate::schema::{self, COUNTRY_COLUMN, Indicator};

#[derive(Debug)]
pub enum ColumnData {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

pub struct Column {
    idx: usize,
    name: String,
    dtype: DataType,
    data: ColumnData,
    display: Vec<String>,
    max_width: usize,
}

impl Column {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.data, ColumnData::Numeric(_))
    }

    pub fn max_width(&self) -> usize {
        self.max_width
    }

    pub fn as_string(&self) -> String {
        format!(
            "{} \"{}\", {:?}, width_max: {}, # rows {}",
            self.idx,
            self.name,
            self.dtype,
            self.max_width,
            self.display.len(),
        )
    }
}

/// The session's dataset. Built once from the cleaned CSV and never mutated;
/// every stage borrows it.
pub struct Table {
    name: String,
    frame: DataFrame,
    columns: Vec<Column>,
    country_idx: usize,
    nrows: usize,
}

impl Table {
    pub fn load(path: &Path) -> Result<Self, JoyError> {
        let path = Table::check_file(path)?;
        let start_time = Instant::now();
        let frame = Table::load_csv(&path)?.collect()?;
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string();
        let table = Table::from_frame(name, frame)?;
        info!(
            "Loaded {} rows x {} columns from {:?} in {}ms",
            table.nrows,
            table.columns.len(),
            path,
            start_time.elapsed().as_millis()
        );
        debug!("Columns: {:?}", table.column_names());
        Ok(table)
    }

    pub fn from_frame(name: impl Into<String>, frame: DataFrame) -> Result<Self, JoyError> {
        let dtypes: Vec<(String, DataType)> = frame
            .get_columns()
            .iter()
            .map(|c| (c.name().to_string(), c.dtype().clone()))
            .collect();
        schema::validate(&dtypes)?;

        // Each column is converted on its own thread.
        let converted: Result<Vec<Column>, PolarsError> = frame
            .get_column_names()
            .par_iter()
            .enumerate()
            .map(|(idx, name)| Table::load_column(&frame, idx, name))
            .collect();
        let columns = converted?;
        for c in columns.iter() {
            debug!("Column: {}", c.as_string());
        }

        let country_idx = columns
            .iter()
            .position(|c| c.name == COUNTRY_COLUMN)
            .ok_or_else(|| JoyError::SchemaMismatch(format!("missing column \"{COUNTRY_COLUMN}\"")))?;

        Ok(Table {
            name: name.into(),
            nrows: frame.height(),
            frame,
            columns,
            country_idx,
        })
    }

    fn load_column(df: &DataFrame, idx: usize, col_name: &str) -> Result<Column, PolarsError> {
        let source = df.column(col_name)?;
        let dtype = source.dtype().clone();

        let as_text = source.cast(&DataType::String)?;
        let mut max_width = col_name.len();
        let display: Vec<String> = as_text
            .str()?
            .into_iter()
            .map(|value| {
                let s = match value {
                    Some(s) => s.replace("\r\n", " ↵ ").replace('\n', " ↵ "),
                    None => String::from("∅"),
                };
                max_width = max_width.max(s.chars().count());
                s
            })
            .collect();

        let data = if schema::is_numeric_type(&dtype) {
            let as_float = source.cast(&DataType::Float64)?;
            let values = as_float
                .f64()?
                .into_iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect();
            ColumnData::Numeric(values)
        } else {
            let values = as_text
                .str()?
                .into_iter()
                .map(|v| v.unwrap_or_default().to_string())
                .collect();
            ColumnData::Text(values)
        };

        trace!("Converted column {idx} \"{col_name}\" ({dtype:?})");
        Ok(Column {
            idx,
            name: col_name.to_string(),
            dtype,
            data,
            display,
            max_width,
        })
    }

    fn check_file(path: &Path) -> Result<PathBuf, JoyError> {
        let metadata = fs::metadata(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => JoyError::FileNotFound,
            ErrorKind::PermissionDenied => JoyError::PermissionDenied,
            _ => JoyError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(JoyError::LoadingFailed("Not a file!".into()));
        }
        match path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_uppercase())
            .as_deref()
        {
            Some("CSV") => Ok(path.to_path_buf()),
            _ => Err(JoyError::UnknownFileType),
        }
    }

    /// Dtypes are inferred from every row; a column that turns fractional
    /// after the first hundred rows is still read as float.
    pub(crate) fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyCsvReader::new(PlPath::Local(path.into()))
            .with_has_header(true)
            .with_infer_schema_length(None)
            .finish()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Names of all numeric columns in table order.
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_numeric())
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn numeric(&self, name: &str) -> Result<&[f64], JoyError> {
        match self.columns.iter().find(|c| c.name == name).map(|c| &c.data) {
            Some(ColumnData::Numeric(values)) => Ok(values),
            _ => Err(JoyError::UnknownField(name.to_string())),
        }
    }

    /// Indicator columns are guaranteed by schema validation at load time.
    pub fn indicator(&self, indicator: Indicator) -> Result<&[f64], JoyError> {
        self.numeric(indicator.column())
    }

    pub fn country(&self, row: usize) -> &str {
        match &self.columns[self.country_idx].data {
            ColumnData::Text(values) => &values[row],
            ColumnData::Numeric(_) => "",
        }
    }

    /// Sorted, de-duplicated country names for the selector.
    pub fn countries(&self) -> Vec<String> {
        let unique: BTreeSet<&str> = (0..self.nrows)
            .map(|r| self.country(r))
            .filter(|c| !c.is_empty())
            .collect();
        unique.into_iter().map(String::from).collect()
    }

    /// Global `[min, max]` of a numeric column over the full table.
    pub fn bounds(&self, name: &str) -> Result<(f64, f64), JoyError> {
        let values = self.numeric(name)?;
        let bounds = values
            .iter()
            .filter(|v| !v.is_nan())
            .fold(None, |acc: Option<(f64, f64)>, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            });
        Ok(bounds.unwrap_or((0.0, 0.0)))
    }

    pub fn cell(&self, row: usize, column: usize) -> &str {
        &self.columns[column].display[row]
    }
}
