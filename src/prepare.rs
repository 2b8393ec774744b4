use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::domain::JoyError;
use crate::schema;
use crate::table::Table;

/// Raw columns that the dashboard never shows.
pub const DROPPED_COLUMNS: [&str; 3] = [
    "Region",
    "Offline_School_Enrollment(%)",
    "Online_Education_Access(%)",
];

/// Fill every null with zero, numeric or textual depending on the column.
pub fn fill_missing(frame: DataFrame) -> Result<DataFrame, JoyError> {
    let fills: Vec<Expr> = frame
        .get_columns()
        .iter()
        .filter(|c| c.null_count() > 0)
        .map(|c| {
            let name = c.name().clone();
            let zero = if schema::is_numeric_type(c.dtype()) {
                lit(0)
            } else {
                lit("0")
            };
            col(name.clone()).fill_null(zero).alias(name)
        })
        .collect();
    if fills.is_empty() {
        return Ok(frame);
    }
    info!("Filling nulls in {} columns", fills.len());
    Ok(frame.lazy().with_columns(fills).collect()?)
}

/// Drops the listed columns. Every one of them has to exist; a raw file
/// that lacks one is rejected instead of being passed through.
pub fn drop_columns(frame: DataFrame, names: &[&str]) -> Result<DataFrame, JoyError> {
    let present = frame.get_column_names_str();
    let missing: Vec<&str> = names
        .iter()
        .copied()
        .filter(|n| !present.contains(n))
        .collect();
    if !missing.is_empty() {
        return Err(JoyError::SchemaMismatch(format!(
            "columns to drop are missing: {missing:?}"
        )));
    }
    let mut frame = frame;
    for name in names {
        frame = frame.drop(name)?;
    }
    Ok(frame)
}

/// Raw CSV in, cleaned CSV out. The output is written next to its final
/// location first and renamed, so a failed run leaves nothing behind.
pub fn prepare(input: &Path, output: &Path) -> Result<DataFrame, JoyError> {
    if !input.is_file() {
        return Err(JoyError::FileNotFound);
    }
    let raw = Table::load_csv(input)?.collect()?;
    info!("Read {} rows x {} columns from {:?}", raw.height(), raw.width(), input);

    let filled = fill_missing(raw)?;
    let mut cleaned = drop_columns(filled, &DROPPED_COLUMNS)?;

    let staging = staging_path(output);
    let written = fs::File::create(&staging)
        .map_err(JoyError::from)
        .and_then(|file| {
            CsvWriter::new(file)
                .include_header(true)
                .finish(&mut cleaned)
                .map_err(JoyError::from)
        })
        .and_then(|_| fs::rename(&staging, output).map_err(JoyError::from));
    if let Err(e) = written {
        warn!("Writing {:?} failed: {e}", output);
        let _ = fs::remove_file(&staging);
        return Err(e);
    }

    info!("Cleaned data columns: {:?}", cleaned.get_column_names_str());
    Ok(cleaned)
}

fn staging_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    output.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Indicator;

    fn raw_frame() -> DataFrame {
        df!(
            "Country" => [Some("Finland"), None, Some("Chad")],
            "Region" => ["Europe", "Asia", "Africa"],
            "Literacy_Rate(%)" => [Some(100.0), Some(90.0), None],
            "Offline_School_Enrollment(%)" => [1.0, 2.0, 3.0],
            "Online_Education_Access(%)" => [4.0, 5.0, 6.0],
            "Poverty_Rate(%)  " => [Some(0.4), None, Some(38.4)],
        )
        .unwrap()
    }

    #[test]
    fn fill_missing_replaces_nulls_with_zero() {
        let filled = fill_missing(raw_frame()).unwrap();
        assert_eq!(filled.column("Literacy_Rate(%)").unwrap().null_count(), 0);
        let literacy: Vec<Option<f64>> = filled
            .column("Literacy_Rate(%)")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(literacy, vec![Some(100.0), Some(90.0), Some(0.0)]);
        let country: Vec<Option<&str>> = filled
            .column("Country")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(country, vec![Some("Finland"), Some("0"), Some("Chad")]);
    }

    #[test]
    fn drop_columns_removes_the_listed_columns() {
        let cleaned = drop_columns(raw_frame(), &DROPPED_COLUMNS).unwrap();
        assert_eq!(
            cleaned.get_column_names_str(),
            vec!["Country", "Literacy_Rate(%)", "Poverty_Rate(%)  "]
        );
    }

    #[test]
    fn drop_columns_rejects_missing_names() {
        let frame = raw_frame().drop("Region").unwrap();
        match drop_columns(frame, &DROPPED_COLUMNS) {
            Err(JoyError::SchemaMismatch(msg)) => assert!(msg.contains("Region")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn prepare_fixture_produces_loadable_table() {
        let output = std::env::temp_dir().join(format!("joy-clean-{}.csv", std::process::id()));
        let cleaned = prepare(Path::new("tests/fixtures/raw_countries.csv"), &output).unwrap();
        assert!(!cleaned.get_column_names_str().contains(&"Region"));
        assert!(!staging_path(&output).exists());

        let table = Table::load(&output).unwrap();
        assert_eq!(table.nrows(), 4);
        let _ = fs::remove_file(&output);
    }

    fn write_raw(name: &str, header: &str, rows: &[String]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("joy-{name}-{}.csv", std::process::id()));
        let mut text = format!("{header}\n");
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        fs::write(&path, text).unwrap();
        path
    }

    const RAW_HEADER: &str = "Country,Region,Literacy_Rate(%),GDP_per_Capita_USD,\
        Unemployment_Rate(%),Poverty_Rate(%)  ,Happiness_Score,\
        Offline_School_Enrollment(%),Online_Education_Access(%)";

    #[test]
    fn late_fractional_values_are_read_as_float() {
        // Whole numbers only for the first 120 rows.
        let rows: Vec<String> = (0..150)
            .map(|i| {
                let literacy = if i < 120 { "99" } else { "94.3" };
                format!("C{i:03},Europe,{literacy},1000,5,10,6,90,50")
            })
            .collect();
        let input = write_raw("late-raw", RAW_HEADER, &rows);
        let output = std::env::temp_dir().join(format!("joy-late-{}.csv", std::process::id()));

        let cleaned = prepare(&input, &output).unwrap();
        assert_eq!(cleaned.height(), 150);
        let table = Table::load(&output).unwrap();
        let literacy = table.indicator(Indicator::Literacy).unwrap();
        assert_eq!(literacy[0], 99.0);
        assert_eq!(literacy[149], 94.3);

        let _ = fs::remove_file(&input);
        let _ = fs::remove_file(&output);
    }

    #[test]
    fn prepare_without_region_writes_nothing() {
        let header = RAW_HEADER.replace("Region,", "");
        let rows = vec![
            "Finland,100,53983,6.8,0.5,7.8,99,95".to_string(),
            "Chad,26.8,717,1.1,38.1,4.4,,12".to_string(),
        ];
        let input = write_raw("noregion-raw", &header, &rows);
        let output = std::env::temp_dir().join(format!("joy-noregion-{}.csv", std::process::id()));

        match prepare(&input, &output) {
            Err(JoyError::SchemaMismatch(msg)) => assert!(msg.contains("Region")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!output.exists());
        assert!(!staging_path(&output).exists());
        let _ = fs::remove_file(&input);
    }

    #[test]
    fn prepare_missing_input_writes_nothing() {
        let output = std::env::temp_dir().join(format!("joy-none-{}.csv", std::process::id()));
        assert!(matches!(
            prepare(Path::new("tests/fixtures/nope.csv"), &output),
            Err(JoyError::FileNotFound)
        ));
        assert!(!output.exists());
    }
}
