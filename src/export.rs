use polars::prelude::*;
use std::fs;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::domain::JoyError;
use crate::filter::FilteredView;
use crate::table::Table;

pub const EXPORT_FILE_NAME: &str = "filtered_data.csv";
pub const EXPORT_MIME: &str = "text/csv";

/// Serializes the view as CSV: header row, table column order, no index.
pub fn to_csv_bytes(table: &Table, view: &FilteredView) -> Result<Vec<u8>, JoyError> {
    let mut keep = vec![false; table.nrows()];
    for &row in view.rows() {
        keep[row] = true;
    }
    let mask: BooleanChunked = keep.into_iter().collect();
    let mut frame = table.frame().filter(&mask)?;

    let mut buffer: Vec<u8> = Vec::new();
    CsvWriter::new(&mut buffer)
        .include_header(true)
        .finish(&mut frame)?;
    trace!("Serialized {} rows into {} bytes", view.len(), buffer.len());
    Ok(buffer)
}

/// CSV bytes of the most recently exported view, so saving and copying an
/// unchanged selection serializes it once. Holds a single entry.
#[derive(Default)]
pub struct ExportCache {
    last: Option<(u64, Arc<Vec<u8>>)>,
    hits: usize,
}

impl ExportCache {
    fn key(view: &FilteredView) -> u64 {
        let mut hasher = DefaultHasher::new();
        view.rows().hash(&mut hasher);
        hasher.finish()
    }

    pub fn get_or_render(
        &mut self,
        table: &Table,
        view: &FilteredView,
    ) -> Result<Arc<Vec<u8>>, JoyError> {
        let key = ExportCache::key(view);
        if let Some((cached, bytes)) = &self.last
            && *cached == key
        {
            self.hits += 1;
            debug!("Export cache hit ({} rows)", view.len());
            return Ok(Arc::clone(bytes));
        }
        let bytes = Arc::new(to_csv_bytes(table, view)?);
        self.last = Some((key, Arc::clone(&bytes)));
        Ok(bytes)
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn len(&self) -> usize {
        usize::from(self.last.is_some())
    }
}

pub fn write_file(path: &Path, bytes: &[u8]) -> Result<(), JoyError> {
    fs::write(path, bytes)?;
    info!("Wrote {} bytes ({EXPORT_MIME}) to {:?}", bytes.len(), path);
    Ok(())
}
