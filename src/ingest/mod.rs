// src/ingest/mod.rs
pub mod raw_table;

pub use raw_table::RawTable;

use csv::ReaderBuilder;
use std::{fs::File, io::Read, path::Path};
use tracing::{debug, warn};

use crate::error::{EtlError, Result};

/// Parse a headed CSV stream into a [`RawTable`].
///
/// Records are read as bytes and decoded lossily, and ragged records are
/// padded or truncated to the header width, so a damaged line costs its
/// own cells and never the row.
pub fn read_csv<R: Read>(reader: R, path: &Path) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .byte_headers()
        .map_err(|source| EtlError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .iter()
        .map(|h| {
            String::from_utf8_lossy(h)
                .trim_start_matches('\u{feff}')
                .trim()
                .to_string()
        })
        .collect();

    let width = headers.len();
    let mut rows = Vec::new();
    let mut ragged = 0usize;

    for (idx, result) in rdr.byte_records().enumerate() {
        let record = result.map_err(|source| EtlError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if record.len() != width {
            ragged += 1;
            debug!(record = idx, fields = record.len(), width, "ragged record");
        }
        let mut row: Vec<String> = record
            .iter()
            .take(width)
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .collect();
        row.resize(width, String::new());
        rows.push(row);
    }

    if ragged > 0 {
        warn!(path = %path.display(), ragged, "records with unexpected field count");
    }

    Ok(RawTable { headers, rows })
}

/// Load a feed file. A missing file is reported as [`EtlError::MissingInput`]
/// so the caller can decide whether the feed was required.
#[tracing::instrument(level = "info", skip(feed, path), fields(feed = %feed, path = %path.as_ref().display()))]
pub fn load_csv(feed: &str, path: impl AsRef<Path>) -> Result<RawTable> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(EtlError::MissingInput {
            feed: feed.to_string(),
            path: path.to_path_buf(),
        });
    }
    let file = File::open(path)?;
    let table = read_csv(file, path)?;
    debug!(rows = table.num_rows(), columns = table.headers.len(), "loaded");
    Ok(table)
}
