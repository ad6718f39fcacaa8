// src/export/mod.rs
use arrow::{csv::WriterBuilder, record_batch::RecordBatch};
use parquet::{
    arrow::ArrowWriter,
    basic::Compression,
    file::properties::WriterProperties,
};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

use crate::config::OutputFormat;
use crate::error::{EtlError, Result, Stage};

/// Anything that leaves the pipeline as one named table.
pub trait Table {
    fn table_name(&self) -> &str;
    fn to_record_batch(&self) -> Result<RecordBatch>;
}

/// A named batch, ready to write.
#[derive(Debug, Clone)]
pub struct NamedBatch {
    pub name: String,
    pub batch: RecordBatch,
}

impl NamedBatch {
    pub fn from_table(table: &dyn Table) -> Result<Self> {
        Ok(Self {
            name: table.table_name().to_string(),
            batch: table.to_record_batch()?,
        })
    }
}

fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file = File::create(path)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(BufWriter::new(file), batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

fn write_csv(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = WriterBuilder::new()
        .with_header(true)
        .build(BufWriter::new(file));
    writer.write(batch)?;
    writer.into_inner().flush()?;
    Ok(())
}

fn remove_all(paths: &[PathBuf]) {
    for p in paths {
        if let Err(e) = fs::remove_file(p) {
            warn!(path = %p.display(), error = %e, "could not remove temporary file");
        }
    }
}

/// Write every table as `<dir>/<name>.<ext>`.
///
/// 1) each table goes to a hidden `.<name>.<ext>.tmp`
/// 2) only once all of them are written are they renamed into place
///
/// On any failure the temporaries are removed, so a failed export adds no
/// table files to `dir`.
#[tracing::instrument(level = "info", skip(tables), fields(tables = tables.len()))]
pub fn export_tables(
    tables: &[NamedBatch],
    dir: &Path,
    format: OutputFormat,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let ext = format.extension();

    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(tables.len());
    for t in tables {
        let final_path = dir.join(format!("{}.{}", t.name, ext));
        let tmp_path = dir.join(format!(".{}.{}.tmp", t.name, ext));

        let written = match format {
            OutputFormat::Parquet => write_parquet(&tmp_path, &t.batch),
            OutputFormat::Csv => write_csv(&tmp_path, &t.batch),
        };
        if let Err(e) = written {
            let mut leftovers: Vec<PathBuf> = staged.into_iter().map(|(tmp, _)| tmp).collect();
            if tmp_path.exists() {
                leftovers.push(tmp_path);
            }
            remove_all(&leftovers);
            return Err(EtlError::stage(
                Stage::Export,
                format!("writing `{}`: {}", t.name, e),
            ));
        }
        debug!(table = %t.name, rows = t.batch.num_rows(), "table staged");
        staged.push((tmp_path, final_path));
    }

    let mut done = Vec::with_capacity(staged.len());
    for (i, (tmp, final_path)) in staged.iter().enumerate() {
        if let Err(e) = fs::rename(tmp, final_path) {
            let rest: Vec<PathBuf> = staged[i..].iter().map(|(t, _)| t.clone()).collect();
            remove_all(&rest);
            return Err(EtlError::stage(
                Stage::Export,
                format!("renaming {} → {}: {}", tmp.display(), final_path.display(), e),
            ));
        }
        done.push(final_path.clone());
    }

    info!(dir = %dir.display(), format = ext, files = done.len(), "export complete");
    Ok(done)
}
