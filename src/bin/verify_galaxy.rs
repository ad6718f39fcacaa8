// src/bin/verify_galaxy.rs
use anyhow::{bail, Context, Result};
use arrow::{
    array::{Array, Int32Array},
    record_batch::RecordBatch,
};
use glob::glob;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use rayon::prelude::*;
use std::{
    collections::{BTreeMap, HashSet},
    fs::File,
    path::{Path, PathBuf},
};

/// Table name → batches, read in parallel.
fn read_tables(dir: &Path) -> Result<BTreeMap<String, Vec<RecordBatch>>> {
    let pattern = format!("{}/*.parquet", dir.display());
    let paths: Vec<PathBuf> = glob(&pattern)
        .with_context(|| format!("Failed to read glob pattern '{}'", pattern))?
        .filter_map(|entry| entry.ok())
        .collect();
    if paths.is_empty() {
        bail!("No Parquet files found under '{}'", pattern);
    }

    paths
        .par_iter()
        .map(|path| -> Result<(String, Vec<RecordBatch>)> {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            let reader = ParquetRecordBatchReaderBuilder::try_new(file)
                .with_context(|| format!("reading footer of {}", path.display()))?
                .build()?;
            let batches = reader
                .collect::<std::result::Result<Vec<_>, _>>()
                .with_context(|| format!("decoding {}", path.display()))?;
            Ok((name, batches))
        })
        .collect()
}

fn int32_values(batches: &[RecordBatch], column: &str) -> Vec<Option<i32>> {
    let mut out = Vec::new();
    for b in batches {
        let Some(arr) = b.column_by_name(column) else { continue };
        if let Some(a) = arr.as_any().downcast_ref::<Int32Array>() {
            out.extend(a.iter());
        }
    }
    out
}

fn int32_key_columns(batches: &[RecordBatch]) -> Vec<String> {
    batches
        .first()
        .map(|b| {
            b.schema()
                .fields()
                .iter()
                .filter(|f| f.name().ends_with("_key") && f.data_type() == &arrow::datatypes::DataType::Int32)
                .map(|f| f.name().clone())
                .collect()
        })
        .unwrap_or_default()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data/processed/galaxy_schema"));
    let tables = read_tables(&dir)?;
    tracing::info!(tables = tables.len(), dir = %dir.display(), "loaded");

    let mut problems: Vec<String> = Vec::new();

    // 1) Dimension keys: surrogate keys dense 1..N, date keys unique
    let mut key_sets: BTreeMap<String, HashSet<i32>> = BTreeMap::new();
    for (name, batches) in tables.iter().filter(|(n, _)| n.starts_with("dim_")) {
        let Some(key_col) = batches.first().map(|b| b.schema().field(0).name().clone()) else {
            continue;
        };
        let values = int32_values(batches, &key_col);
        let keys: Vec<i32> = values.iter().flatten().copied().collect();
        if keys.len() != values.len() {
            problems.push(format!("{name}: null {key_col}"));
        }
        let set: HashSet<i32> = keys.iter().copied().collect();
        if set.len() != keys.len() {
            problems.push(format!("{name}: duplicate {key_col}"));
        }
        if key_col != "date_key" {
            let mut sorted = keys.clone();
            sorted.sort_unstable();
            let dense = sorted.iter().enumerate().all(|(i, k)| *k == i as i32 + 1);
            if !dense {
                problems.push(format!("{name}: {key_col} is not dense 1..{}", keys.len()));
            }
        }
        key_sets.insert(key_col, set);
    }

    // 2) Foreign keys in facts and bridges resolve or are null
    for (name, batches) in tables
        .iter()
        .filter(|(n, _)| n.starts_with("fact_") || n.starts_with("bridge_"))
    {
        for column in int32_key_columns(batches) {
            let values = int32_values(batches, &column);
            let dangling = match key_sets.get(&column) {
                Some(set) => values.iter().flatten().filter(|k| !set.contains(*k)).count(),
                // unavailable dimension: only all-null keys are acceptable
                None => values.iter().flatten().count(),
            };
            if dangling > 0 {
                problems.push(format!("{name}: {dangling} dangling {column}"));
            }
        }
    }

    println!("{:<32} {:>10}", "table", "rows");
    for (name, batches) in &tables {
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        println!("{:<32} {:>10}", name, rows);
    }

    if problems.is_empty() {
        println!("\nOK: all keys dense, all foreign keys resolve");
        Ok(())
    } else {
        for p in &problems {
            eprintln!("FAIL {p}");
        }
        bail!("{} integrity problem(s)", problems.len());
    }
}
