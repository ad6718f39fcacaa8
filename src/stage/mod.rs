// src/stage/mod.rs
pub mod columns;
pub mod convert;
pub mod date_parser;
pub mod schema;
pub mod utils;

pub use columns::ColumnRef;
pub use schema::ResolvedSchema;

use arrow::{
    array::ArrayRef,
    datatypes::Schema,
    record_batch::{RecordBatch, RecordBatchOptions},
};
use std::{collections::BTreeSet, sync::Arc};
use tracing::debug;

use crate::config::{FeedSchema, StagingConfig, BOROUGH_NORM};
use crate::error::Result;
use crate::ingest::RawTable;
use convert::{convert_column, StagedKind};

/// A normalised feed: the declared columns that exist, converted to their
/// staged types, one row per raw record.
#[derive(Debug, Clone)]
pub struct StagedFeed {
    pub name: String,
    pub batch: RecordBatch,
    pub schema: ResolvedSchema,
}

impl StagedFeed {
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn column(&self, name: &str) -> Option<ColumnRef<'_>> {
        if !self.schema.has(name) {
            return None;
        }
        self.batch
            .column_by_name(name)
            .and_then(ColumnRef::from_array)
    }
}

/// Normalize `raw` against its declared schema.
///
/// Declared timestamp columns become millisecond timestamps, duration columns
/// become sentinel-filtered seconds, the borough column additionally yields
/// [`BOROUGH_NORM`], and everything else declared stays trimmed text.
/// Undeclared columns are not staged. No row is ever dropped.
#[tracing::instrument(level = "info", skip_all, fields(feed = %schema.name, rows = raw.num_rows()))]
pub fn stage_feed(
    schema: &FeedSchema,
    expected: &BTreeSet<String>,
    raw: &RawTable,
    cfg: &StagingConfig,
) -> Result<StagedFeed> {
    let resolved = ResolvedSchema::resolve(schema, expected, &raw.headers);
    resolved.log();

    let mut fields = Vec::new();
    let mut arrays: Vec<ArrayRef> = Vec::new();

    for name in resolved.present.iter().filter(|c| c.as_str() != BOROUGH_NORM) {
        let kind = if schema.timestamp_columns.contains(name)
            || schema.fact.as_ref().is_some_and(|f| &f.event_timestamp == name)
        {
            StagedKind::Timestamp
        } else if schema.duration_columns.contains(name) {
            StagedKind::Duration
        } else {
            StagedKind::Text
        };
        // present ⊆ headers, so the column exists
        let Some(values) = raw.column(name) else {
            continue;
        };
        let (field, arr) = convert_column(name, values, kind, cfg);
        fields.push(field);
        arrays.push(arr);
    }

    if resolved.has(BOROUGH_NORM) {
        if let Some(values) = schema.borough_column.as_deref().and_then(|b| raw.column(b)) {
            let (field, arr) = convert_column(BOROUGH_NORM, values, StagedKind::Borough, cfg);
            fields.push(field);
            arrays.push(arr);
        }
    }

    let options = RecordBatchOptions::new().with_row_count(Some(raw.num_rows()));
    let batch = RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)?;
    debug!(columns = batch.num_columns(), "staged");

    Ok(StagedFeed {
        name: schema.name.clone(),
        batch,
        schema: resolved,
    })
}
