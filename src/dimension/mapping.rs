use arrow::{
    array::{ArrayRef, Int64Array, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{info, warn};

use crate::config::MappingSpec;
use crate::error::Result;
use crate::export::Table;
use crate::stage::{utils::norm_text, StagedFeed};

/// Integer key → its most frequent text value within one feed.
#[derive(Debug, Clone)]
pub struct Mapping {
    pub name: String,
    pub key_output: String,
    pub value_output: String,
    /// (key, winning value, rows voting for it), ascending by key
    pub rows: Vec<(i64, String, u64)>,
}

/// Count `(key, value)` pairs in `feed` and keep the mode per key; ties go
/// to the alphabetically first value. `None` when either column is absent.
pub fn build_mapping(spec: &MappingSpec, feed: &StagedFeed) -> Option<Mapping> {
    let (Some(keys), Some(values)) = (feed.column(&spec.key_column), feed.column(&spec.value_column))
    else {
        warn!(mapping = %spec.name, feed = %feed.name, "mapping columns missing; skipped");
        return None;
    };

    let mut votes: BTreeMap<i64, BTreeMap<String, u64>> = BTreeMap::new();
    for row in 0..feed.num_rows() {
        let (Some(k), Some(v)) = (keys.int(row), values.text(row).and_then(|s| norm_text(&s)))
        else {
            continue;
        };
        *votes.entry(k).or_default().entry(v).or_insert(0) += 1;
    }

    let rows: Vec<(i64, String, u64)> = votes
        .into_iter()
        .filter_map(|(k, counts)| {
            // BTreeMap order + strict `>` keeps the alphabetically first on ties
            let mut best: Option<(String, u64)> = None;
            for (v, n) in counts {
                if best.as_ref().map_or(true, |(_, b)| n > *b) {
                    best = Some((v, n));
                }
            }
            best.map(|(v, n)| (k, v, n))
        })
        .collect();

    info!(mapping = %spec.name, keys = rows.len(), "mapping built");
    Some(Mapping {
        name: spec.name.clone(),
        key_output: spec.key_output.clone(),
        value_output: spec.value_output.clone(),
        rows,
    })
}

impl Table for Mapping {
    fn table_name(&self) -> &str {
        &self.name
    }

    fn to_record_batch(&self) -> Result<RecordBatch> {
        let schema = Schema::new(vec![
            Field::new(&self.key_output, DataType::Int64, false),
            Field::new(&self.value_output, DataType::Utf8, false),
            Field::new("row_count", DataType::Int64, false),
        ]);
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from_iter_values(self.rows.iter().map(|r| r.0))),
            Arc::new(StringArray::from_iter_values(self.rows.iter().map(|r| r.1.as_str()))),
            Arc::new(Int64Array::from_iter_values(self.rows.iter().map(|r| r.2 as i64))),
        ];
        Ok(RecordBatch::try_new(Arc::new(schema), arrays)?)
    }
}
