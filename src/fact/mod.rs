// src/fact/mod.rs
pub mod measures;

use arrow::{
    array::{
        ArrayRef, Float64Array, Int32Array, Int8Array, StringArray, TimestampMillisecondArray,
    },
    datatypes::{DataType, Field, Schema, TimeUnit},
    record_batch::{RecordBatch, RecordBatchOptions},
};
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, info, warn};

use crate::config::{DerivedMeasure, DimensionSpec, FactSpec};
use crate::dimension::{weather::WeatherDimension, Dimension, KeyExtractor};
use crate::error::Result;
use crate::export::Table;
use crate::stage::{date_parser, utils::parse_flag, StagedFeed};

/// Everything a fact table resolves its foreign keys against.
#[derive(Debug, Clone, Copy)]
pub struct FactContext<'a> {
    /// Every configured dimension, built or not
    pub specs: &'a [DimensionSpec],
    /// The dimensions that were actually built
    pub dimensions: &'a [Dimension],
    pub weather: &'a WeatherDimension,
}

impl FactContext<'_> {
    fn built(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name() == name)
    }
}

/// One output row per staged row, in staged order.
#[derive(Debug, Clone)]
pub struct FactTable {
    pub name: String,
    pub batch: RecordBatch,
}

impl FactTable {
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }
}

impl Table for FactTable {
    fn table_name(&self) -> &str {
        &self.name
    }

    fn to_record_batch(&self) -> Result<RecordBatch> {
        Ok(self.batch.clone())
    }
}

#[derive(Default)]
struct Columns {
    fields: Vec<Field>,
    arrays: Vec<ArrayRef>,
}

impl Columns {
    fn push(&mut self, name: &str, data_type: DataType, array: ArrayRef) {
        self.fields.push(Field::new(name, data_type, true));
        self.arrays.push(array);
    }
}

/// Build the fact table of `feed`.
///
/// Foreign keys are a left join: a row whose natural key is null, absent
/// from the dimension, or whose dimension was never built keeps a null key.
/// Measure, flag and attribute columns whose source column is missing are
/// left out of the output entirely.
#[tracing::instrument(level = "info", skip_all, fields(feed = %feed.name, table = %spec.table))]
pub fn build_fact(feed: &StagedFeed, spec: &FactSpec, ctx: &FactContext<'_>) -> Result<FactTable> {
    let n = feed.num_rows();
    let mut out = Columns::default();

    // 1) Incident id
    match feed.column(&spec.id_column) {
        Some(c) => out.push(
            "incident_id",
            DataType::Utf8,
            Arc::new(StringArray::from_iter((0..n).map(|r| c.text(r)))),
        ),
        None => warn!(column = %spec.id_column, "id column missing; incident_id omitted"),
    }

    // 2) Event time → date_key / hour → weather_key
    let event = feed.column(&spec.event_timestamp);
    let slots: Vec<Option<(i32, i8)>> = match &event {
        Some(c) => (0..n)
            .map(|r| c.millis(r).and_then(date_parser::date_key_and_hour))
            .collect(),
        None => vec![None; n],
    };
    if let Some(c) = &event {
        let ms: Vec<Option<i64>> = (0..n).map(|r| c.millis(r)).collect();
        out.push(
            "incident_datetime",
            DataType::Timestamp(TimeUnit::Millisecond, None),
            Arc::new(TimestampMillisecondArray::from(ms)),
        );
        out.push(
            "date_key",
            DataType::Int32,
            Arc::new(Int32Array::from_iter(slots.iter().map(|s| s.map(|(d, _)| d)))),
        );
        out.push(
            "hour",
            DataType::Int8,
            Arc::new(Int8Array::from_iter(slots.iter().map(|s| s.map(|(_, h)| h)))),
        );
    } else {
        warn!(column = %spec.event_timestamp, "event timestamp missing; date_key and hour omitted");
    }
    out.push(
        "weather_key",
        DataType::Int32,
        Arc::new(Int32Array::from_iter(
            slots.iter().map(|s| s.and_then(|(d, h)| ctx.weather.lookup(d, h))),
        )),
    );

    // 3) Dimension foreign keys, one per dimension this feed feeds
    for dim_spec in ctx.specs.iter().filter(|d| d.source_for(&feed.name).is_some()) {
        let keys: Vec<Option<i32>> = match ctx.built(&dim_spec.name) {
            Some(dim) => match KeyExtractor::bind(&dim.spec, feed) {
                Some(ex) => (0..n).map(|r| dim.resolve(&ex, r)).collect(),
                None => vec![None; n],
            },
            None => vec![None; n],
        };
        let matched = keys.iter().filter(|k| k.is_some()).count();
        debug!(dimension = %dim_spec.name, matched, rows = n, "foreign key resolved");
        out.push(&dim_spec.key_column, DataType::Int32, Arc::new(Int32Array::from(keys)));
    }

    // 4) Measures, then derived measures in declared order
    let mut values: HashMap<&str, Vec<Option<f64>>> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for m in &spec.measures {
        match feed.column(&m.source) {
            Some(c) => {
                values.insert(&m.output, (0..n).map(|r| c.float(r)).collect());
                order.push(&m.output);
            }
            None => debug!(measure = %m.output, "source column missing; measure omitted"),
        }
    }
    for d in &spec.derived {
        let computed = match d {
            DerivedMeasure::Sum { inputs, .. } => {
                let present: Vec<&[Option<f64>]> = inputs
                    .iter()
                    .filter_map(|i| values.get(i.as_str()).map(Vec::as_slice))
                    .collect();
                (!present.is_empty()).then(|| measures::sum_columns(&present, n))
            }
            DerivedMeasure::Product { left, right, .. } => {
                match (values.get(left.as_str()), values.get(right.as_str())) {
                    (Some(a), Some(b)) => Some(measures::zip_with(a, b, measures::product)),
                    _ => None,
                }
            }
            DerivedMeasure::Ratio {
                numerator,
                denominator,
                ..
            } => match (values.get(numerator.as_str()), values.get(denominator.as_str())) {
                (Some(a), Some(b)) => Some(measures::zip_with(a, b, measures::ratio)),
                _ => None,
            },
        };
        match computed {
            Some(col) => {
                values.insert(d.output(), col);
                order.push(d.output());
            }
            None => debug!(measure = d.output(), "inputs missing; derived measure omitted"),
        }
    }
    for name in &order {
        if let Some(v) = values.remove(name) {
            out.push(name, DataType::Float64, Arc::new(Float64Array::from(v)));
        }
    }

    // 5) Indicator flags and degenerate attributes
    for flag in &spec.flags {
        if let Some(c) = feed.column(flag) {
            let v: Vec<Option<i8>> = (0..n)
                .map(|r| c.text(r).and_then(|s| parse_flag(&s)))
                .collect();
            out.push(&flag.to_lowercase(), DataType::Int8, Arc::new(Int8Array::from(v)));
        }
    }
    for attr in &spec.attributes {
        if let Some(c) = feed.column(attr) {
            out.push(
                &attr.to_lowercase(),
                DataType::Utf8,
                Arc::new(StringArray::from_iter((0..n).map(|r| c.text(r)))),
            );
        }
    }

    // 6) Count measure
    out.push(
        "nb_interventions",
        DataType::Int32,
        Arc::new(Int32Array::from_iter_values(std::iter::repeat(1).take(n))),
    );

    let options = RecordBatchOptions::new().with_row_count(Some(n));
    let batch =
        RecordBatch::try_new_with_options(Arc::new(Schema::new(out.fields)), out.arrays, &options)?;
    info!(rows = batch.num_rows(), columns = batch.num_columns(), "fact table built");

    Ok(FactTable {
        name: spec.table.clone(),
        batch,
    })
}
