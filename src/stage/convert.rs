use crate::config::StagingConfig;
use crate::stage::{date_parser, utils};
use arrow::{
    array::{ArrayRef, Float64Builder, StringBuilder, TimestampMillisecondBuilder},
    datatypes::{DataType, Field, TimeUnit},
};
use std::sync::Arc;

/// Final staged type of a raw column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagedKind {
    Text,
    Timestamp,
    Duration,
    Borough,
}

impl StagedKind {
    pub fn data_type(&self) -> DataType {
        match self {
            StagedKind::Text | StagedKind::Borough => DataType::Utf8,
            StagedKind::Timestamp => DataType::Timestamp(TimeUnit::Millisecond, None),
            StagedKind::Duration => DataType::Float64,
        }
    }
}

/// Convert one raw text column to its staged Arrow form. Every input value
/// yields exactly one output slot; values that fail to convert are null.
pub fn convert_column<'a, I>(
    name: &str,
    values: I,
    kind: StagedKind,
    cfg: &StagingConfig,
) -> (Field, ArrayRef)
where
    I: Iterator<Item = &'a str>,
{
    let arr: ArrayRef = match kind {
        StagedKind::Text => {
            let mut b = StringBuilder::new();
            for v in values {
                b.append_option(utils::non_empty(v));
            }
            Arc::new(b.finish())
        }
        StagedKind::Borough => {
            let mut b = StringBuilder::new();
            for v in values {
                b.append_option(utils::norm_borough(v, &cfg.borough_aliases));
            }
            Arc::new(b.finish())
        }
        StagedKind::Timestamp => {
            let mut b = TimestampMillisecondBuilder::new();
            for v in values {
                let ts = date_parser::parse_timestamp(v, &cfg.timestamp_format)
                    .map(date_parser::to_millis);
                b.append_option(ts);
            }
            Arc::new(b.finish())
        }
        StagedKind::Duration => {
            let mut b = Float64Builder::new();
            for v in values {
                b.append_option(utils::clean_seconds(v, cfg.sentinel));
            }
            Arc::new(b.finish())
        }
    };
    (Field::new(name, kind.data_type(), true), arr)
}
