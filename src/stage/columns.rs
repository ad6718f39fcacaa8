use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray, TimestampMillisecondArray};

use super::date_parser;
use super::utils::{float_to_int, parse_f64, parse_int};

/// Typed view over one staged column, whatever Arrow type staging gave it.
#[derive(Clone, Copy, Debug)]
pub enum ColumnRef<'a> {
    Text(&'a StringArray),
    Float(&'a Float64Array),
    Int(&'a Int64Array),
    Timestamp(&'a TimestampMillisecondArray),
}

impl<'a> ColumnRef<'a> {
    pub fn from_array(arr: &'a ArrayRef) -> Option<Self> {
        let any = arr.as_any();
        if let Some(a) = any.downcast_ref::<StringArray>() {
            Some(ColumnRef::Text(a))
        } else if let Some(a) = any.downcast_ref::<Float64Array>() {
            Some(ColumnRef::Float(a))
        } else if let Some(a) = any.downcast_ref::<Int64Array>() {
            Some(ColumnRef::Int(a))
        } else {
            any.downcast_ref::<TimestampMillisecondArray>()
                .map(ColumnRef::Timestamp)
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnRef::Text(a) => a.len(),
            ColumnRef::Float(a) => a.len(),
            ColumnRef::Int(a) => a.len(),
            ColumnRef::Timestamp(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn valid(&self, row: usize) -> bool {
        let null = match self {
            ColumnRef::Text(a) => a.is_null(row),
            ColumnRef::Float(a) => a.is_null(row),
            ColumnRef::Int(a) => a.is_null(row),
            ColumnRef::Timestamp(a) => a.is_null(row),
        };
        !null
    }

    /// Cell as text. Numbers are formatted, timestamps rendered ISO-style.
    pub fn text(&self, row: usize) -> Option<String> {
        if !self.valid(row) {
            return None;
        }
        match self {
            ColumnRef::Text(a) => Some(a.value(row).to_string()),
            ColumnRef::Float(a) => Some(a.value(row).to_string()),
            ColumnRef::Int(a) => Some(a.value(row).to_string()),
            ColumnRef::Timestamp(a) => date_parser::from_millis(a.value(row))
                .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
        }
    }

    pub fn float(&self, row: usize) -> Option<f64> {
        if !self.valid(row) {
            return None;
        }
        match self {
            ColumnRef::Text(a) => parse_f64(a.value(row)),
            ColumnRef::Float(a) => Some(a.value(row)),
            ColumnRef::Int(a) => Some(a.value(row) as f64),
            ColumnRef::Timestamp(_) => None,
        }
    }

    pub fn int(&self, row: usize) -> Option<i64> {
        if !self.valid(row) {
            return None;
        }
        match self {
            ColumnRef::Text(a) => parse_int(a.value(row)),
            ColumnRef::Float(a) => float_to_int(a.value(row)),
            ColumnRef::Int(a) => Some(a.value(row)),
            ColumnRef::Timestamp(_) => None,
        }
    }

    pub fn millis(&self, row: usize) -> Option<i64> {
        match self {
            ColumnRef::Timestamp(a) if a.is_valid(row) => Some(a.value(row)),
            _ => None,
        }
    }
}
