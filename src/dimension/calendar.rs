use arrow::{
    array::{
        ArrayRef, BooleanArray, Date32Array, Int16Array, Int32Array, Int8Array, StringArray,
    },
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use chrono::{Datelike, NaiveDate, Weekday};
use std::{collections::BTreeSet, sync::Arc};
use tracing::info;

use crate::config::CalendarConfig;
use crate::error::Result;
use crate::export::Table;
use crate::stage::{date_parser, ColumnRef};

pub const TABLE: &str = "dim_date";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    pub fn of_month(month: u32) -> Self {
        match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Fall,
            _ => Season::Winter,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Season::Winter => "Winter",
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
        }
    }
}

/// Derived attributes of one calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRow {
    pub date: NaiveDate,
    pub date_key: i32,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    /// 1 = Monday … 7 = Sunday
    pub day_of_week: u32,
    pub is_weekend: bool,
    pub iso_week: u32,
    pub quarter: u32,
    pub fiscal_year: i32,
    pub season: Season,
}

impl DateRow {
    /// `None` when the day has no `YYYYMMDD` key (year outside 1..=9999).
    pub fn new(date: NaiveDate, fiscal_year_start_month: u32) -> Option<Self> {
        let date_key = date_parser::date_key(date)?;
        let month = date.month();
        let fiscal_year = if fiscal_year_start_month > 1 && month >= fiscal_year_start_month {
            date.year() + 1
        } else {
            date.year()
        };
        let weekday = date.weekday();
        Some(Self {
            date,
            date_key,
            year: date.year(),
            month,
            day: date.day(),
            day_of_week: weekday.number_from_monday(),
            is_weekend: matches!(weekday, Weekday::Sat | Weekday::Sun),
            iso_week: date.iso_week().week(),
            quarter: (month - 1) / 3 + 1,
            fiscal_year,
            season: Season::of_month(month),
        })
    }

    pub fn day_name(&self) -> &'static str {
        match self.date.weekday() {
            Weekday::Mon => "Monday",
            Weekday::Tue => "Tuesday",
            Weekday::Wed => "Wednesday",
            Weekday::Thu => "Thursday",
            Weekday::Fri => "Friday",
            Weekday::Sat => "Saturday",
            Weekday::Sun => "Sunday",
        }
    }
}

/// Accumulates the distinct days seen across any number of timestamp columns.
#[derive(Debug)]
pub struct CalendarBuilder {
    fiscal_year_start_month: u32,
    dates: BTreeSet<NaiveDate>,
}

impl CalendarBuilder {
    pub fn new(cfg: &CalendarConfig) -> Self {
        Self {
            fiscal_year_start_month: cfg.fiscal_year_start_month,
            dates: BTreeSet::new(),
        }
    }

    /// Add every non-null timestamp of `column`, truncated to its day.
    pub fn observe(&mut self, column: &ColumnRef<'_>) {
        for row in 0..column.len() {
            if let Some(dt) = column.millis(row).and_then(date_parser::from_millis) {
                self.dates.insert(dt.date());
            }
        }
    }

    pub fn finish(self) -> CalendarDimension {
        let rows: Vec<DateRow> = self
            .dates
            .into_iter()
            .filter_map(|d| DateRow::new(d, self.fiscal_year_start_month))
            .collect();
        info!(days = rows.len(), "calendar built");
        CalendarDimension { rows }
    }
}

/// Date dimension: one row per observed day, ascending.
#[derive(Debug, Clone, Default)]
pub struct CalendarDimension {
    pub rows: Vec<DateRow>,
}

impl CalendarDimension {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, date_key: i32) -> Option<&DateRow> {
        self.rows
            .binary_search_by_key(&date_key, |r| r.date_key)
            .ok()
            .map(|i| &self.rows[i])
    }
}

impl Table for CalendarDimension {
    fn table_name(&self) -> &str {
        TABLE
    }

    fn to_record_batch(&self) -> Result<RecordBatch> {
        let r = &self.rows;
        let schema = Schema::new(vec![
            Field::new("date_key", DataType::Int32, false),
            Field::new("date", DataType::Date32, false),
            Field::new("year", DataType::Int16, false),
            Field::new("month", DataType::Int8, false),
            Field::new("day", DataType::Int8, false),
            Field::new("day_of_week", DataType::Int8, false),
            Field::new("day_name", DataType::Utf8, false),
            Field::new("is_weekend", DataType::Boolean, false),
            Field::new("week", DataType::Int8, false),
            Field::new("quarter", DataType::Int8, false),
            Field::new("fiscal_year", DataType::Int16, false),
            Field::new("season", DataType::Utf8, false),
        ]);

        let arrays: Vec<ArrayRef> = vec![
            Arc::new(Int32Array::from_iter_values(r.iter().map(|d| d.date_key))),
            Arc::new(Date32Array::from_iter_values(
                r.iter().map(|d| date_parser::to_date32(d.date)),
            )),
            Arc::new(Int16Array::from_iter_values(r.iter().map(|d| d.year as i16))),
            Arc::new(Int8Array::from_iter_values(r.iter().map(|d| d.month as i8))),
            Arc::new(Int8Array::from_iter_values(r.iter().map(|d| d.day as i8))),
            Arc::new(Int8Array::from_iter_values(r.iter().map(|d| d.day_of_week as i8))),
            Arc::new(StringArray::from_iter_values(r.iter().map(|d| d.day_name()))),
            Arc::new(BooleanArray::from(
                r.iter().map(|d| d.is_weekend).collect::<Vec<_>>(),
            )),
            Arc::new(Int8Array::from_iter_values(r.iter().map(|d| d.iso_week as i8))),
            Arc::new(Int8Array::from_iter_values(r.iter().map(|d| d.quarter as i8))),
            Arc::new(Int16Array::from_iter_values(r.iter().map(|d| d.fiscal_year as i16))),
            Arc::new(StringArray::from_iter_values(r.iter().map(|d| d.season.as_str()))),
        ];

        Ok(RecordBatch::try_new(Arc::new(schema), arrays)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, TimestampMillisecondArray};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn independence_day_attributes() {
        let row = DateRow::new(ymd(2023, 7, 4), 7).unwrap();
        assert_eq!(row.date_key, 20230704);
        assert_eq!(row.fiscal_year, 2024);
        assert_eq!(row.season, Season::Summer);
        assert_eq!(row.day_of_week, 2);
        assert_eq!(row.day_name(), "Tuesday");
        assert!(!row.is_weekend);
        assert_eq!(row.quarter, 3);
        assert_eq!(row.iso_week, 27);
    }

    #[test]
    fn fiscal_year_and_season_boundaries() {
        assert_eq!(DateRow::new(ymd(2023, 6, 30), 7).unwrap().fiscal_year, 2023);
        assert_eq!(DateRow::new(ymd(2023, 6, 30), 1).unwrap().fiscal_year, 2023);
        assert_eq!(DateRow::new(ymd(2023, 12, 1), 1).unwrap().fiscal_year, 2023);
        assert_eq!(Season::of_month(12), Season::Winter);
        assert_eq!(Season::of_month(2), Season::Winter);
        assert_eq!(Season::of_month(3), Season::Spring);
        assert_eq!(Season::of_month(11), Season::Fall);
        // ISO week of Jan 1 2023 (a Sunday) belongs to 2022-W52
        let jan1 = DateRow::new(ymd(2023, 1, 1), 7).unwrap();
        assert_eq!(jan1.iso_week, 52);
        assert!(jan1.is_weekend);
        assert_eq!(jan1.day_of_week, 7);
    }

    #[test]
    fn days_without_a_date_key_are_left_out() {
        assert!(DateRow::new(ymd(-1, 7, 4), 7).is_none());
        assert!(DateRow::new(ymd(250_000, 7, 4), 7).is_none());

        let ms = |d: NaiveDate| date_parser::to_millis(d.and_hms_opt(14, 0, 0).unwrap());
        let col = TimestampMillisecondArray::from(vec![
            Some(ms(ymd(250_000, 7, 4))),
            Some(ms(ymd(-1, 7, 4))),
            Some(ms(ymd(2023, 7, 4))),
        ]);
        let mut builder = CalendarBuilder::new(&CalendarConfig::default());
        builder.observe(&ColumnRef::Timestamp(&col));
        let cal = builder.finish();
        let keys: Vec<i32> = cal.rows.iter().map(|r| r.date_key).collect();
        assert_eq!(keys, vec![20230704]);
    }

    #[test]
    fn union_of_columns_is_sorted_and_deduped() -> anyhow::Result<()> {
        let ms = |y, m, d, h| {
            date_parser::to_millis(ymd(y, m, d).and_hms_opt(h, 0, 0).unwrap())
        };
        let a = TimestampMillisecondArray::from(vec![
            Some(ms(2023, 7, 4, 14)),
            None,
            Some(ms(2023, 7, 4, 1)),
        ]);
        let b = TimestampMillisecondArray::from(vec![Some(ms(2023, 7, 3, 23)), Some(ms(2024, 1, 1, 0))]);

        let mut builder = CalendarBuilder::new(&CalendarConfig::default());
        builder.observe(&ColumnRef::Timestamp(&a));
        builder.observe(&ColumnRef::Timestamp(&b));
        let cal = builder.finish();

        let keys: Vec<i32> = cal.rows.iter().map(|r| r.date_key).collect();
        assert_eq!(keys, vec![20230703, 20230704, 20240101]);
        assert!(cal.get(20230704).is_some());
        assert!(cal.get(20230705).is_none());

        let batch = cal.to_record_batch()?;
        assert_eq!(batch.num_rows(), 3);
        let season = batch.column_by_name("season").unwrap();
        let season = season.as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(season.value(0), "Summer");
        assert_eq!(season.value(2), "Winter");
        assert_eq!(season.len(), 3);
        Ok(())
    }
}
