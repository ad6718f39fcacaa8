use arrow::{
    array::{ArrayRef, BooleanArray, Float64Array, Int32Array, Int64Array, Int8Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use chrono::Timelike;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use tracing::{info, warn};

use crate::config::WeatherConfig;
use crate::error::Result;
use crate::export::Table;
use crate::ingest::RawTable;
use crate::stage::{date_parser, utils};

pub const TABLE: &str = "dim_weather";

/// One hourly observation.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherRow {
    pub weather_key: i32,
    pub date_key: i32,
    pub hour: i8,
    pub temperature: Option<f64>,
    pub precipitation: Option<f64>,
    pub wind_speed: Option<f64>,
    pub weather_code: Option<i64>,
    pub is_raining: Option<bool>,
    pub is_hot: Option<bool>,
    pub is_cold: Option<bool>,
}

/// Hourly weather dimension keyed by `(date_key, hour)`.
#[derive(Debug, Clone, Default)]
pub struct WeatherDimension {
    pub rows: Vec<WeatherRow>,
    index: HashMap<(i32, i8), i32>,
}

impl WeatherDimension {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn lookup(&self, date_key: i32, hour: i8) -> Option<i32> {
        self.index.get(&(date_key, hour)).copied()
    }
}

struct Observation {
    temperature: Option<f64>,
    precipitation: Option<f64>,
    wind_speed: Option<f64>,
    weather_code: Option<i64>,
}

/// Build the weather dimension from an optional hourly table.
///
/// `None`, or a table with no usable time column, gives an empty dimension
/// with the full column set. Rows whose time does not parse are skipped;
/// for a repeated hour the first row wins.
#[tracing::instrument(level = "info", skip_all, fields(rows = raw.map(|r| r.num_rows()).unwrap_or(0)))]
pub fn build_weather(raw: Option<&RawTable>, cfg: &WeatherConfig) -> WeatherDimension {
    let Some(raw) = raw else {
        warn!("no weather input; weather dimension is empty");
        return WeatherDimension::default();
    };
    let Some(time_idx) = raw.column_index(&cfg.time_column) else {
        warn!(column = %cfg.time_column, "weather time column missing; weather dimension is empty");
        return WeatherDimension::default();
    };

    let idx = |name: &str| {
        let i = raw.column_index(name);
        if i.is_none() {
            warn!(column = name, "weather column missing; values will be null");
        }
        i
    };
    let temp_idx = idx(&cfg.temperature_column);
    let precip_idx = idx(&cfg.precipitation_column);
    let wind_idx = idx(&cfg.wind_speed_column);
    let code_idx = idx(&cfg.weather_code_column);

    // 1) Parse every row keyed by hour; keep the first observation per hour
    let mut hours: BTreeMap<(i32, i8), Observation> = BTreeMap::new();
    let mut skipped = 0usize;
    for row in &raw.rows {
        let Some(dt) = date_parser::parse_iso_hour(&row[time_idx]) else {
            skipped += 1;
            continue;
        };
        let Some(date_key) = date_parser::date_key(dt.date()) else {
            skipped += 1;
            continue;
        };
        let cell = |i: Option<usize>| i.map(|i| row[i].as_str());
        let slot = (date_key, dt.hour() as i8);
        hours.entry(slot).or_insert_with(|| Observation {
            temperature: cell(temp_idx).and_then(utils::parse_f64),
            precipitation: cell(precip_idx).and_then(utils::parse_f64),
            wind_speed: cell(wind_idx).and_then(utils::parse_f64),
            weather_code: cell(code_idx).and_then(utils::parse_int),
        });
    }
    if skipped > 0 {
        warn!(skipped, "weather rows with unparseable time skipped");
    }

    // 2) Ascending (date_key, hour) → keys 1..N
    let mut rows = Vec::with_capacity(hours.len());
    let mut index = HashMap::with_capacity(hours.len());
    for (i, ((date_key, hour), obs)) in hours.into_iter().enumerate() {
        let weather_key = i as i32 + 1;
        index.insert((date_key, hour), weather_key);
        rows.push(WeatherRow {
            weather_key,
            date_key,
            hour,
            temperature: obs.temperature,
            precipitation: obs.precipitation,
            wind_speed: obs.wind_speed,
            weather_code: obs.weather_code,
            is_raining: obs.precipitation.map(|p| p > 0.0),
            is_hot: obs.temperature.map(|t| t > cfg.hot_above),
            is_cold: obs.temperature.map(|t| t < cfg.cold_below),
        });
    }

    info!(hours = rows.len(), "weather dimension built");
    WeatherDimension { rows, index }
}

impl Table for WeatherDimension {
    fn table_name(&self) -> &str {
        TABLE
    }

    fn to_record_batch(&self) -> Result<RecordBatch> {
        let r = &self.rows;
        let schema = Schema::new(vec![
            Field::new("weather_key", DataType::Int32, false),
            Field::new("date_key", DataType::Int32, false),
            Field::new("hour", DataType::Int8, false),
            Field::new("temperature", DataType::Float64, true),
            Field::new("precipitation", DataType::Float64, true),
            Field::new("wind_speed", DataType::Float64, true),
            Field::new("weather_code", DataType::Int64, true),
            Field::new("is_raining", DataType::Boolean, true),
            Field::new("is_hot", DataType::Boolean, true),
            Field::new("is_cold", DataType::Boolean, true),
        ]);
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(Int32Array::from_iter_values(r.iter().map(|w| w.weather_key))),
            Arc::new(Int32Array::from_iter_values(r.iter().map(|w| w.date_key))),
            Arc::new(Int8Array::from_iter_values(r.iter().map(|w| w.hour))),
            Arc::new(Float64Array::from_iter(r.iter().map(|w| w.temperature))),
            Arc::new(Float64Array::from_iter(r.iter().map(|w| w.precipitation))),
            Arc::new(Float64Array::from_iter(r.iter().map(|w| w.wind_speed))),
            Arc::new(Int64Array::from_iter(r.iter().map(|w| w.weather_code))),
            Arc::new(BooleanArray::from_iter(r.iter().map(|w| w.is_raining))),
            Arc::new(BooleanArray::from_iter(r.iter().map(|w| w.is_hot))),
            Arc::new(BooleanArray::from_iter(r.iter().map(|w| w.is_cold))),
        ];
        Ok(RecordBatch::try_new(Arc::new(schema), arrays)?)
    }
}
