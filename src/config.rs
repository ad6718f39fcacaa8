// src/config.rs

use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
};

use crate::error::{EtlError, Result};

/// Column added to every staged feed that declares a borough column.
pub const BOROUGH_NORM: &str = "BOROUGH_NORM";

/// On-disk format of the exported tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Parquet,
    Csv,
}

impl OutputFormat {
    pub fn extension(&self) -> &str {
        match self {
            OutputFormat::Parquet => "parquet",
            OutputFormat::Csv => "csv",
        }
    }
}

/// Everything a run needs. Built once, passed into [`crate::pipeline::Pipeline`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    pub output_dir: PathBuf,
    pub format: OutputFormat,
    pub staging: StagingConfig,
    pub calendar: CalendarConfig,
    pub weather: WeatherConfig,
    pub feeds: Vec<FeedSchema>,
    pub dimensions: Vec<DimensionSpec>,
    pub bridges: Vec<BridgeSpec>,
    pub mappings: Vec<MappingSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// chrono pattern for every feed timestamp
    pub timestamp_format: String,
    /// Durations at or above this are collection artifacts
    pub sentinel: f64,
    /// Uppercased borough spelling → canonical label
    pub borough_aliases: BTreeMap<String, String>,
}

impl Default for StagingConfig {
    fn default() -> Self {
        let borough_aliases = [
            ("RICHMOND / STATEN ISLAND", "STATEN ISLAND"),
            ("RICHMOND", "STATEN ISLAND"),
            ("STATEN ISLAND", "STATEN ISLAND"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            timestamp_format: "%m/%d/%Y %I:%M:%S %p".into(),
            sentinel: 999.0,
            borough_aliases,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// First month of the fiscal year; dates from this month on belong to year + 1.
    pub fiscal_year_start_month: u32,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            fiscal_year_start_month: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Hourly weather CSV. Absent → empty weather dimension.
    pub file: Option<PathBuf>,
    pub time_column: String,
    pub temperature_column: String,
    pub precipitation_column: String,
    pub wind_speed_column: String,
    pub weather_code_column: String,
    /// °F strictly above which an hour is hot
    pub hot_above: f64,
    /// °F strictly below which an hour is cold
    pub cold_below: f64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            file: None,
            time_column: "time".into(),
            temperature_column: "temperature_2m".into(),
            precipitation_column: "precipitation".into(),
            wind_speed_column: "windspeed_10m".into(),
            weather_code_column: "weathercode".into(),
            hot_above: 90.0,
            cold_below: 32.0,
        }
    }
}

/// Declared column contract of one tabular feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedSchema {
    pub name: String,
    pub file: PathBuf,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub borough_column: Option<String>,
    #[serde(default)]
    pub timestamp_columns: Vec<String>,
    /// Parsed as seconds and sentinel-filtered during staging
    #[serde(default)]
    pub duration_columns: Vec<String>,
    #[serde(default)]
    pub fact: Option<FactSpec>,
}

fn default_true() -> bool {
    true
}

impl FeedSchema {
    /// Every source column this feed is expected to carry, including the
    /// ones dimension specs read from it.
    pub fn expected_columns(&self, dimensions: &[DimensionSpec]) -> BTreeSet<String> {
        let mut cols: BTreeSet<String> = BTreeSet::new();
        cols.extend(self.borough_column.iter().cloned());
        cols.extend(self.timestamp_columns.iter().cloned());
        cols.extend(self.duration_columns.iter().cloned());
        if let Some(fact) = &self.fact {
            cols.insert(fact.id_column.clone());
            cols.insert(fact.event_timestamp.clone());
            cols.extend(fact.measures.iter().map(|m| m.source.clone()));
            cols.extend(fact.flags.iter().cloned());
            cols.extend(fact.attributes.iter().cloned());
        }
        for dim in dimensions {
            for source in dim.sources.iter().filter(|s| s.feed == self.name) {
                for src in source.columns.values() {
                    if let ColumnSource::Column(c) = src {
                        // derived by staging, not read from the file
                        if c != BOROUGH_NORM {
                            cols.insert(c.clone());
                        }
                    }
                }
            }
        }
        cols
    }
}

/// How one feed becomes a fact table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactSpec {
    pub table: String,
    pub id_column: String,
    pub event_timestamp: String,
    #[serde(default)]
    pub measures: Vec<MeasureSpec>,
    #[serde(default)]
    pub derived: Vec<DerivedMeasure>,
    /// Indicator columns normalised to 1/0
    #[serde(default)]
    pub flags: Vec<String>,
    /// Degenerate attributes carried through as text
    #[serde(default)]
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeasureSpec {
    pub source: String,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DerivedMeasure {
    /// Null components are skipped; null only if every component is null.
    Sum { output: String, inputs: Vec<String> },
    Product {
        output: String,
        left: String,
        right: String,
    },
    Ratio {
        output: String,
        numerator: String,
        denominator: String,
    },
}

impl DerivedMeasure {
    pub fn output(&self) -> &str {
        match self {
            DerivedMeasure::Sum { output, .. }
            | DerivedMeasure::Product { output, .. }
            | DerivedMeasure::Ratio { output, .. } => output,
        }
    }

    pub fn inputs(&self) -> Vec<&str> {
        match self {
            DerivedMeasure::Sum { inputs, .. } => inputs.iter().map(String::as_str).collect(),
            DerivedMeasure::Product { left, right, .. } => vec![left, right],
            DerivedMeasure::Ratio {
                numerator,
                denominator,
                ..
            } => vec![numerator, denominator],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    /// trimmed + uppercased
    Text,
    /// coerced to a nullable integer
    Integer,
}

/// What a null natural-key component does to its candidate row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullPolicy {
    #[default]
    Drop,
    Keep,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyColumn {
    pub name: String,
    pub kind: KeyKind,
    #[serde(default)]
    pub nulls: NullPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    Text,
    Integer,
    Float,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttributeColumn {
    pub name: String,
    pub kind: AttributeKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ColumnSource {
    Column(String),
    Literal(String),
}

/// One feed's contribution to a dimension: dimension column → where it comes from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DimensionSource {
    pub feed: String,
    pub columns: BTreeMap<String, ColumnSource>,
}

/// Declarative input to the generic dimension builder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DimensionSpec {
    pub name: String,
    pub key_column: String,
    /// Declared order is also the sort order
    pub natural_key: Vec<KeyColumn>,
    #[serde(default)]
    pub attributes: Vec<AttributeColumn>,
    pub sources: Vec<DimensionSource>,
}

impl DimensionSpec {
    pub fn source_for(&self, feed: &str) -> Option<&DimensionSource> {
        self.sources.iter().find(|s| s.feed == feed)
    }
}

/// Distinct (dimension key, columns...) pairs drawn from a built dimension.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeSpec {
    pub name: String,
    pub dimension: String,
    pub columns: Vec<String>,
    /// Rows with a null in any of these are left out
    #[serde(default)]
    pub required: Vec<String>,
}

/// Integer key → most frequent text value, counted over one feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MappingSpec {
    pub name: String,
    pub feed: String,
    pub key_column: String,
    pub key_output: String,
    pub value_column: String,
    pub value_output: String,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self::for_data_dir("data/raw", "data/processed/galaxy_schema")
    }
}

fn col(name: &str) -> ColumnSource {
    ColumnSource::Column(name.into())
}

fn lit(value: &str) -> ColumnSource {
    ColumnSource::Literal(value.into())
}

fn key(name: &str, kind: KeyKind, nulls: NullPolicy) -> KeyColumn {
    KeyColumn {
        name: name.into(),
        kind,
        nulls,
    }
}

fn measure(source: &str, output: &str) -> MeasureSpec {
    MeasureSpec {
        source: source.into(),
        output: output.into(),
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn sources(feed: &str, columns: &[(&str, ColumnSource)]) -> DimensionSource {
    DimensionSource {
        feed: feed.into(),
        columns: columns
            .iter()
            .map(|(name, src)| (name.to_string(), src.clone()))
            .collect(),
    }
}

/// Single text column lookup dimension over one feed.
fn lookup_dimension(name: &str, key_column: &str, feed: &str, column: &str) -> DimensionSpec {
    DimensionSpec {
        name: name.into(),
        key_column: key_column.into(),
        natural_key: vec![key(column, KeyKind::Text, NullPolicy::Drop)],
        attributes: Vec::new(),
        sources: vec![sources(feed, &[(column, col(column))])],
    }
}

const TS_COMMON: [&str; 4] = [
    "INCIDENT_DATETIME",
    "FIRST_ASSIGNMENT_DATETIME",
    "FIRST_ON_SCENE_DATETIME",
    "INCIDENT_CLOSE_DATETIME",
];

const DURATIONS: [&str; 3] = [
    "DISPATCH_RESPONSE_SECONDS_QY",
    "INCIDENT_RESPONSE_SECONDS_QY",
    "INCIDENT_TRAVEL_TM_SECONDS_QY",
];

impl EtlConfig {
    /// EMS + FIRE + firehouse layout under `raw_dir`, weather picked up
    /// from `weather_nyc.csv` when that file exists.
    pub fn for_data_dir(raw_dir: impl AsRef<Path>, output_dir: impl Into<PathBuf>) -> Self {
        let raw = raw_dir.as_ref();
        let weather_file = raw.join("weather_nyc.csv");

        let shared_measures = vec![
            measure("DISPATCH_RESPONSE_SECONDS_QY", "dispatch_time"),
            measure("INCIDENT_RESPONSE_SECONDS_QY", "response_time"),
            measure("INCIDENT_TRAVEL_TM_SECONDS_QY", "travel_time"),
        ];

        let mut ems_ts = strings(&TS_COMMON);
        ems_ts.extend(strings(&[
            "FIRST_HOSP_ARRIVAL_DATETIME",
            "FIRST_TO_HOSP_DATETIME",
        ]));

        let ems = FeedSchema {
            name: "ems".into(),
            file: raw.join("EMS.csv"),
            required: true,
            borough_column: Some("BOROUGH".into()),
            timestamp_columns: ems_ts,
            duration_columns: strings(&DURATIONS),
            fact: Some(FactSpec {
                table: "fact_incidents_ems".into(),
                id_column: "CAD_INCIDENT_ID".into(),
                event_timestamp: "INCIDENT_DATETIME".into(),
                measures: shared_measures.clone(),
                derived: vec![DerivedMeasure::Ratio {
                    output: "dispatch_share".into(),
                    numerator: "dispatch_time".into(),
                    denominator: "response_time".into(),
                }],
                flags: strings(&[
                    "HELD_INDICATOR",
                    "REOPEN_INDICATOR",
                    "SPECIAL_EVENT_INDICATOR",
                    "STANDBY_INDICATOR",
                    "TRANSFER_INDICATOR",
                ]),
                attributes: Vec::new(),
            }),
        };

        let mut fire_measures = shared_measures;
        fire_measures.extend([
            measure("ENGINES_ASSIGNED_QUANTITY", "engines_assigned_quantity"),
            measure("LADDERS_ASSIGNED_QUANTITY", "ladders_assigned_quantity"),
            measure("OTHER_UNITS_ASSIGNED_QUANTITY", "other_units_assigned_quantity"),
            measure("TOTAL_INCIDENT_DURATION_SECONDS", "total_incident_duration"),
        ]);

        let fire = FeedSchema {
            name: "fire".into(),
            file: raw.join("FIRE.csv"),
            required: true,
            borough_column: Some("INCIDENT_BOROUGH".into()),
            timestamp_columns: strings(&TS_COMMON),
            duration_columns: strings(&DURATIONS),
            fact: Some(FactSpec {
                table: "fact_incidents_fire".into(),
                id_column: "STARFIRE_INCIDENT_ID".into(),
                event_timestamp: "INCIDENT_DATETIME".into(),
                measures: fire_measures,
                derived: vec![
                    DerivedMeasure::Sum {
                        output: "total_units".into(),
                        inputs: strings(&[
                            "engines_assigned_quantity",
                            "ladders_assigned_quantity",
                            "other_units_assigned_quantity",
                        ]),
                    },
                    DerivedMeasure::Product {
                        output: "unit_travel_seconds".into(),
                        left: "total_units".into(),
                        right: "travel_time".into(),
                    },
                ],
                flags: Vec::new(),
                attributes: strings(&[
                    "ALARM_BOX_NUMBER",
                    "ALARM_BOX_LOCATION",
                    "ALARM_BOX_BOROUGH",
                    "HIGHEST_ALARM_LEVEL",
                ]),
            }),
        };

        let firehouse = FeedSchema {
            name: "firehouse".into(),
            file: raw.join("Firehouse.csv"),
            required: false,
            borough_column: Some("Borough".into()),
            timestamp_columns: Vec::new(),
            duration_columns: Vec::new(),
            fact: None,
        };

        let location_sources = |feed: &str| {
            sources(
                feed,
                &[
                    ("borough", col(BOROUGH_NORM)),
                    ("zipcode", col("ZIPCODE")),
                    ("police_precinct", col("POLICEPRECINCT")),
                    ("city_council_district", col("CITYCOUNCILDISTRICT")),
                    ("community_district", col("COMMUNITYDISTRICT")),
                    ("community_school_district", col("COMMUNITYSCHOOLDISTRICT")),
                    ("congressional_district", col("CONGRESSIONALDISTRICT")),
                ],
            )
        };

        let location = DimensionSpec {
            name: "dim_location".into(),
            key_column: "location_key".into(),
            natural_key: vec![
                key("borough", KeyKind::Text, NullPolicy::Keep),
                key("zipcode", KeyKind::Integer, NullPolicy::Drop),
                key("police_precinct", KeyKind::Integer, NullPolicy::Keep),
                key("city_council_district", KeyKind::Integer, NullPolicy::Keep),
                key("community_district", KeyKind::Integer, NullPolicy::Keep),
                key("community_school_district", KeyKind::Integer, NullPolicy::Keep),
                key("congressional_district", KeyKind::Integer, NullPolicy::Keep),
            ],
            attributes: Vec::new(),
            sources: vec![location_sources("ems"), location_sources("fire")],
        };

        let incident_type = DimensionSpec {
            name: "dim_incident_type".into(),
            key_column: "incident_type_key".into(),
            natural_key: vec![
                key("source", KeyKind::Text, NullPolicy::Drop),
                key("type_code", KeyKind::Text, NullPolicy::Drop),
            ],
            attributes: vec![AttributeColumn {
                name: "category".into(),
                kind: AttributeKind::Text,
            }],
            sources: vec![
                sources(
                    "ems",
                    &[
                        ("source", lit("EMS")),
                        ("type_code", col("FINAL_CALL_TYPE")),
                        ("category", lit("Medical")),
                    ],
                ),
                sources(
                    "fire",
                    &[
                        ("source", lit("FIRE")),
                        ("type_code", col("INCIDENT_CLASSIFICATION")),
                        ("category", col("INCIDENT_CLASSIFICATION_GROUP")),
                    ],
                ),
            ],
        };

        let firehouse_dim = DimensionSpec {
            name: "dim_firehouse".into(),
            key_column: "firehouse_key".into(),
            natural_key: vec![
                key("firehouse_name", KeyKind::Text, NullPolicy::Drop),
                key("borough", KeyKind::Text, NullPolicy::Keep),
                key("zipcode", KeyKind::Integer, NullPolicy::Keep),
                key("address", KeyKind::Text, NullPolicy::Keep),
            ],
            attributes: vec![
                AttributeColumn {
                    name: "latitude".into(),
                    kind: AttributeKind::Float,
                },
                AttributeColumn {
                    name: "longitude".into(),
                    kind: AttributeKind::Float,
                },
            ],
            sources: vec![sources(
                "firehouse",
                &[
                    ("firehouse_name", col("FacilityName")),
                    ("borough", col(BOROUGH_NORM)),
                    ("zipcode", col("Postcode")),
                    ("address", col("FacilityAddress")),
                    ("latitude", col("Latitude")),
                    ("longitude", col("Longitude")),
                ],
            )],
        };

        let mut dimensions = vec![location, incident_type, firehouse_dim];
        dimensions.extend([
            lookup_dimension(
                "dim_ems_initial_call_type",
                "ems_initial_call_type_key",
                "ems",
                "INITIAL_CALL_TYPE",
            ),
            lookup_dimension(
                "dim_ems_final_call_type",
                "ems_final_call_type_key",
                "ems",
                "FINAL_CALL_TYPE",
            ),
            lookup_dimension(
                "dim_ems_initial_severity",
                "ems_initial_severity_key",
                "ems",
                "INITIAL_SEVERITY_LEVEL_CODE",
            ),
            lookup_dimension(
                "dim_ems_final_severity",
                "ems_final_severity_key",
                "ems",
                "FINAL_SEVERITY_LEVEL_CODE",
            ),
            lookup_dimension(
                "dim_ems_disposition",
                "ems_disposition_key",
                "ems",
                "INCIDENT_DISPOSITION_CODE",
            ),
            lookup_dimension(
                "dim_fire_class_group",
                "fire_class_group_key",
                "fire",
                "INCIDENT_CLASSIFICATION_GROUP",
            ),
            lookup_dimension(
                "dim_fire_class",
                "fire_class_key",
                "fire",
                "INCIDENT_CLASSIFICATION",
            ),
            lookup_dimension(
                "dim_fire_alarm_source",
                "fire_alarm_source_key",
                "fire",
                "ALARM_SOURCE_DESCRIPTION_TX",
            ),
            lookup_dimension(
                "dim_fire_alarm_level",
                "fire_alarm_level_key",
                "fire",
                "ALARM_LEVEL_INDEX_DESCRIPTION",
            ),
        ]);

        Self {
            output_dir: output_dir.into(),
            format: OutputFormat::Parquet,
            staging: StagingConfig::default(),
            calendar: CalendarConfig::default(),
            weather: WeatherConfig {
                file: Some(weather_file),
                ..WeatherConfig::default()
            },
            feeds: vec![ems, fire, firehouse],
            dimensions,
            bridges: vec![BridgeSpec {
                name: "bridge_zip_firehouse".into(),
                dimension: "dim_firehouse".into(),
                columns: strings(&["zipcode", "borough"]),
                required: strings(&["zipcode"]),
            }],
            mappings: vec![MappingSpec {
                name: "zip_borough_mapping".into(),
                feed: "ems".into(),
                key_column: "ZIPCODE".into(),
                key_output: "zipcode".into(),
                value_column: BOROUGH_NORM.into(),
                value_output: "borough".into(),
            }],
        }
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let cfg: EtlConfig = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("reading {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn feed(&self, name: &str) -> Option<&FeedSchema> {
        self.feeds.iter().find(|f| f.name == name)
    }

    /// Source columns `feed` must carry for every output that reads it.
    pub fn expected_columns(&self, feed: &FeedSchema) -> BTreeSet<String> {
        let mut cols = feed.expected_columns(&self.dimensions);
        for m in self.mappings.iter().filter(|m| m.feed == feed.name) {
            for c in [&m.key_column, &m.value_column] {
                if c != BOROUGH_NORM {
                    cols.insert(c.clone());
                }
            }
        }
        cols
    }

    /// Structural checks that would otherwise surface halfway through a run.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(EtlError::Config(msg));

        let mut feed_names = BTreeSet::new();
        for feed in &self.feeds {
            if !feed_names.insert(feed.name.as_str()) {
                return fail(format!("duplicate feed `{}`", feed.name));
            }
            if let Some(fact) = &feed.fact {
                let mut known: BTreeSet<&str> =
                    fact.measures.iter().map(|m| m.output.as_str()).collect();
                for d in &fact.derived {
                    for input in d.inputs() {
                        if !known.contains(input) {
                            return fail(format!(
                                "derived measure `{}` of `{}` uses unknown input `{}`",
                                d.output(),
                                fact.table,
                                input
                            ));
                        }
                    }
                    known.insert(d.output());
                }
            }
        }
        if !self.feeds.iter().any(|f| f.fact.is_some()) {
            return fail("no feed declares a fact table".into());
        }

        let mut dim_names = BTreeSet::new();
        for dim in &self.dimensions {
            if !dim_names.insert(dim.name.as_str()) {
                return fail(format!("duplicate dimension `{}`", dim.name));
            }
            if dim.natural_key.is_empty() {
                return fail(format!("dimension `{}` has no natural key", dim.name));
            }
            let declared: BTreeSet<&str> = dim
                .natural_key
                .iter()
                .map(|k| k.name.as_str())
                .chain(dim.attributes.iter().map(|a| a.name.as_str()))
                .collect();
            for source in &dim.sources {
                if !feed_names.contains(source.feed.as_str()) {
                    return fail(format!(
                        "dimension `{}` reads unknown feed `{}`",
                        dim.name, source.feed
                    ));
                }
                if let Some(extra) = source.columns.keys().find(|c| !declared.contains(c.as_str()))
                {
                    return fail(format!(
                        "dimension `{}` maps undeclared column `{}`",
                        dim.name, extra
                    ));
                }
            }
        }

        for bridge in &self.bridges {
            let Some(dim) = self.dimensions.iter().find(|d| d.name == bridge.dimension) else {
                return fail(format!(
                    "bridge `{}` references unknown dimension `{}`",
                    bridge.name, bridge.dimension
                ));
            };
            for c in bridge.columns.iter().chain(&bridge.required) {
                if !dim.natural_key.iter().any(|k| &k.name == c) {
                    return fail(format!(
                        "bridge `{}` column `{}` is not a natural key of `{}`",
                        bridge.name, c, dim.name
                    ));
                }
            }
        }

        for mapping in &self.mappings {
            if !feed_names.contains(mapping.feed.as_str()) {
                return fail(format!(
                    "mapping `{}` reads unknown feed `{}`",
                    mapping.name, mapping.feed
                ));
            }
        }

        if !(1..=12).contains(&self.calendar.fiscal_year_start_month) {
            return fail(format!(
                "fiscal_year_start_month must be 1..=12, got {}",
                self.calendar.fiscal_year_start_month
            ));
        }
        Ok(())
    }
}
