// src/pipeline.rs
use serde::Serialize;
use std::{collections::BTreeMap, path::PathBuf};
use tracing::{error, info, warn};

use crate::config::EtlConfig;
use crate::dimension::{
    bridge::{build_bridge, Bridge},
    build_dimension,
    calendar::{CalendarBuilder, CalendarDimension},
    mapping::{build_mapping, Mapping},
    weather::{build_weather, WeatherDimension},
    Dimension,
};
use crate::error::{EtlError, Result, Stage};
use crate::export::{export_tables, NamedBatch, Table};
use crate::fact::{build_fact, FactContext, FactTable};
use crate::ingest::{load_csv, RawTable};
use crate::stage::{stage_feed, StagedFeed};

/// Raw feeds as loaded from disk, before any normalisation.
#[derive(Debug, Clone, Default)]
pub struct RawInputs {
    /// Feed name → table; optional feeds that were absent are not here
    pub feeds: BTreeMap<String, RawTable>,
    pub weather: Option<RawTable>,
    /// Optional inputs that could not be loaded
    pub degraded: Vec<String>,
}

/// Every output table of one run, held in memory.
#[derive(Debug, Clone)]
pub struct GalaxyModel {
    pub calendar: CalendarDimension,
    pub weather: WeatherDimension,
    pub dimensions: Vec<Dimension>,
    pub bridges: Vec<Bridge>,
    pub mappings: Vec<Mapping>,
    pub facts: Vec<FactTable>,
    pub degraded: Vec<String>,
}

impl GalaxyModel {
    /// Export order: date, weather, dimensions, bridges, mappings, facts.
    pub fn tables(&self) -> Vec<&dyn Table> {
        let mut out: Vec<&dyn Table> = vec![&self.calendar, &self.weather];
        out.extend(self.dimensions.iter().map(|d| d as &dyn Table));
        out.extend(self.bridges.iter().map(|b| b as &dyn Table));
        out.extend(self.mappings.iter().map(|m| m as &dyn Table));
        out.extend(self.facts.iter().map(|f| f as &dyn Table));
        out
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name() == name)
    }

    pub fn fact(&self, table: &str) -> Option<&FactTable> {
        self.facts.iter().find(|f| f.name == table)
    }
}

/// What a finished run produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    /// (table, rows) in export order
    pub tables: Vec<(String, usize)>,
    pub degraded: Vec<String>,
    pub files: Vec<PathBuf>,
}

impl RunSummary {
    pub fn rows(&self, table: &str) -> Option<usize> {
        self.tables.iter().find(|(t, _)| t == table).map(|(_, n)| *n)
    }

    pub fn log(&self) {
        for (table, rows) in &self.tables {
            info!(table = %table, rows, "table written");
        }
        for d in &self.degraded {
            warn!(input = %d, "degraded");
        }
    }
}

/// Keep an optional input's table, or note why it is unavailable.
fn optional_input(
    label: &str,
    loaded: Result<RawTable>,
    degraded: &mut Vec<String>,
) -> Option<RawTable> {
    match loaded {
        Ok(table) => Some(table),
        Err(e) => {
            warn!(input = label, error = %e, "optional input unavailable");
            degraded.push(format!("{label}: {e}"));
            None
        }
    }
}

pub struct Pipeline {
    config: EtlConfig,
}

impl Pipeline {
    pub fn new(config: EtlConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    /// Read every configured feed. A required feed that cannot be loaded
    /// aborts the run; an optional feed or the weather file that cannot be
    /// loaded, for any reason, is recorded as degraded.
    #[tracing::instrument(level = "info", skip(self))]
    pub fn load_inputs(&self) -> Result<RawInputs> {
        let mut inputs = RawInputs::default();

        for feed in &self.config.feeds {
            let loaded = load_csv(&feed.name, &feed.file);
            if feed.required {
                let table = loaded.inspect_err(|e| {
                    error!(feed = %feed.name, error = %e, "required feed unavailable");
                })?;
                inputs.feeds.insert(feed.name.clone(), table);
            } else if let Some(table) =
                optional_input(&format!("feed `{}`", feed.name), loaded, &mut inputs.degraded)
            {
                inputs.feeds.insert(feed.name.clone(), table);
            }
        }

        inputs.weather = match &self.config.weather.file {
            Some(path) => optional_input("weather", load_csv("weather", path), &mut inputs.degraded),
            None => {
                inputs.degraded.push("weather: no file configured".into());
                None
            }
        };

        Ok(inputs)
    }

    /// Normalise the inputs and build every dimension and fact table.
    #[tracing::instrument(level = "info", skip_all)]
    pub fn build(&self, inputs: &RawInputs) -> Result<GalaxyModel> {
        let cfg = &self.config;
        let mut degraded = inputs.degraded.clone();

        // 1) Stage each loaded feed, in configured order
        let mut staged: Vec<StagedFeed> = Vec::new();
        for schema in &cfg.feeds {
            let Some(raw) = inputs.feeds.get(&schema.name) else {
                if schema.required {
                    return Err(EtlError::MissingInput {
                        feed: schema.name.clone(),
                        path: schema.file.clone(),
                    });
                }
                continue;
            };
            let feed = stage_feed(schema, &cfg.expected_columns(schema), raw, &cfg.staging)
                .map_err(|e| EtlError::stage(Stage::Staging, format!("{}: {}", schema.name, e)))?;
            staged.push(feed);
        }

        // 2) Calendar over every timestamp column of every feed
        let mut calendar = CalendarBuilder::new(&cfg.calendar);
        for feed in &staged {
            let Some(schema) = cfg.feed(&feed.name) else { continue };
            let event = schema.fact.as_ref().map(|f| &f.event_timestamp);
            for name in schema.timestamp_columns.iter().chain(event) {
                if let Some(col) = feed.column(name) {
                    calendar.observe(&col);
                }
            }
        }
        let calendar = calendar.finish();

        // 3) Weather
        let weather = build_weather(inputs.weather.as_ref(), &cfg.weather);

        // 4) Generic dimensions
        let mut dimensions = Vec::new();
        for spec in &cfg.dimensions {
            match build_dimension(spec, &staged) {
                Some(d) => dimensions.push(d),
                None => degraded.push(format!("{}: no contributing source", spec.name)),
            }
        }

        // 5) Bridges and mappings
        let mut bridges = Vec::new();
        for spec in &cfg.bridges {
            match dimensions.iter().find(|d| d.name() == spec.dimension) {
                Some(dim) => bridges.push(build_bridge(spec, dim)?),
                None => degraded.push(format!("{}: `{}` unavailable", spec.name, spec.dimension)),
            }
        }
        let mut mappings = Vec::new();
        for spec in &cfg.mappings {
            match staged.iter().find(|f| f.name == spec.feed).and_then(|f| build_mapping(spec, f)) {
                Some(m) => mappings.push(m),
                None => degraded.push(format!("{}: source columns unavailable", spec.name)),
            }
        }

        // 6) Facts
        let ctx = FactContext {
            specs: &cfg.dimensions,
            dimensions: &dimensions,
            weather: &weather,
        };
        let mut facts = Vec::new();
        for feed in &staged {
            let Some(spec) = cfg.feed(&feed.name).and_then(|s| s.fact.as_ref()) else {
                continue;
            };
            let fact = build_fact(feed, spec, &ctx)
                .map_err(|e| EtlError::stage(Stage::Facts, format!("{}: {}", spec.table, e)))?;
            facts.push(fact);
        }

        Ok(GalaxyModel {
            calendar,
            weather,
            dimensions,
            bridges,
            mappings,
            facts,
            degraded,
        })
    }

    /// Load, build and export. Nothing is written unless every table is.
    #[tracing::instrument(level = "info", skip(self), fields(output = %self.config.output_dir.display()))]
    pub fn run(&self) -> Result<RunSummary> {
        let inputs = self.load_inputs()?;
        let model = self.build(&inputs)?;

        let batches = model
            .tables()
            .into_iter()
            .map(NamedBatch::from_table)
            .collect::<Result<Vec<_>>>()?;
        let files = export_tables(&batches, &self.config.output_dir, self.config.format)?;

        let summary = RunSummary {
            tables: batches
                .iter()
                .map(|b| (b.name.clone(), b.batch.num_rows()))
                .collect(),
            degraded: model.degraded,
            files,
        };
        summary.log();
        Ok(summary)
    }
}
