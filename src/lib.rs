//! Dimensional ETL that turns the NYC EMS and FIRE incident feeds into a
//! galaxy schema: shared date, weather, location and incident-type
//! dimensions, per-feed lookup dimensions, and one fact table per feed.

pub mod config;
pub mod dimension;
pub mod error;
pub mod export;
pub mod fact;
pub mod ingest;
pub mod pipeline;
pub mod stage;

pub use config::{EtlConfig, OutputFormat};
pub use error::{EtlError, Result, Stage};
pub use export::Table;
pub use pipeline::{GalaxyModel, Pipeline, RawInputs, RunSummary};
