// src/main.rs
use anyhow::{Context, Result};
use clap::Parser;
use galaxy_etl::{EtlConfig, OutputFormat, Pipeline};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Build the EMS/FIRE incident galaxy schema")]
struct Args {
    /// YAML run configuration; defaults are used for anything it leaves out
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding EMS.csv, FIRE.csv, Firehouse.csv and weather_nyc.csv
    #[arg(long, conflicts_with = "config")]
    data_dir: Option<PathBuf>,

    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Hourly weather CSV, overriding the configured one
    #[arg(long)]
    weather: Option<PathBuf>,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    print_config: bool,

    /// Print the run summary as JSON instead of a table
    #[arg(long)]
    json: bool,
}

fn load_config(args: &Args) -> Result<EtlConfig> {
    let mut cfg = match (&args.config, &args.data_dir) {
        (Some(path), _) => EtlConfig::from_yaml_file(path)
            .with_context(|| format!("loading config `{}`", path.display()))?,
        (None, Some(dir)) => EtlConfig::for_data_dir(dir, "data/processed/galaxy_schema"),
        (None, None) => EtlConfig::default(),
    };
    if let Some(out) = &args.output_dir {
        cfg.output_dir = out.clone();
    }
    if let Some(format) = args.format {
        cfg.format = format;
    }
    if let Some(weather) = &args.weather {
        cfg.weather.file = Some(weather.clone());
    }
    Ok(cfg)
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,galaxy_etl=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    // ─── 2) resolve configuration ────────────────────────────────────
    let args = Args::parse();
    let cfg = load_config(&args)?;
    if args.print_config {
        print!("{}", cfg.to_yaml()?);
        return Ok(());
    }

    // ─── 3) run ──────────────────────────────────────────────────────
    info!(output = %cfg.output_dir.display(), format = cfg.format.extension(), "startup");
    let pipeline = Pipeline::new(cfg).context("invalid configuration")?;
    let summary = pipeline.run().map_err(|e| {
        error!(error = %e, "run failed");
        e
    })?;

    // ─── 4) report ───────────────────────────────────────────────────
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    println!("{:<32} {:>10}", "table", "rows");
    for (table, rows) in &summary.tables {
        println!("{:<32} {:>10}", table, rows);
    }
    for d in &summary.degraded {
        println!("degraded: {}", d);
    }
    info!(tables = summary.tables.len(), "done");
    Ok(())
}
