use anyhow::Result;
use arrow::array::{Array, Int32Array, Int8Array, StringArray};
use arrow::record_batch::RecordBatch;
use galaxy_etl::{EtlConfig, OutputFormat, Pipeline, Table};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::{fs, fs::File, path::Path};
use tempfile::TempDir;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn init_test_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,galaxy_etl=debug")),
        )
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

const EMS: &str = "\
CAD_INCIDENT_ID,INCIDENT_DATETIME,INITIAL_CALL_TYPE,FINAL_CALL_TYPE,INITIAL_SEVERITY_LEVEL_CODE,FINAL_SEVERITY_LEVEL_CODE,INCIDENT_DISPOSITION_CODE,BOROUGH,ZIPCODE,POLICEPRECINCT,CITYCOUNCILDISTRICT,COMMUNITYDISTRICT,COMMUNITYSCHOOLDISTRICT,CONGRESSIONALDISTRICT,DISPATCH_RESPONSE_SECONDS_QY,INCIDENT_RESPONSE_SECONDS_QY,INCIDENT_TRAVEL_TM_SECONDS_QY,HELD_INDICATOR
E1,07/04/2023 02:15:00 PM,UNC,UNC,2,2,82,BROOKLYN,11201,84,33,302,13,10,30,120,90,N
E2,07/04/2023 11:59:00 PM,CARD,CARD,1,1,83,Richmond / Staten Island,10301,120,49,501,31,11,-5,999,400,Y
E3,garbage,INJURY,INJURY,4,5,87,QUEENS,,108,26,402,30,7,20,80,60,N
E4,07/05/2023 12:30:00 AM,UNC,SICK,2,3,82,brooklyn,11201,84,33,302,13,10,25,0,,
";

const FIRE: &str = "\
STARFIRE_INCIDENT_ID,INCIDENT_DATETIME,ALARM_BOX_BOROUGH,ALARM_BOX_NUMBER,ALARM_BOX_LOCATION,INCIDENT_BOROUGH,ZIPCODE,POLICEPRECINCT,CITYCOUNCILDISTRICT,COMMUNITYDISTRICT,COMMUNITYSCHOOLDISTRICT,CONGRESSIONALDISTRICT,ALARM_SOURCE_DESCRIPTION_TX,ALARM_LEVEL_INDEX_DESCRIPTION,HIGHEST_ALARM_LEVEL,INCIDENT_CLASSIFICATION,INCIDENT_CLASSIFICATION_GROUP,DISPATCH_RESPONSE_SECONDS_QY,INCIDENT_RESPONSE_SECONDS_QY,INCIDENT_TRAVEL_TM_SECONDS_QY,ENGINES_ASSIGNED_QUANTITY,LADDERS_ASSIGNED_QUANTITY,OTHER_UNITS_ASSIGNED_QUANTITY
F1,07/04/2023 02:40:00 PM,BROOKLYN,0251,FLATBUSH AVE,BROOKLYN,11201,84,33,302,13,10,PHONE,Initial Alarm,First Alarm,Demolition,Structural Fires,15,200,180,2,1,1
F2,07/03/2023 08:00:00 AM,RICHMOND / STATEN ISLAND,1234,VICTORY BLVD,RICHMOND / STATEN ISLAND,10301,120,49,501,31,11,EMS,Initial Alarm,All Hands Working,Car Fire,NonStructural Fires,10,300,,1,,
";

const FIREHOUSE: &str = "\
FacilityName,FacilityAddress,Borough,Postcode,Latitude,Longitude
Engine 207/Ladder 110,172 Tillary Street,Brooklyn,11201,40.6959,-73.9842
Engine 153/Ladder 77,74 Brighton Avenue,Staten Island,10301,40.6364,-74.0868
Fireboat Station,Pier 53,Manhattan,,,
";

const WEATHER: &str = "\
time,temperature_2m,precipitation,windspeed_10m,weathercode
2023-07-04T14:00,92.1,0.0,6.4,1
2023-07-04T23:00,80.0,0.3,4.0,61
2023-07-03T08:00,70.5,0.0,3.1,0
";

fn write_inputs(dir: &Path, with_weather: bool, with_firehouse: bool) -> Result<()> {
    fs::write(dir.join("EMS.csv"), EMS)?;
    fs::write(dir.join("FIRE.csv"), FIRE)?;
    if with_firehouse {
        fs::write(dir.join("Firehouse.csv"), FIREHOUSE)?;
    }
    if with_weather {
        fs::write(dir.join("weather_nyc.csv"), WEATHER)?;
    }
    Ok(())
}

fn config(raw: &TempDir, out: &TempDir) -> EtlConfig {
    EtlConfig::for_data_dir(raw.path(), out.path().join("galaxy"))
}

fn read_parquet(path: &Path) -> Result<RecordBatch> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?.build()?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    let schema = batches
        .first()
        .map(|b| b.schema())
        .ok_or_else(|| anyhow::anyhow!("empty parquet {}", path.display()))?;
    Ok(arrow::compute::concat_batches(&schema, &batches)?)
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> &'a T {
    batch
        .column_by_name(name)
        .unwrap_or_else(|| panic!("no column {name}"))
        .as_any()
        .downcast_ref::<T>()
        .unwrap_or_else(|| panic!("column {name} has unexpected type"))
}

#[test]
fn full_run_preserves_cardinality_and_resolves_keys() -> Result<()> {
    init_test_logging();
    let raw = TempDir::new()?;
    let out = TempDir::new()?;
    write_inputs(raw.path(), true, true)?;

    let pipeline = Pipeline::new(config(&raw, &out))?;
    let inputs = pipeline.load_inputs()?;
    let model = pipeline.build(&inputs)?;

    let ems = model.fact("fact_incidents_ems").unwrap();
    let fire = model.fact("fact_incidents_fire").unwrap();
    assert_eq!(ems.num_rows(), 4);
    assert_eq!(fire.num_rows(), 2);

    // location: BROOKLYN/11201 shared by both feeds, QUEENS row has no zip
    let loc = model.dimension("dim_location").unwrap();
    assert_eq!(loc.len(), 2);
    let ems_loc = column::<Int32Array>(&ems.batch, "location_key");
    let fire_loc = column::<Int32Array>(&fire.batch, "location_key");
    assert_eq!(ems_loc.value(0), 1);
    assert_eq!(ems_loc.value(1), 2);
    assert!(ems_loc.is_null(2));
    assert_eq!(ems_loc.value(3), 1);
    assert_eq!(fire_loc.value(0), 1);
    assert_eq!(fire_loc.value(1), 2);

    // an unparseable timestamp keeps its row with null date and hour
    let date = column::<Int32Array>(&ems.batch, "date_key");
    let hour = column::<Int8Array>(&ems.batch, "hour");
    assert_eq!(date.value(0), 20230704);
    assert_eq!(hour.value(1), 23);
    assert!(date.is_null(2));
    assert!(hour.is_null(2));
    assert_eq!(date.value(3), 20230705);

    // every fact date is in the calendar
    for d in date.iter().flatten() {
        assert!(model.calendar.get(d).is_some(), "date {d} missing from calendar");
    }
    let keys: Vec<i32> = model.calendar.rows.iter().map(|r| r.date_key).collect();
    assert_eq!(keys, vec![20230703, 20230704, 20230705]);
    let july4 = model.calendar.get(20230704).unwrap();
    assert_eq!(july4.fiscal_year, 2024);
    assert_eq!(july4.season.as_str(), "Summer");

    // weather keyed by hour, shared across facts
    let ems_wk = column::<Int32Array>(&ems.batch, "weather_key");
    let fire_wk = column::<Int32Array>(&fire.batch, "weather_key");
    assert_eq!(model.weather.len(), 3);
    assert_eq!(ems_wk.value(0), model.weather.lookup(20230704, 14).unwrap());
    assert_eq!(fire_wk.value(0), ems_wk.value(0));
    assert_eq!(fire_wk.value(1), 1);
    assert!(ems_wk.is_null(3));

    // incident type is shared: EMS and FIRE codes in one dimension
    let it = model.dimension("dim_incident_type").unwrap();
    assert_eq!(it.len(), 6);
    let batch = it.to_record_batch()?;
    let source = column::<StringArray>(&batch, "source");
    assert_eq!(source.value(0), "EMS");
    assert_eq!(source.value(5), "FIRE");

    // firehouse bridge leaves out the station without a zip
    let houses = model.dimension("dim_firehouse").unwrap();
    assert_eq!(houses.len(), 3);
    assert_eq!(model.bridges[0].rows.len(), 2);

    assert!(model.degraded.is_empty(), "{:?}", model.degraded);
    Ok(())
}

#[test]
fn surrogate_keys_are_dense_and_stable_across_runs() -> Result<()> {
    init_test_logging();
    let raw = TempDir::new()?;
    let out = TempDir::new()?;
    write_inputs(raw.path(), true, true)?;

    let pipeline = Pipeline::new(config(&raw, &out))?;
    let inputs = pipeline.load_inputs()?;
    let first = pipeline.build(&inputs)?;
    let second = pipeline.build(&inputs)?;

    for (a, b) in first.dimensions.iter().zip(&second.dimensions) {
        assert_eq!(a.rows, b.rows, "{} differs between runs", a.name());
        let keys: Vec<i32> = a.rows.iter().map(|r| r.key).collect();
        let expected: Vec<i32> = (1..=a.len() as i32).collect();
        assert_eq!(keys, expected, "{} keys not dense", a.name());
    }
    for (a, b) in first.tables().iter().zip(second.tables()) {
        assert_eq!(a.to_record_batch()?, b.to_record_batch()?);
    }
    Ok(())
}

#[test]
fn missing_required_feed_fails_before_writing() -> Result<()> {
    init_test_logging();
    let raw = TempDir::new()?;
    let out = TempDir::new()?;
    fs::write(raw.path().join("EMS.csv"), EMS)?;

    let cfg = config(&raw, &out);
    let output_dir = cfg.output_dir.clone();
    let err = Pipeline::new(cfg)?.run().unwrap_err();
    assert!(err.is_missing_input());
    assert!(err.to_string().contains("FIRE.csv"));
    assert!(!output_dir.exists());
    Ok(())
}

#[test]
fn missing_weather_and_firehouse_degrade() -> Result<()> {
    init_test_logging();
    let raw = TempDir::new()?;
    let out = TempDir::new()?;
    write_inputs(raw.path(), false, false)?;

    let pipeline = Pipeline::new(config(&raw, &out))?;
    let summary = pipeline.run()?;

    assert_eq!(summary.rows("dim_weather"), Some(0));
    assert_eq!(summary.rows("fact_incidents_ems"), Some(4));
    assert_eq!(summary.rows("dim_firehouse"), None);
    assert_eq!(summary.rows("bridge_zip_firehouse"), None);
    assert!(summary.degraded.iter().any(|d| d.starts_with("weather")));
    assert!(summary.degraded.iter().any(|d| d.contains("firehouse")));

    let dir = pipeline.config().output_dir.clone();
    // zero rows, but the schema is still in the footer
    let file = File::open(dir.join("dim_weather.parquet"))?;
    let schema = ParquetRecordBatchReaderBuilder::try_new(file)?.schema().clone();
    assert!(schema.field_with_name("weather_key").is_ok());
    assert!(schema.field_with_name("is_raining").is_ok());

    let ems = read_parquet(&dir.join("fact_incidents_ems.parquet"))?;
    assert_eq!(column::<Int32Array>(&ems, "weather_key").null_count(), 4);
    Ok(())
}

#[test]
fn parquet_export_round_trips_through_disk() -> Result<()> {
    init_test_logging();
    let raw = TempDir::new()?;
    let out = TempDir::new()?;
    write_inputs(raw.path(), true, true)?;

    let pipeline = Pipeline::new(config(&raw, &out))?;
    let summary = pipeline.run()?;
    let dir = pipeline.config().output_dir.clone();

    let mut names: Vec<String> = fs::read_dir(&dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert!(names.iter().all(|n| n.ends_with(".parquet")));
    assert_eq!(names.len(), summary.tables.len());
    assert!(names.contains(&"zip_borough_mapping.parquet".to_string()));

    let date = read_parquet(&dir.join("dim_date.parquet"))?;
    let keys = column::<Int32Array>(&date, "date_key");
    assert_eq!(keys.value(1), 20230704);
    let season = column::<StringArray>(&date, "season");
    assert_eq!(season.value(1), "Summer");

    let fire = read_parquet(&dir.join("fact_incidents_fire.parquet"))?;
    assert_eq!(fire.num_rows(), 2);
    let count = column::<Int32Array>(&fire, "nb_interventions");
    assert_eq!(count.values().iter().sum::<i32>(), 2);
    Ok(())
}

#[test]
fn csv_export_writes_headers() -> Result<()> {
    init_test_logging();
    let raw = TempDir::new()?;
    let out = TempDir::new()?;
    write_inputs(raw.path(), true, true)?;

    let mut cfg = config(&raw, &out);
    cfg.format = OutputFormat::Csv;
    let dir = cfg.output_dir.clone();
    Pipeline::new(cfg)?.run()?;

    let text = fs::read_to_string(dir.join("dim_location.csv"))?;
    let header = text.lines().next().unwrap_or_default();
    assert!(header.starts_with("location_key,borough,zipcode"));
    Ok(())
}
