// src/dimension/mod.rs
pub mod bridge;
pub mod calendar;
pub mod key;
pub mod mapping;
pub mod weather;

pub use key::{AttrValue, KeyPart, NaturalKey};

use arrow::{
    array::{ArrayRef, Float64Builder, Int32Array, Int64Builder, StringBuilder},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use tracing::{debug, info, warn};

use crate::config::{AttributeKind, ColumnSource, DimensionSpec, KeyKind, NullPolicy};
use crate::error::Result;
use crate::export::Table;
use crate::stage::{ColumnRef, StagedFeed};

/// Where one dimension column's value comes from inside a particular feed.
#[derive(Debug, Clone)]
enum Binding<'a> {
    Column(ColumnRef<'a>),
    Literal(String),
    Absent,
}

/// Binds a dimension spec to one staged feed so natural keys and attributes
/// can be read row by row. The dimension builder and the fact builder both
/// go through this, so keys compare equal on either side.
#[derive(Debug)]
pub struct KeyExtractor<'a> {
    keys: Vec<(KeyKind, NullPolicy, Binding<'a>)>,
    attributes: Vec<(AttributeKind, Binding<'a>)>,
}

impl<'a> KeyExtractor<'a> {
    /// `None` when the feed is not a source of `spec`, or cannot supply a
    /// key column whose nulls drop the row.
    pub fn bind(spec: &DimensionSpec, feed: &'a StagedFeed) -> Option<Self> {
        let source = spec.source_for(&feed.name)?;
        let bind = |name: &str| match source.columns.get(name) {
            Some(ColumnSource::Column(c)) => {
                feed.column(c).map(Binding::Column).unwrap_or(Binding::Absent)
            }
            Some(ColumnSource::Literal(v)) => Binding::Literal(v.clone()),
            None => Binding::Absent,
        };

        let keys: Vec<_> = spec
            .natural_key
            .iter()
            .map(|k| (k.kind, k.nulls, bind(&k.name)))
            .collect();

        let unusable = keys
            .iter()
            .any(|(_, nulls, b)| *nulls == NullPolicy::Drop && matches!(b, Binding::Absent));
        let reads_data = keys.iter().any(|(_, _, b)| matches!(b, Binding::Column(_)));
        if unusable || !reads_data {
            return None;
        }

        let attributes = spec
            .attributes
            .iter()
            .map(|a| (a.kind, bind(&a.name)))
            .collect();

        Some(Self { keys, attributes })
    }

    /// Natural key of `row`, or `None` when a drop-on-null component is null.
    pub fn key(&self, row: usize) -> Option<NaturalKey> {
        let mut parts = Vec::with_capacity(self.keys.len());
        for (kind, nulls, binding) in &self.keys {
            let part = match binding {
                Binding::Column(c) => KeyPart::from_cell(c, row, *kind),
                Binding::Literal(v) => KeyPart::from_literal(v, *kind),
                Binding::Absent => KeyPart::Null,
            };
            if part.is_null() && *nulls == NullPolicy::Drop {
                return None;
            }
            parts.push(part);
        }
        Some(NaturalKey(parts))
    }

    pub fn attributes(&self, row: usize) -> Vec<AttrValue> {
        self.attributes
            .iter()
            .map(|(kind, binding)| match binding {
                Binding::Column(c) => AttrValue::from_cell(c, row, *kind),
                Binding::Literal(v) => AttrValue::from_literal(v, *kind),
                Binding::Absent => AttrValue::Null,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DimensionRow {
    pub key: i32,
    pub natural_key: NaturalKey,
    pub attributes: Vec<AttrValue>,
}

/// A built dimension: distinct natural keys in sorted order, surrogate keys
/// dense from 1.
#[derive(Debug, Clone)]
pub struct Dimension {
    pub spec: DimensionSpec,
    pub rows: Vec<DimensionRow>,
    index: HashMap<NaturalKey, i32>,
}

impl Dimension {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn lookup(&self, key: &NaturalKey) -> Option<i32> {
        self.index.get(key).copied()
    }

    /// Surrogate key for `row` of `feed`, if the feed can produce a key for
    /// it and that key exists here.
    pub fn resolve(&self, extractor: &KeyExtractor<'_>, row: usize) -> Option<i32> {
        extractor.key(row).and_then(|k| self.lookup(&k))
    }

    /// Position of a natural-key column by name.
    pub fn key_position(&self, column: &str) -> Option<usize> {
        self.spec.natural_key.iter().position(|k| k.name == column)
    }
}

/// Build `spec` from whichever of its source feeds were staged.
///
/// Returns `None` when no feed can contribute or nothing survives null
/// filtering; downstream fact columns for this dimension are then null.
#[tracing::instrument(level = "info", skip_all, fields(dimension = %spec.name))]
pub fn build_dimension(spec: &DimensionSpec, feeds: &[StagedFeed]) -> Option<Dimension> {
    // 1) Collect every contributing feed in declared source order
    let mut distinct: BTreeMap<NaturalKey, Vec<AttrValue>> = BTreeMap::new();
    let mut contributors = 0usize;

    for source in &spec.sources {
        let Some(feed) = feeds.iter().find(|f| f.name == source.feed) else {
            debug!(feed = %source.feed, "source feed not staged");
            continue;
        };
        let Some(extractor) = KeyExtractor::bind(spec, feed) else {
            warn!(feed = %feed.name, "feed lacks required key columns; skipped as a source");
            continue;
        };
        contributors += 1;

        // 2) Extract, drop rows with a null drop-on-null component, dedupe.
        //    First occurrence keeps its attributes.
        let mut dropped = 0usize;
        for row in 0..feed.num_rows() {
            match extractor.key(row) {
                Some(k) => {
                    distinct
                        .entry(k)
                        .or_insert_with(|| extractor.attributes(row));
                }
                None => dropped += 1,
            }
        }
        debug!(feed = %feed.name, dropped, "rows without usable key");
    }

    if contributors == 0 || distinct.is_empty() {
        warn!(contributors, "dimension unavailable");
        return None;
    }

    // 3) Sorted natural keys → dense surrogate keys
    let mut rows = Vec::with_capacity(distinct.len());
    let mut index = HashMap::with_capacity(distinct.len());
    for (i, (natural_key, attributes)) in distinct.into_iter().enumerate() {
        let key = i as i32 + 1;
        index.insert(natural_key.clone(), key);
        rows.push(DimensionRow {
            key,
            natural_key,
            attributes,
        });
    }

    info!(rows = rows.len(), "dimension built");
    Some(Dimension {
        spec: spec.clone(),
        rows,
        index,
    })
}

pub(crate) fn key_array<'r, I>(kind: KeyKind, parts: I) -> ArrayRef
where
    I: Iterator<Item = &'r KeyPart>,
{
    match kind {
        KeyKind::Text => {
            let mut b = StringBuilder::new();
            for p in parts {
                b.append_option(p.as_text());
            }
            Arc::new(b.finish())
        }
        KeyKind::Integer => {
            let mut b = Int64Builder::new();
            for p in parts {
                b.append_option(p.as_int());
            }
            Arc::new(b.finish())
        }
    }
}

pub(crate) fn key_data_type(kind: KeyKind) -> DataType {
    match kind {
        KeyKind::Text => DataType::Utf8,
        KeyKind::Integer => DataType::Int64,
    }
}

fn attribute_array<'r, I>(kind: AttributeKind, values: I) -> ArrayRef
where
    I: Iterator<Item = &'r AttrValue>,
{
    match kind {
        AttributeKind::Text => {
            let mut b = StringBuilder::new();
            for v in values {
                b.append_option(match v {
                    AttrValue::Text(s) => Some(s.as_str()),
                    _ => None,
                });
            }
            Arc::new(b.finish())
        }
        AttributeKind::Integer => {
            let mut b = Int64Builder::new();
            for v in values {
                b.append_option(match v {
                    AttrValue::Int(i) => Some(*i),
                    _ => None,
                });
            }
            Arc::new(b.finish())
        }
        AttributeKind::Float => {
            let mut b = Float64Builder::new();
            for v in values {
                b.append_option(match v {
                    AttrValue::Float(f) => Some(*f),
                    AttrValue::Int(i) => Some(*i as f64),
                    _ => None,
                });
            }
            Arc::new(b.finish())
        }
    }
}

impl Table for Dimension {
    fn table_name(&self) -> &str {
        &self.spec.name
    }

    fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut fields = vec![Field::new(&self.spec.key_column, DataType::Int32, false)];
        let mut arrays: Vec<ArrayRef> = vec![Arc::new(Int32Array::from_iter_values(
            self.rows.iter().map(|r| r.key),
        ))];

        for (i, k) in self.spec.natural_key.iter().enumerate() {
            fields.push(Field::new(&k.name, key_data_type(k.kind), true));
            arrays.push(key_array(
                k.kind,
                self.rows.iter().map(|r| &r.natural_key.parts()[i]),
            ));
        }
        for (i, a) in self.spec.attributes.iter().enumerate() {
            let dt = match a.kind {
                AttributeKind::Text => DataType::Utf8,
                AttributeKind::Integer => DataType::Int64,
                AttributeKind::Float => DataType::Float64,
            };
            fields.push(Field::new(&a.name, dt, true));
            arrays.push(attribute_array(
                a.kind,
                self.rows.iter().map(|r| &r.attributes[i]),
            ));
        }

        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::stage;
    use super::*;
    use crate::config::EtlConfig;
    use arrow::array::{Array, Int32Array as I32, Int64Array, StringArray};

    const LOC: [&str; 7] = [
        "BOROUGH",
        "ZIPCODE",
        "POLICEPRECINCT",
        "CITYCOUNCILDISTRICT",
        "COMMUNITYDISTRICT",
        "COMMUNITYSCHOOLDISTRICT",
        "CONGRESSIONALDISTRICT",
    ];
    const FIRE_LOC: [&str; 7] = [
        "INCIDENT_BOROUGH",
        "ZIPCODE",
        "POLICEPRECINCT",
        "CITYCOUNCILDISTRICT",
        "COMMUNITYDISTRICT",
        "COMMUNITYSCHOOLDISTRICT",
        "CONGRESSIONALDISTRICT",
    ];

    fn location(cfg: &EtlConfig) -> &DimensionSpec {
        cfg.dimensions.iter().find(|d| d.name == "dim_location").unwrap()
    }

    #[test]
    fn location_is_union_of_feeds_sorted_and_dense() {
        let cfg = EtlConfig::default();
        let ems = stage(
            &cfg,
            "ems",
            &LOC,
            &[
                &["QUEENS", "11101", "108", "26", "402", "30", "7"],
                &["Richmond / Staten Island", "10301", "120", "49", "501", "31", "11"],
                &["QUEENS", "11101", "108", "26", "402", "30", "7"],
                &["BRONX", "", "40", "8", "201", "7", "15"],
            ],
        );
        let fire = stage(
            &cfg,
            "fire",
            &FIRE_LOC,
            &[
                &["staten island", "10301", "120", "49", "501", "31", "11"],
                &["BROOKLYN", "11201", "84", "33", "302", "13", "10"],
                &["", "10001", "", "", "", "", ""],
            ],
        );

        let dim = build_dimension(location(&cfg), &[ems, fire]).unwrap();
        // null zipcode dropped, staten island deduped across feeds
        assert_eq!(dim.len(), 4);
        let keys: Vec<i32> = dim.rows.iter().map(|r| r.key).collect();
        assert_eq!(keys, vec![1, 2, 3, 4]);
        let boroughs: Vec<&KeyPart> = dim.rows.iter().map(|r| &r.natural_key.parts()[0]).collect();
        assert_eq!(boroughs[0].as_text(), Some("BROOKLYN"));
        assert_eq!(boroughs[1].as_text(), Some("QUEENS"));
        assert_eq!(boroughs[2].as_text(), Some("STATEN ISLAND"));
        // null borough kept, sorted last
        assert!(boroughs[3].is_null());
        assert_eq!(dim.rows[3].natural_key.parts()[1], KeyPart::Int(10001));
    }

    #[test]
    fn firehouse_drops_unnamed_and_keeps_other_nulls() {
        let cfg = EtlConfig::default();
        let spec = cfg.dimensions.iter().find(|d| d.name == "dim_firehouse").unwrap();
        let houses = stage(
            &cfg,
            "firehouse",
            &["FacilityName", "FacilityAddress", "Borough", "Postcode", "Latitude", "Longitude"],
            &[
                &["Engine 207", "172 Tillary Street", "Brooklyn", "11201", "40.69", "-73.98"],
                &["", "1 Nowhere Road", "Queens", "11101", "", ""],
                &["Fireboat Station", "", "", "", "", ""],
            ],
        );

        let dim = build_dimension(spec, &[houses]).unwrap();
        assert_eq!(dim.len(), 2);
        let names: Vec<Option<&str>> = dim
            .rows
            .iter()
            .map(|r| r.natural_key.parts()[0].as_text())
            .collect();
        assert_eq!(names, vec![Some("ENGINE 207"), Some("FIREBOAT STATION")]);

        let boat = &dim.rows[1].natural_key.parts()[1..];
        assert!(boat.iter().all(KeyPart::is_null));
        assert_eq!(dim.rows[1].attributes, vec![AttrValue::Null, AttrValue::Null]);
    }

    #[test]
    fn rebuild_is_deterministic() {
        let cfg = EtlConfig::default();
        let mk = || {
            stage(
                &cfg,
                "ems",
                &LOC,
                &[
                    &["QUEENS", "11101", "108", "26", "402", "30", "7"],
                    &["BRONX", "10451", "40", "8", "201", "7", "15"],
                ],
            )
        };
        let a = build_dimension(location(&cfg), &[mk()]).unwrap();
        let b = build_dimension(location(&cfg), &[mk()]).unwrap();
        assert_eq!(a.rows, b.rows);
    }

    #[test]
    fn missing_drop_column_disables_source() {
        let cfg = EtlConfig::default();
        // no ZIPCODE at all
        let ems = stage(&cfg, "ems", &["BOROUGH"], &[&["QUEENS"]]);
        assert!(build_dimension(location(&cfg), &[ems]).is_none());
    }

    #[test]
    fn literal_columns_and_attributes() -> anyhow::Result<()> {
        let cfg = EtlConfig::default();
        let spec = cfg.dimensions.iter().find(|d| d.name == "dim_incident_type").unwrap();
        let ems = stage(&cfg, "ems", &["FINAL_CALL_TYPE"], &[&["arrest"], &["ARREST"], &[""]]);
        let fire = stage(
            &cfg,
            "fire",
            &["INCIDENT_CLASSIFICATION", "INCIDENT_CLASSIFICATION_GROUP"],
            &[&["Demolition", "Structural Fires"]],
        );
        let dim = build_dimension(spec, &[ems, fire]).unwrap();
        assert_eq!(dim.len(), 2);

        let batch = dim.to_record_batch()?;
        assert_eq!(batch.num_rows(), 2);
        let keys = batch.column(0).as_any().downcast_ref::<I32>().unwrap();
        assert_eq!(keys.values().to_vec(), vec![1, 2]);
        let source = batch.column_by_name("source").unwrap();
        let source = source.as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(source.value(0), "EMS");
        assert_eq!(source.value(1), "FIRE");
        let cat = batch.column_by_name("category").unwrap();
        let cat = cat.as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(cat.value(0), "Medical");
        assert_eq!(cat.value(1), "Structural Fires");
        Ok(())
    }

    #[test]
    fn fact_side_lookup_matches() {
        let cfg = EtlConfig::default();
        let ems = stage(
            &cfg,
            "ems",
            &LOC,
            &[
                &["queens ", "11101.0", "108", "26", "402", "30", "7"],
                &["QUEENS", "", "108", "26", "402", "30", "7"],
            ],
        );
        let dim = build_dimension(location(&cfg), std::slice::from_ref(&ems)).unwrap();
        let ex = KeyExtractor::bind(&dim.spec, &ems).unwrap();
        assert_eq!(dim.resolve(&ex, 0), Some(1));
        assert_eq!(dim.resolve(&ex, 1), None);

        let batch = dim.to_record_batch().unwrap();
        let zip = batch.column_by_name("zipcode").unwrap();
        let zip = zip.as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(zip.value(0), 11101);
        assert!(zip.is_valid(0));
    }
}
