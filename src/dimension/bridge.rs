use arrow::{
    array::{ArrayRef, Int32Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::{collections::BTreeSet, sync::Arc};
use tracing::info;

use super::{key_array, key_data_type, Dimension, KeyPart};
use crate::config::{BridgeSpec, KeyKind};
use crate::error::{EtlError, Result, Stage};
use crate::export::Table;

/// Distinct `(dimension key, columns...)` rows projected from a dimension.
#[derive(Debug, Clone)]
pub struct Bridge {
    pub name: String,
    pub key_column: String,
    pub columns: Vec<(String, KeyKind)>,
    pub rows: Vec<(i32, Vec<KeyPart>)>,
}

/// Project `spec.columns` out of `dim`, leaving out rows with a null in
/// any `spec.required` column.
pub fn build_bridge(spec: &BridgeSpec, dim: &Dimension) -> Result<Bridge> {
    let position = |c: &str| {
        dim.key_position(c).ok_or_else(|| {
            EtlError::stage(
                Stage::Dimensions,
                format!("bridge `{}`: `{}` is not a key of `{}`", spec.name, c, dim.name()),
            )
        })
    };
    let projected = spec
        .columns
        .iter()
        .map(|c| position(c))
        .collect::<Result<Vec<_>>>()?;
    let required = spec
        .required
        .iter()
        .map(|c| position(c))
        .collect::<Result<Vec<_>>>()?;

    let mut distinct: BTreeSet<(i32, Vec<KeyPart>)> = BTreeSet::new();
    for row in &dim.rows {
        let parts = row.natural_key.parts();
        if required.iter().any(|&i| parts[i].is_null()) {
            continue;
        }
        distinct.insert((row.key, projected.iter().map(|&i| parts[i].clone()).collect()));
    }

    let columns = projected
        .iter()
        .map(|&i| {
            let k = &dim.spec.natural_key[i];
            (k.name.clone(), k.kind)
        })
        .collect();

    info!(bridge = %spec.name, rows = distinct.len(), "bridge built");
    Ok(Bridge {
        name: spec.name.clone(),
        key_column: dim.spec.key_column.clone(),
        columns,
        rows: distinct.into_iter().collect(),
    })
}

impl Table for Bridge {
    fn table_name(&self) -> &str {
        &self.name
    }

    fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut fields = vec![Field::new(&self.key_column, DataType::Int32, false)];
        let mut arrays: Vec<ArrayRef> = vec![Arc::new(Int32Array::from_iter_values(
            self.rows.iter().map(|(k, _)| *k),
        ))];
        for (i, (name, kind)) in self.columns.iter().enumerate() {
            fields.push(Field::new(name, key_data_type(*kind), true));
            arrays.push(key_array(*kind, self.rows.iter().map(|(_, parts)| &parts[i])));
        }
        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EtlConfig;
    use crate::dimension::{build_dimension, test_support::stage};
    use arrow::array::{Array, Int64Array};

    #[test]
    fn firehouses_without_zip_are_left_out() -> anyhow::Result<()> {
        let cfg = EtlConfig::default();
        let houses = stage(
            &cfg,
            "firehouse",
            &["FacilityName", "FacilityAddress", "Borough", "Postcode", "Latitude", "Longitude"],
            &[
                &["Engine 1", "142 W 31 St", "Manhattan", "10001", "40.74", "-73.99"],
                &["Engine 2", "", "Richmond", "", "", ""],
                &["Ladder 3", "108 E 13 St", "Manhattan", "10003", "40.73", "-73.98"],
            ],
        );
        let dim_spec = cfg.dimensions.iter().find(|d| d.name == "dim_firehouse").unwrap();
        let dim = build_dimension(dim_spec, &[houses]).unwrap();
        assert_eq!(dim.len(), 3);

        let bridge = build_bridge(&cfg.bridges[0], &dim)?;
        assert_eq!(bridge.rows.len(), 2);

        let batch = bridge.to_record_batch()?;
        assert_eq!(batch.schema().field(0).name(), "firehouse_key");
        let zips = batch.column_by_name("zipcode").unwrap();
        let zips = zips.as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(zips.null_count(), 0);
        assert_eq!(zips.value(0), 10001);
        Ok(())
    }
}
