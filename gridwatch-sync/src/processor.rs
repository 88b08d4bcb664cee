use serde_json::Value;

use gridwatch_core::{DataType, FeatureAttributes, Geometry, ProcessedRecord};

use crate::errors::{Result, SyncError};
use crate::upstream::FeatureSet;

/// Normalize an upstream response into storage-ready records.
///
/// Total over its input: every feature yields exactly one record, or the
/// whole call fails. Identifier and geometry are validated here; attributes
/// the schema doesn't name pass through untouched.
pub fn process(data_type: DataType, set: &FeatureSet) -> Result<Vec<ProcessedRecord>> {
    let geometry_kind = geometry_kind(set);
    set.features
        .iter()
        .map(|feature| {
            let attributes = FeatureAttributes::from_value(
                data_type,
                Value::Object(feature.attributes.clone()),
            )
            .map_err(|e| SyncError::Processor(format!("{} attributes: {}", data_type, e)))?;
            Ok(ProcessedRecord {
                id: ProcessedRecord::stable_id(&attributes),
                attributes,
                geometry: Geometry {
                    kind: geometry_kind.clone(),
                    coordinates: [feature.geometry.x, feature.geometry.y],
                },
            })
        })
        .collect()
}

/// `esriGeometryPoint` -> `Point`; absent declarations default to `Point`.
fn geometry_kind(set: &FeatureSet) -> String {
    set.geometry_type
        .as_deref()
        .map(|g| g.strip_prefix("esriGeometry").unwrap_or(g).to_string())
        .unwrap_or_else(|| "Point".to_string())
}
