use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};

use crate::data_type::DataType;

/// Upstream feature identifier. The source reports OBJECTID as either a
/// number or a string depending on the layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureId {
    Number(i64),
    Text(String),
}

impl Display for FeatureId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FeatureId::Number(n) => write!(f, "{}", n),
            FeatureId::Text(s) => f.write_str(s),
        }
    }
}

/// GeoJSON-style geometry attached to every processed record.
/// Coordinates are `[x, y]` in the WGS84 frame the upstream query requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: [f64; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LuminaireStatus {
    Active,
    Inactive,
    Maintenance,
    Outage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutageStatus {
    Reported,
    Investigating,
    Repairing,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutageCause {
    EquipmentFailure,
    Weather,
    Accident,
    Maintenance,
    Unknown,
}

/// Attributes of one street luminaire feature.
///
/// Identifier and status are validated eagerly on deserialization; fields the
/// schema does not name pass through unchanged in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LuminaireAttributes {
    #[serde(rename = "OBJECTID")]
    pub object_id: FeatureId,
    #[serde(rename = "GlobalID", default, skip_serializing_if = "Option::is_none")]
    pub global_id: Option<String>,
    pub name: String,
    pub status: LuminaireStatus,
    // fixture type, e.g. "streetlight" or "LED"
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wattage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installation_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Attributes of one outage polygon feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutageAreaAttributes {
    #[serde(rename = "OBJECTID")]
    pub object_id: FeatureId,
    #[serde(rename = "GlobalID", default, skip_serializing_if = "Option::is_none")]
    pub global_id: Option<String>,
    pub name: String,
    pub customers_affected: u32,
    pub status: OutageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_restoration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Attributes of one reported outage point feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutagePointAttributes {
    #[serde(rename = "OBJECTID")]
    pub object_id: FeatureId,
    #[serde(rename = "GlobalID", default, skip_serializing_if = "Option::is_none")]
    pub global_id: Option<String>,
    pub status: OutageStatus,
    pub cause: OutageCause,
    pub reported_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Per-data-type attribute schema, tagged by the layer the record came from.
///
/// Serialized untagged so persisted snapshots keep the flat attribute shape
/// the upstream source uses. Variant order matters for deserialization: the
/// required fields of each schema are disjoint enough that the first matching
/// variant is the correct one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureAttributes {
    Luminaire(LuminaireAttributes),
    OutageArea(OutageAreaAttributes),
    OutagePoint(OutagePointAttributes),
}

impl FeatureAttributes {
    /// Parse a raw attribute map under the schema selected by `data_type`.
    pub fn from_value(data_type: DataType, value: Value) -> Result<Self, serde_json::Error> {
        match data_type {
            DataType::Luminaire => serde_json::from_value(value).map(FeatureAttributes::Luminaire),
            DataType::OutageArea => {
                serde_json::from_value(value).map(FeatureAttributes::OutageArea)
            }
            DataType::OutagePoint => {
                serde_json::from_value(value).map(FeatureAttributes::OutagePoint)
            }
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            FeatureAttributes::Luminaire(_) => DataType::Luminaire,
            FeatureAttributes::OutageArea(_) => DataType::OutageArea,
            FeatureAttributes::OutagePoint(_) => DataType::OutagePoint,
        }
    }

    pub fn object_id(&self) -> &FeatureId {
        match self {
            FeatureAttributes::Luminaire(a) => &a.object_id,
            FeatureAttributes::OutageArea(a) => &a.object_id,
            FeatureAttributes::OutagePoint(a) => &a.object_id,
        }
    }

    pub fn global_id(&self) -> Option<&str> {
        match self {
            FeatureAttributes::Luminaire(a) => a.global_id.as_deref(),
            FeatureAttributes::OutageArea(a) => a.global_id.as_deref(),
            FeatureAttributes::OutagePoint(a) => a.global_id.as_deref(),
        }
    }
}

/// One normalized feature, ready for snapshot persistence.
///
/// The attribute fields stay flat next to `id` and `geometry`, preserving the
/// record shape clients already consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub id: String,
    #[serde(flatten)]
    pub attributes: FeatureAttributes,
    pub geometry: Geometry,
}

impl ProcessedRecord {
    /// Stable identifier for a feature: the upstream GlobalID when present,
    /// the OBJECTID rendered as text otherwise.
    pub fn stable_id(attributes: &FeatureAttributes) -> String {
        match attributes.global_id() {
            Some(gid) => gid.to_string(),
            None => attributes.object_id().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Tests schema-directed parsing of raw luminaire attributes
    /// Purpose: identifier and status are validated eagerly, unknown keys pass through
    /// Expected: typed fields populated, undeclared key lands in extra
    #[test]
    fn test_luminaire_attributes_from_value() {
        let raw = json!({
            "OBJECTID": 7,
            "GlobalID": "lum-7",
            "name": "Luminaire 7",
            "status": "active",
            "type": "streetlight",
            "wattage": 150,
            "circuit_ref": "C-12"
        });
        let attrs = FeatureAttributes::from_value(DataType::Luminaire, raw).unwrap();
        let FeatureAttributes::Luminaire(lum) = &attrs else {
            panic!("expected luminaire attributes");
        };
        assert_eq!(lum.object_id, FeatureId::Number(7));
        assert_eq!(lum.status, LuminaireStatus::Active);
        assert_eq!(lum.extra.get("circuit_ref"), Some(&json!("C-12")));
        assert_eq!(ProcessedRecord::stable_id(&attrs), "lum-7");
    }

    /// Tests rejection of a record missing its identifier
    /// Purpose: identifier validation is eager, not deferred to consumers
    /// Expected: from_value fails when OBJECTID is absent
    #[test]
    fn test_missing_object_id_rejected() {
        let raw = json!({ "name": "nameless", "status": "active", "type": "LED" });
        assert!(FeatureAttributes::from_value(DataType::Luminaire, raw).is_err());
    }

    /// Tests the untagged round-trip of a processed record
    /// Purpose: snapshots are read back through the untagged enum; the variant
    ///          must survive serialize-then-deserialize
    /// Expected: an outage point record deserializes back to the same variant
    #[test]
    fn test_processed_record_untagged_round_trip() {
        let record = ProcessedRecord {
            id: "point-3".to_string(),
            attributes: FeatureAttributes::OutagePoint(OutagePointAttributes {
                object_id: FeatureId::Number(3),
                global_id: Some("point-3".to_string()),
                status: OutageStatus::Investigating,
                cause: OutageCause::Weather,
                reported_at: "2026-08-01T10:00:00Z".to_string(),
                resolved_at: None,
                extra: Map::new(),
            }),
            geometry: Geometry {
                kind: "Point".to_string(),
                coordinates: [-0.1278, 51.5074],
            },
        };
        let text = serde_json::to_string(&record).unwrap();
        let back: ProcessedRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.attributes.data_type(), DataType::OutagePoint);
    }
}
