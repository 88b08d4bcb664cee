use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// The closed set of dataset discriminators served by the gateway.
///
/// Each variant corresponds to one upstream feature layer and one family of
/// persisted snapshots. Snapshot cache keys, watermark paths and object names
/// are all derived from the kebab-case form (`luminaire`, `outage-area`,
/// `outage-point`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataType {
    Luminaire,
    OutageArea,
    OutagePoint,
}

#[derive(Debug, Clone, Error)]
#[error("unknown data type: {0}")]
pub struct UnknownDataType(pub String);

impl DataType {
    pub const ALL: [DataType; 3] = [
        DataType::Luminaire,
        DataType::OutageArea,
        DataType::OutagePoint,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Luminaire => "luminaire",
            DataType::OutageArea => "outage-area",
            DataType::OutagePoint => "outage-point",
        }
    }

    /// The attribute holding each layer's "last changed" timestamp.
    /// Delta queries filter on this field.
    pub fn delta_date_field(&self) -> &'static str {
        match self {
            DataType::Luminaire => "last_updated",
            DataType::OutageArea => "last_modified",
            DataType::OutagePoint => "reported_date",
        }
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = UnknownDataType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "luminaire" => Ok(DataType::Luminaire),
            "outage-area" => Ok(DataType::OutageArea),
            "outage-point" => Ok(DataType::OutagePoint),
            other => Err(UnknownDataType(other.to_string())),
        }
    }
}
