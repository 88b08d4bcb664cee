pub mod data_type;
pub mod page;
pub mod record;
pub mod snapshot;

pub use data_type::{DataType, UnknownDataType};
pub use page::PageResponse;
pub use record::{
    FeatureAttributes, FeatureId, Geometry, LuminaireAttributes, LuminaireStatus,
    OutageAreaAttributes, OutageCause, OutagePointAttributes, OutageStatus, ProcessedRecord,
};
pub use snapshot::{AccessLevel, SnapshotDocument, SnapshotRef};
