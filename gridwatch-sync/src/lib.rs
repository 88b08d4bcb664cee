mod errors;
pub use errors::{Result, SyncError};

pub mod upstream;
pub use upstream::{
    DataSource, EipSource, FeatureSet, RawFeature, RawPoint, SyntheticSource, UpstreamConfig,
    UpstreamSource,
};

pub mod processor;

mod coordinator;
pub use coordinator::{SyncCoordinator, SyncReceipt};

// Unit tests
#[cfg(test)]
mod coordinator_test;
