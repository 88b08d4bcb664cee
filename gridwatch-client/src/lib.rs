//! Gridwatch client
//!
//! Consuming side of the pins feed: a version-coherent chunk cache and a
//! sequential pager over `GET /pins`.

pub mod errors;
pub use errors::ClientError;

mod chunk_cache;
pub use chunk_cache::ChunkCache;

mod assembly;
pub use assembly::{ChunkAssembly, IngestOutcome};

mod pins_client;
pub use pins_client::{PinsClient, PinsClientBuilder};
