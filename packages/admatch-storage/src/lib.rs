pub mod error;
pub mod models;
pub mod qdrant;

pub use error::{Error, Result};
pub use models::{CoarseFilter, CollectionStatus, VectorHit};
pub use qdrant::QdrantStore;
