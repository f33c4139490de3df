pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Qdrant(#[from] qdrant_client::QdrantError),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Invalid payload: {0}")]
	InvalidPayload(String),
}
