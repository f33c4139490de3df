pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Retrieval unavailable: {message}")]
	RetrievalUnavailable { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Inconsistent candidate: {message}")]
	Inconsistency { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<color_eyre::Report> for Error {
	fn from(err: color_eyre::Report) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<admatch_storage::Error> for Error {
	fn from(err: admatch_storage::Error) -> Self {
		match err {
			admatch_storage::Error::Qdrant(inner) => Self::Storage { message: inner.to_string() },
			admatch_storage::Error::NotFound(message) => Self::NotFound { message },
			admatch_storage::Error::InvalidPayload(message) => Self::Inconsistency { message },
		}
	}
}
