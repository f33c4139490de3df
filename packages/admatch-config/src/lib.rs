mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Audit, Cache, Config, EmbeddingProviderConfig, Matching, Providers, Qdrant, Security, Service,
	Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.mcp_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.mcp_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.qdrant.url.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.url must be non-empty.".to_string(),
		});
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.collection must be non-empty.".to_string(),
		});
	}
	if cfg.storage.qdrant.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "storage.qdrant.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.embedding.api_key must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.matching.max_top_k == 0 || cfg.matching.max_top_k > 100 {
		return Err(Error::Validation {
			message: "matching.max_top_k must be in the range 1-100.".to_string(),
		});
	}
	if cfg.matching.default_top_k == 0 || cfg.matching.default_top_k > cfg.matching.max_top_k {
		return Err(Error::Validation {
			message: "matching.default_top_k must be in the range 1-matching.max_top_k."
				.to_string(),
		});
	}
	if cfg.matching.overfetch_factor == 0 {
		return Err(Error::Validation {
			message: "matching.overfetch_factor must be greater than zero.".to_string(),
		});
	}
	if cfg.matching.max_batch_size == 0 {
		return Err(Error::Validation {
			message: "matching.max_batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.matching.upsert_batch_size == 0 {
		return Err(Error::Validation {
			message: "matching.upsert_batch_size must be greater than zero.".to_string(),
		});
	}
	if !cfg.matching.low_pacing_threshold.is_finite()
		|| !(0.0..=1.0).contains(&cfg.matching.low_pacing_threshold)
	{
		return Err(Error::Validation {
			message: "matching.low_pacing_threshold must be in the range 0.0-1.0.".to_string(),
		});
	}
	if !cfg.matching.adaptive_min.is_finite() || cfg.matching.adaptive_min <= 0.0 {
		return Err(Error::Validation {
			message: "matching.adaptive_min must be greater than zero.".to_string(),
		});
	}
	if !cfg.matching.adaptive_max.is_finite()
		|| cfg.matching.adaptive_max < cfg.matching.adaptive_min
	{
		return Err(Error::Validation {
			message: "matching.adaptive_max must be matching.adaptive_min or greater.".to_string(),
		});
	}
	if cfg.matching.placements.is_empty() {
		return Err(Error::Validation {
			message: "matching.placements must be non-empty.".to_string(),
		});
	}
	if cfg.matching.placements.iter().any(|placement| placement.trim().is_empty()) {
		return Err(Error::Validation {
			message: "matching.placements entries must be non-empty.".to_string(),
		});
	}
	if cfg.cache.enabled && cfg.cache.capacity == 0 {
		return Err(Error::Validation {
			message: "cache.capacity must be greater than zero when cache.enabled is true."
				.to_string(),
		});
	}
	if cfg.cache.ttl_seconds <= 0 {
		return Err(Error::Validation {
			message: "cache.ttl_seconds must be greater than zero.".to_string(),
		});
	}
	if cfg.audit.capacity == 0 {
		return Err(Error::Validation {
			message: "audit.capacity must be greater than zero.".to_string(),
		});
	}
	if cfg.audit.retention_seconds <= 0 {
		return Err(Error::Validation {
			message: "audit.retention_seconds must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.security.api_auth_token.as_deref().map(|token| token.trim().is_empty()).unwrap_or(false)
	{
		cfg.security.api_auth_token = None;
	}

	for placement in &mut cfg.matching.placements {
		*placement = placement.trim().to_ascii_lowercase();
	}
}
