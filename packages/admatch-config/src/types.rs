use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub matching: Matching,
	#[serde(default)]
	pub cache: Cache,
	#[serde(default)]
	pub audit: Audit,
	#[serde(default)]
	pub security: Security,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub mcp_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
	#[serde(default = "default_qdrant_timeout_ms")]
	pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Matching {
	pub default_top_k: u32,
	pub max_top_k: u32,
	pub overfetch_factor: u32,
	pub max_batch_size: u32,
	pub upsert_batch_size: u32,
	pub min_context_chars: u32,
	pub low_pacing_threshold: f32,
	pub adaptive_min: f32,
	pub adaptive_max: f32,
	pub placements: Vec<String>,
	pub schema_version: i32,
}
impl Default for Matching {
	fn default() -> Self {
		Self {
			default_top_k: 5,
			max_top_k: 100,
			overfetch_factor: 4,
			max_batch_size: 500,
			upsert_batch_size: 64,
			min_context_chars: 20,
			low_pacing_threshold: 0.25,
			adaptive_min: 0.5,
			adaptive_max: 1.5,
			placements: vec![
				"inline".to_string(),
				"sidebar".to_string(),
				"banner".to_string(),
			],
			schema_version: 1,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Cache {
	pub enabled: bool,
	pub capacity: u32,
	pub ttl_seconds: i64,
}
impl Default for Cache {
	fn default() -> Self {
		Self { enabled: true, capacity: 256, ttl_seconds: 300 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Audit {
	pub capacity: u32,
	pub retention_seconds: i64,
}
impl Default for Audit {
	fn default() -> Self {
		Self { capacity: 10_000, retention_seconds: 86_400 }
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Security {
	pub api_auth_token: Option<String>,
}

fn default_qdrant_timeout_ms() -> u64 {
	30_000
}
