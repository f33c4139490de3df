use std::{
	fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
};

static COUNTER: AtomicU64 = AtomicU64::new(0);

const TEMPLATE: &str = r#"
[service]
mcp_bind = "127.0.0.1:9100"
log_level = "info"

[storage.qdrant]
url = "http://127.0.0.1:6334"
collection = "admatch_creatives"
vector_dim = 384

[providers.embedding]
provider_id = "siliconflow"
api_base = "https://api.siliconflow.com/v1"
api_key = "test-key"
path = "/embeddings"
model = "BAAI/bge-small-en-v1.5"
dimensions = 384
timeout_ms = 30000

[matching]
default_top_k = 5
max_top_k = 100
overfetch_factor = 4
max_batch_size = 500
upsert_batch_size = 64
min_context_chars = 20
low_pacing_threshold = 0.25
adaptive_min = 0.5
adaptive_max = 1.5
placements = ["inline", "sidebar", "banner"]
schema_version = 1

[cache]
enabled = true
capacity = 256
ttl_seconds = 300

[audit]
capacity = 10000
retention_seconds = 86400

[security]
api_auth_token = ""
"#;

fn write_temp_config(contents: &str) -> PathBuf {
	let id = COUNTER.fetch_add(1, Ordering::SeqCst);
	let path = std::env::temp_dir()
		.join(format!("admatch-config-{}-{id}.toml", std::process::id()));

	fs::write(&path, contents).expect("write temp config");

	path
}

fn load(contents: &str) -> admatch_config::Result<admatch_config::Config> {
	let path = write_temp_config(contents);
	let result = admatch_config::load(&path);

	let _ = fs::remove_file(&path);

	result
}

fn assert_validation_error(contents: &str, expected: &str) {
	let err = load(contents).expect_err("expected validation error");

	assert!(
		err.to_string().contains(expected),
		"unexpected error: {err} (expected to contain {expected:?})"
	);
}

#[test]
fn template_config_is_valid() {
	let cfg = load(TEMPLATE).expect("template config");

	assert_eq!(cfg.matching.default_top_k, 5);
	assert_eq!(cfg.cache.capacity, 256);
}

#[test]
fn blank_api_auth_token_normalizes_to_none() {
	let cfg = load(TEMPLATE).expect("template config");

	assert_eq!(cfg.security.api_auth_token, None);
}

#[test]
fn placements_normalize_to_lowercase() {
	let contents = TEMPLATE.replace(
		r#"placements = ["inline", "sidebar", "banner"]"#,
		r#"placements = ["Inline", " SIDEBAR "]"#,
	);
	let cfg = load(&contents).expect("config");

	assert_eq!(cfg.matching.placements, vec!["inline".to_string(), "sidebar".to_string()]);
}

#[test]
fn omitted_sections_fall_back_to_defaults() {
	let trimmed = TEMPLATE
		.split("[matching]")
		.next()
		.expect("template prefix")
		.to_string();
	let cfg = load(&trimmed).expect("config without tunable sections");

	assert_eq!(cfg.matching.overfetch_factor, 4);
	assert_eq!(cfg.audit.capacity, 10_000);
	assert!(cfg.cache.enabled);
}

#[test]
fn rejects_dimension_mismatch() {
	let contents = TEMPLATE.replace("dimensions = 384", "dimensions = 768");

	assert_validation_error(
		&contents,
		"providers.embedding.dimensions must match storage.qdrant.vector_dim.",
	);
}

#[test]
fn rejects_zero_embedding_dimensions() {
	let contents = TEMPLATE
		.replace("dimensions = 384", "dimensions = 0")
		.replace("vector_dim = 384", "vector_dim = 0");

	assert_validation_error(
		&contents,
		"providers.embedding.dimensions must be greater than zero.",
	);
}

#[test]
fn rejects_blank_embedding_api_key() {
	let contents = TEMPLATE.replace(r#"api_key = "test-key""#, r#"api_key = "  ""#);

	assert_validation_error(&contents, "providers.embedding.api_key must be non-empty.");
}

#[test]
fn rejects_max_top_k_above_hard_cap() {
	let contents = TEMPLATE.replace("max_top_k = 100", "max_top_k = 101");

	assert_validation_error(&contents, "matching.max_top_k must be in the range 1-100.");
}

#[test]
fn rejects_default_top_k_above_max_top_k() {
	let contents = TEMPLATE
		.replace("default_top_k = 5", "default_top_k = 50")
		.replace("max_top_k = 100", "max_top_k = 10");

	assert_validation_error(
		&contents,
		"matching.default_top_k must be in the range 1-matching.max_top_k.",
	);
}

#[test]
fn rejects_zero_overfetch_factor() {
	let contents = TEMPLATE.replace("overfetch_factor = 4", "overfetch_factor = 0");

	assert_validation_error(&contents, "matching.overfetch_factor must be greater than zero.");
}

#[test]
fn rejects_inverted_adaptive_bounds() {
	let contents = TEMPLATE.replace("adaptive_max = 1.5", "adaptive_max = 0.25");

	assert_validation_error(
		&contents,
		"matching.adaptive_max must be matching.adaptive_min or greater.",
	);
}

#[test]
fn rejects_out_of_range_low_pacing_threshold() {
	let contents =
		TEMPLATE.replace("low_pacing_threshold = 0.25", "low_pacing_threshold = 1.5");

	assert_validation_error(
		&contents,
		"matching.low_pacing_threshold must be in the range 0.0-1.0.",
	);
}

#[test]
fn rejects_blank_placement_entries() {
	let contents = TEMPLATE.replace(
		r#"placements = ["inline", "sidebar", "banner"]"#,
		r#"placements = ["inline", "  "]"#,
	);

	assert_validation_error(&contents, "matching.placements entries must be non-empty.");
}

#[test]
fn rejects_nonpositive_cache_ttl() {
	let contents = TEMPLATE.replace("ttl_seconds = 300", "ttl_seconds = 0");

	assert_validation_error(&contents, "cache.ttl_seconds must be greater than zero.");
}

#[test]
fn rejects_zero_cache_capacity_when_enabled() {
	let contents = TEMPLATE.replace("capacity = 256", "capacity = 0");

	assert_validation_error(
		&contents,
		"cache.capacity must be greater than zero when cache.enabled is true.",
	);
}

#[test]
fn rejects_nonpositive_audit_retention() {
	let contents = TEMPLATE.replace("retention_seconds = 86400", "retention_seconds = 0");

	assert_validation_error(&contents, "audit.retention_seconds must be greater than zero.");
}
