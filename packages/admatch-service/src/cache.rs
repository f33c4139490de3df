use std::{
	num::NonZeroUsize,
	sync::{Mutex, MutexGuard},
};

use lru::LruCache;
use serde_json::Value;
use time::{Duration, OffsetDateTime};

use crate::{Error, Result, matching::MatchResponse, request::NormalizedRequest};

const MATCH_CACHE_KIND: &str = "match";

/// Bounded response cache: LRU for capacity, plus an independent TTL checked on read. An
/// expired entry counts as a miss and is dropped.
pub struct ResultCache {
	entries: Mutex<LruCache<String, CacheEntry>>,
	ttl: Duration,
}

struct CacheEntry {
	response: MatchResponse,
	created_at: OffsetDateTime,
}

impl ResultCache {
	pub fn new(cfg: &admatch_config::Cache) -> Self {
		let capacity = NonZeroUsize::new(cfg.capacity as usize).unwrap_or(NonZeroUsize::MIN);

		Self {
			entries: Mutex::new(LruCache::new(capacity)),
			ttl: Duration::seconds(cfg.ttl_seconds),
		}
	}

	pub fn get(&self, key: &str, now: OffsetDateTime) -> Option<MatchResponse> {
		let mut entries = self.lock();
		let entry = entries.get(key)?;

		if now - entry.created_at > self.ttl {
			entries.pop(key);

			return None;
		}

		Some(entry.response.clone())
	}

	pub fn put(&self, key: String, response: MatchResponse, now: OffsetDateTime) {
		self.lock().put(key, CacheEntry { response, created_at: now });
	}

	pub fn clear(&self) {
		self.lock().clear();
	}

	pub fn len(&self) -> usize {
		self.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn lock(&self) -> MutexGuard<'_, LruCache<String, CacheEntry>> {
		match self.entries.lock() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		}
	}
}

/// Digest of the normalized request. Normalization already sorted the term lists and boosts,
/// so equal requests digest identically regardless of input order. Diagnostics never feed
/// the key.
pub fn request_digest(normalized: &NormalizedRequest, schema_version: i32) -> Result<String> {
	let boosts: Vec<Value> = normalized
		.boosts
		.iter()
		.map(|(keyword, multiplier)| serde_json::json!([keyword, multiplier]))
		.collect();
	let payload = serde_json::json!({
		"kind": MATCH_CACHE_KIND,
		"schema_version": schema_version,
		"context_text": normalized.context_text,
		"top_k": normalized.top_k,
		"placement": normalized.placement,
		"surface": normalized.surface,
		"constraints": normalized.constraints,
		"boosts": boosts,
	});

	hash_cache_key(&payload)
}

fn hash_cache_key(payload: &Value) -> Result<String> {
	let raw = serde_json::to_vec(payload).map_err(|err| Error::Storage {
		message: format!("Failed to encode cache key payload: {err}"),
	})?;

	Ok(blake3::hash(&raw).to_hex().to_string())
}
