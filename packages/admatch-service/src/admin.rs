use serde::Serialize;
use serde_json::{Value, json};

use admatch_domain::{Campaign, Creative};
use admatch_storage::CollectionStatus;

use crate::{Error, MatchService, Result};

const HEALTH_PROBE_TEXT: &str = "ping";

#[derive(Clone, Copy, Debug, Serialize)]
pub struct UpsertReport {
	pub campaigns: usize,
	pub creatives: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct HealthReport {
	pub status: String,
	pub index: String,
	pub embedding: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub collection: Option<CollectionStatus>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CapabilitiesReport {
	pub schema_version: i32,
	pub embedding_model_id: String,
	pub placements: Vec<String>,
	pub constraint_keys: Vec<String>,
	pub limits: Value,
}

impl MatchService {
	/// Expands campaigns into creatives, embeds the contract text in configured batches, and
	/// upserts everything into the index. Re-running with unchanged input overwrites points in
	/// place, so ingestion is idempotent.
	pub async fn upsert_campaigns(&self, campaigns: &[Campaign]) -> Result<UpsertReport> {
		let creatives: Vec<Creative> =
			campaigns.iter().flat_map(Campaign::expand).collect();

		if creatives.is_empty() {
			return Ok(UpsertReport { campaigns: campaigns.len(), creatives: 0 });
		}

		let batch_size = (self.cfg.matching.upsert_batch_size as usize).max(1);
		let mut upserted = 0;

		for batch in creatives.chunks(batch_size) {
			let texts: Vec<String> = batch.iter().map(Creative::embedding_text).collect();
			let vectors = self
				.providers
				.embedding
				.embed(&self.cfg.providers.embedding, &texts)
				.await
				.map_err(Error::from)?;

			if vectors.len() != batch.len() {
				return Err(Error::Provider {
					message: format!(
						"Embedding provider returned {} vectors for {} creatives.",
						vectors.len(),
						batch.len()
					),
				});
			}

			let items: Vec<(Creative, Vec<f32>)> =
				batch.iter().cloned().zip(vectors).collect();

			upserted += self.index.upsert_creatives(items).await?;
		}

		tracing::info!(campaigns = campaigns.len(), creatives = upserted, "Upserted campaigns.");

		Ok(UpsertReport { campaigns: campaigns.len(), creatives: upserted })
	}

	pub async fn delete_creative(&self, creative_id: &str) -> Result<()> {
		Ok(self.index.delete_creative(creative_id).await?)
	}

	/// Clears the enabled flag without deleting the points, so the creatives drop out of
	/// retrieval but keep their stored payloads.
	pub async fn disable_creatives(&self, creative_ids: &[String]) -> Result<usize> {
		Ok(self.index.disable_creatives(creative_ids).await?)
	}

	pub async fn get_creative(&self, creative_id: &str) -> Result<Creative> {
		Ok(self.index.get_creative(creative_id).await?)
	}

	pub async fn ensure_collection(&self) -> Result<()> {
		Ok(self.index.ensure_collection().await?)
	}

	pub async fn collection_info(&self) -> Result<CollectionStatus> {
		Ok(self.index.collection_info().await?)
	}

	/// Probes both collaborators. Either one failing degrades the report instead of erroring,
	/// so a half-up deployment still answers.
	pub async fn health(&self) -> HealthReport {
		let collection = match self.index.collection_info().await {
			Ok(status) => Some(status),
			Err(err) => {
				tracing::warn!(error = %err, "Index health probe failed.");

				None
			},
		};
		let index = if collection.is_some() { "up" } else { "down" };
		let probe = vec![HEALTH_PROBE_TEXT.to_string()];
		let embedding = match self
			.providers
			.embedding
			.embed(&self.cfg.providers.embedding, &probe)
			.await
		{
			Ok(vectors) if !vectors.is_empty() => "up",
			Ok(_) => "down",
			Err(err) => {
				tracing::warn!(error = %err, "Embedding health probe failed.");

				"down"
			},
		};
		let status = if index == "up" && embedding == "up" { "ok" } else { "degraded" };

		HealthReport {
			status: status.to_string(),
			index: index.to_string(),
			embedding: embedding.to_string(),
			collection,
		}
	}

	pub fn capabilities(&self) -> CapabilitiesReport {
		CapabilitiesReport {
			schema_version: self.cfg.matching.schema_version,
			embedding_model_id: self.cfg.providers.embedding.model.clone(),
			placements: self.cfg.matching.placements.clone(),
			constraint_keys: vec![
				"topics".to_string(),
				"locale".to_string(),
				"verticals".to_string(),
				"audience_segments".to_string(),
				"exclude_advertiser_ids".to_string(),
				"exclude_campaign_ids".to_string(),
				"exclude_creative_ids".to_string(),
				"age_restricted_ok".to_string(),
				"sensitive_ok".to_string(),
			],
			limits: json!({
				"max_top_k": self.cfg.matching.max_top_k,
				"default_top_k": self.cfg.matching.default_top_k,
				"max_batch_size": self.cfg.matching.max_batch_size,
				"max_context_chars": crate::request::MAX_CONTEXT_CHARS,
				"boost_min": crate::request::BOOST_MIN,
				"boost_max": crate::request::BOOST_MAX,
			}),
		}
	}
}
