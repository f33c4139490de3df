use std::{collections::HashMap, time::Duration};

use qdrant_client::{
	Payload, Qdrant,
	qdrant::{
		Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointStruct,
		Query, QueryPointsBuilder, ScrollPointsBuilder, SetPayloadPointsBuilder, Value,
		VectorParamsBuilder, value::Kind,
	},
};
use serde_json::Value as JsonValue;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use admatch_domain::{
	BrandSafetyTier, Budget, Creative, PacingMode, Policy, Schedule, Targeting,
};

use crate::{
	Error, Result,
	models::{CoarseFilter, CollectionStatus, VectorHit},
};

pub struct QdrantStore {
	pub client: Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &admatch_config::Qdrant) -> Result<Self> {
		let client = Qdrant::from_url(&cfg.url)
			.timeout(Duration::from_millis(cfg.timeout_ms))
			.build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	/// Creates the creative collection if it does not exist yet. Idempotent.
	pub async fn ensure_collection(&self) -> Result<()> {
		if self.client.collection_exists(&self.collection).await? {
			return Ok(());
		}

		let builder = CreateCollectionBuilder::new(self.collection.clone()).vectors_config(
			VectorParamsBuilder::new(u64::from(self.vector_dim), Distance::Cosine),
		);

		self.client.create_collection(builder).await?;

		Ok(())
	}

	pub async fn collection_info(&self) -> Result<CollectionStatus> {
		let response = self.client.collection_info(&self.collection).await?;
		let info = response
			.result
			.ok_or_else(|| Error::NotFound(format!("Collection {} not found.", self.collection)))?;
		let status = qdrant_client::qdrant::CollectionStatus::try_from(info.status)
			.map(|status| format!("{status:?}").to_lowercase())
			.unwrap_or_else(|_| "unknown".to_string());

		Ok(CollectionStatus {
			collection: self.collection.clone(),
			points_count: info.points_count.unwrap_or(0),
			vector_dim: self.vector_dim,
			status,
		})
	}

	/// Upserts one batch of creatives with their embedding vectors. Point ids are derived
	/// deterministically from creative ids, so re-ingesting replaces in place.
	pub async fn upsert_creatives(&self, items: &[(Creative, Vec<f32>)]) -> Result<usize> {
		let mut points = Vec::with_capacity(items.len());

		for (creative, vector) in items {
			if vector.len() != self.vector_dim as usize {
				return Err(Error::InvalidPayload(format!(
					"Embedding vector for creative {} has {} dimensions, expected {}.",
					creative.creative_id,
					vector.len(),
					self.vector_dim
				)));
			}

			let point_id = point_id_for(&creative.creative_id);
			let payload = Payload::from(creative_payload(creative)?);

			points.push(PointStruct::new(point_id.to_string(), vector.clone(), payload));
		}

		let count = points.len();
		let upsert =
			qdrant_client::qdrant::UpsertPointsBuilder::new(self.collection.clone(), points)
				.wait(true);

		self.client.upsert_points(upsert).await?;

		Ok(count)
	}

	pub async fn delete_creative(&self, creative_id: &str) -> Result<()> {
		let filter = Filter::must([Condition::matches("creative_id", creative_id.to_string())]);
		let delete =
			DeletePointsBuilder::new(self.collection.clone()).points(filter).wait(true);

		self.client.delete_points(delete).await?;

		Ok(())
	}

	/// Explicit disable: flips the `enabled` payload flag so the coarse filter stops
	/// returning the creatives. The vectors stay in place.
	pub async fn disable_creatives(&self, creative_ids: &[String]) -> Result<usize> {
		if creative_ids.is_empty() {
			return Ok(0);
		}

		let mut payload_map = HashMap::new();

		payload_map.insert("enabled".to_string(), Value::from(false));

		let filter = Filter::must([Condition::matches("creative_id", creative_ids.to_vec())]);
		let set_payload =
			SetPayloadPointsBuilder::new(self.collection.clone(), Payload::from(payload_map))
				.points_selector(filter)
				.wait(true);

		self.client.set_payload(set_payload).await?;

		Ok(creative_ids.len())
	}

	pub async fn get_creative(&self, creative_id: &str) -> Result<Creative> {
		let filter = Filter::must([Condition::matches("creative_id", creative_id.to_string())]);
		let scroll = ScrollPointsBuilder::new(self.collection.clone())
			.filter(filter)
			.limit(1)
			.with_payload(true);
		let response = self.client.scroll(scroll).await?;
		let point = response
			.result
			.into_iter()
			.next()
			.ok_or_else(|| Error::NotFound(format!("Creative {creative_id} not found.")))?;

		decode_creative(&point.payload)
	}

	/// Nearest-neighbor search with the advisory coarse filter: only enabled creatives,
	/// minus the excluded ids. Results come back deduplicated and score-descending, at most
	/// `limit` of them. Points with undecodable payloads are logged and dropped.
	pub async fn search(
		&self,
		vector: &[f32],
		filter: &CoarseFilter,
		limit: u64,
	) -> Result<Vec<VectorHit>> {
		let query = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector.to_vec()))
			.filter(coarse_filter(filter))
			.with_payload(true)
			.limit(limit);
		let response = self.client.query(query).await?;
		let mut hits = Vec::with_capacity(response.result.len());
		let mut seen = std::collections::HashSet::new();

		for point in &response.result {
			let creative = match decode_creative(&point.payload) {
				Ok(creative) => creative,
				Err(err) => {
					tracing::warn!(error = %err, "Dropping candidate with invalid payload.");

					continue;
				},
			};

			if !seen.insert(creative.creative_id.clone()) {
				continue;
			}

			hits.push(VectorHit { similarity: point.score, creative });
		}

		Ok(hits)
	}
}

fn point_id_for(creative_id: &str) -> Uuid {
	Uuid::new_v5(&Uuid::NAMESPACE_OID, creative_id.as_bytes())
}

fn coarse_filter(filter: &CoarseFilter) -> Filter {
	let mut must_not = Vec::new();

	if !filter.exclude_advertiser_ids.is_empty() {
		must_not.push(Condition::matches("advertiser_id", filter.exclude_advertiser_ids.clone()));
	}
	if !filter.exclude_campaign_ids.is_empty() {
		must_not.push(Condition::matches("campaign_id", filter.exclude_campaign_ids.clone()));
	}
	if !filter.exclude_creative_ids.is_empty() {
		must_not.push(Condition::matches("creative_id", filter.exclude_creative_ids.clone()));
	}

	Filter {
		must: vec![Condition::matches("enabled", true)],
		should: Vec::new(),
		must_not,
		min_should: None,
	}
}

fn creative_payload(creative: &Creative) -> Result<HashMap<String, Value>> {
	let mut map = HashMap::new();

	map.insert("creative_id".to_string(), Value::from(creative.creative_id.clone()));
	map.insert("campaign_id".to_string(), Value::from(creative.campaign_id.clone()));
	map.insert("advertiser_id".to_string(), Value::from(creative.advertiser_id.clone()));
	map.insert("campaign_name".to_string(), Value::from(creative.campaign_name.clone()));
	map.insert("title".to_string(), Value::from(creative.title.clone()));
	map.insert("body".to_string(), Value::from(creative.body.clone()));
	map.insert("cta_text".to_string(), Value::from(creative.cta_text.clone()));
	map.insert(
		"landing_url".to_string(),
		creative
			.landing_url
			.as_ref()
			.map(|url| Value::from(url.clone()))
			.unwrap_or_else(|| Value::from(JsonValue::Null)),
	);
	map.insert("enabled".to_string(), Value::from(creative.enabled));
	map.insert("topics".to_string(), Value::from(JsonValue::from(creative.topics.clone())));
	map.insert(
		"targeting_topics".to_string(),
		Value::from(JsonValue::from(creative.targeting.topics.clone())),
	);
	map.insert(
		"locales".to_string(),
		Value::from(JsonValue::from(creative.targeting.locales.clone())),
	);
	map.insert(
		"verticals".to_string(),
		Value::from(JsonValue::from(creative.targeting.verticals.clone())),
	);
	map.insert(
		"audience_segments".to_string(),
		Value::from(JsonValue::from(creative.targeting.audience_segments.clone())),
	);
	map.insert(
		"blocked_keywords".to_string(),
		Value::from(JsonValue::from(creative.targeting.blocked_keywords.clone())),
	);
	map.insert("sensitive".to_string(), Value::from(creative.policy.sensitive));
	map.insert("age_restricted".to_string(), Value::from(creative.policy.age_restricted));
	map.insert(
		"brand_safety_tier".to_string(),
		Value::from(creative.policy.brand_safety_tier.as_str().to_string()),
	);
	map.insert("schedule_start".to_string(), timestamp_value(creative.schedule.start_at)?);
	map.insert("schedule_end".to_string(), timestamp_value(creative.schedule.end_at)?);
	map.insert(
		"daily_budget".to_string(),
		Value::from(JsonValue::from(creative.budget.daily_budget)),
	);
	map.insert(
		"total_budget".to_string(),
		Value::from(JsonValue::from(creative.budget.total_budget)),
	);
	map.insert("currency".to_string(), Value::from(creative.budget.currency.clone()));
	map.insert(
		"pacing_mode".to_string(),
		Value::from(
			match creative.budget.pacing_mode {
				PacingMode::Even => "even",
				PacingMode::Adaptive => "adaptive",
			}
			.to_string(),
		),
	);
	map.insert("cpm".to_string(), Value::from(JsonValue::from(creative.budget.cpm)));
	map.insert(
		"target_ctr".to_string(),
		Value::from(JsonValue::from(creative.budget.target_ctr)),
	);

	Ok(map)
}

fn timestamp_value(ts: Option<OffsetDateTime>) -> Result<Value> {
	match ts {
		Some(ts) => {
			let text = ts.format(&Rfc3339).map_err(|err| {
				Error::InvalidPayload(format!("Failed to format schedule timestamp: {err}"))
			})?;

			Ok(Value::from(text))
		},
		None => Ok(Value::from(JsonValue::Null)),
	}
}

fn decode_creative(payload: &HashMap<String, Value>) -> Result<Creative> {
	let creative_id = required_string(payload, "creative_id")?;
	let campaign_id = required_string(payload, "campaign_id")?;
	let advertiser_id = required_string(payload, "advertiser_id")?;
	let title = required_string(payload, "title")?;
	let body = required_string(payload, "body")?;

	Ok(Creative {
		creative_id,
		campaign_id,
		advertiser_id,
		campaign_name: payload_string(payload, "campaign_name").unwrap_or_default(),
		title,
		body,
		cta_text: payload_string(payload, "cta_text").unwrap_or_default(),
		landing_url: payload_string(payload, "landing_url"),
		enabled: payload_bool(payload, "enabled").unwrap_or(true),
		topics: payload_string_list(payload, "topics"),
		targeting: Targeting {
			topics: payload_string_list(payload, "targeting_topics"),
			locales: payload_string_list(payload, "locales"),
			verticals: payload_string_list(payload, "verticals"),
			audience_segments: payload_string_list(payload, "audience_segments"),
			blocked_keywords: payload_string_list(payload, "blocked_keywords"),
		},
		policy: Policy {
			sensitive: payload_bool(payload, "sensitive").unwrap_or(false),
			age_restricted: payload_bool(payload, "age_restricted").unwrap_or(false),
			brand_safety_tier: match payload_string(payload, "brand_safety_tier").as_deref() {
				Some("low") => BrandSafetyTier::Low,
				Some("high") => BrandSafetyTier::High,
				_ => BrandSafetyTier::Medium,
			},
		},
		schedule: Schedule {
			start_at: payload_rfc3339(payload, "schedule_start"),
			end_at: payload_rfc3339(payload, "schedule_end"),
		},
		budget: Budget {
			daily_budget: payload_f64(payload, "daily_budget"),
			total_budget: payload_f64(payload, "total_budget"),
			currency: payload_string(payload, "currency")
				.unwrap_or_else(|| "USD".to_string()),
			pacing_mode: match payload_string(payload, "pacing_mode").as_deref() {
				Some("adaptive") => PacingMode::Adaptive,
				_ => PacingMode::Even,
			},
			cpm: payload_f64(payload, "cpm").unwrap_or(0.0),
			target_ctr: payload_f64(payload, "target_ctr"),
		},
	})
}

fn required_string(payload: &HashMap<String, Value>, key: &str) -> Result<String> {
	payload_string(payload, key)
		.ok_or_else(|| Error::InvalidPayload(format!("Missing payload field {key}.")))
}

fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::StringValue(text)) => Some(text.to_string()),
		_ => None,
	}
}

fn payload_bool(payload: &HashMap<String, Value>, key: &str) -> Option<bool> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::BoolValue(value)) => Some(*value),
		_ => None,
	}
}

fn payload_f64(payload: &HashMap<String, Value>, key: &str) -> Option<f64> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::DoubleValue(value)) => Some(*value),
		Some(Kind::IntegerValue(value)) => Some(*value as f64),
		_ => None,
	}
}

fn payload_string_list(payload: &HashMap<String, Value>, key: &str) -> Vec<String> {
	let Some(value) = payload.get(key) else { return Vec::new() };

	match &value.kind {
		Some(Kind::ListValue(list)) => list
			.values
			.iter()
			.filter_map(|item| match &item.kind {
				Some(Kind::StringValue(text)) => Some(text.to_string()),
				_ => None,
			})
			.collect(),
		_ => Vec::new(),
	}
}

fn payload_rfc3339(payload: &HashMap<String, Value>, key: &str) -> Option<OffsetDateTime> {
	let text = payload_string(payload, key)?;

	OffsetDateTime::parse(text.as_str(), &Rfc3339).ok()
}
