use std::{
	collections::{BTreeMap, HashMap, HashSet},
	sync::{Mutex, MutexGuard},
};

use admatch_config::EmbeddingProviderConfig;
use admatch_domain::{Creative, DeliverySnapshot};
use admatch_service::{BoxFuture, DeliveryStats, EmbeddingProvider};
use admatch_storage::{CoarseFilter, CollectionStatus, VectorHit};

/// Deterministic embedder: the vector is a pure function of the text bytes and the
/// configured dimension count, so identical inputs always embed identically.
#[derive(Debug, Default)]
pub struct StubEmbedder {
	fail: bool,
}
impl StubEmbedder {
	/// An embedder whose every call errors, for probing degraded paths.
	pub fn failing() -> Self {
		Self { fail: true }
	}

	pub fn vector_for(text: &str, dimensions: u32) -> Vec<f32> {
		let seed = text.bytes().fold(0_u64, |acc, byte| {
			acc.wrapping_mul(31).wrapping_add(u64::from(byte))
		});

		(0..dimensions)
			.map(|i| {
				let mixed = seed.wrapping_add(u64::from(i)).wrapping_mul(2_654_435_761);

				(mixed % 1_000) as f32 / 1_000.0
			})
			.collect()
	}
}

impl EmbeddingProvider for StubEmbedder {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			if self.fail {
				return Err(color_eyre::eyre::eyre!("Stub embedder is configured to fail."));
			}

			Ok(texts.iter().map(|text| Self::vector_for(text, cfg.dimensions)).collect())
		})
	}
}

#[derive(Default)]
struct IndexInner {
	points: BTreeMap<String, (Creative, Vec<f32>)>,
	scores: HashMap<String, f32>,
	fail_search: bool,
}

/// In-memory vector index. The coarse filter emulates an under-expressive backend: the id
/// exclusions are applied, the enabled flag is not, so the service's local re-validation is
/// exercised. Similarity comes from a fixed per-creative score when one is set, otherwise
/// from cosine similarity against the stored vector.
pub struct StubIndex {
	inner: Mutex<IndexInner>,
	collection: String,
	vector_dim: u32,
}
impl StubIndex {
	pub fn new(cfg: &admatch_config::Qdrant) -> Self {
		Self {
			inner: Mutex::new(IndexInner::default()),
			collection: cfg.collection.clone(),
			vector_dim: cfg.vector_dim,
		}
	}

	pub fn insert(&self, creative: Creative, vector: Vec<f32>) {
		self.lock().points.insert(creative.creative_id.clone(), (creative, vector));
	}

	/// Inserts with a pinned similarity so tests control the ranking directly.
	pub fn insert_scored(&self, creative: Creative, score: f32) {
		let mut inner = self.lock();

		inner.scores.insert(creative.creative_id.clone(), score);
		inner.points.insert(creative.creative_id.clone(), (creative, vec![]));
	}

	pub fn set_failing(&self, fail: bool) {
		self.lock().fail_search = fail;
	}

	pub fn len(&self) -> usize {
		self.lock().points.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn lock(&self) -> MutexGuard<'_, IndexInner> {
		match self.inner.lock() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		}
	}
}

impl admatch_service::VectorIndex for StubIndex {
	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		filter: &'a CoarseFilter,
		limit: u64,
	) -> BoxFuture<'a, admatch_storage::Result<Vec<VectorHit>>> {
		Box::pin(async move {
			let inner = self.lock();

			if inner.fail_search {
				return Err(admatch_storage::Error::NotFound(
					"Search transport unavailable.".to_string(),
				));
			}

			let mut seen = HashSet::new();
			let mut hits: Vec<VectorHit> = inner
				.points
				.values()
				.filter(|(creative, _)| {
					!filter.exclude_advertiser_ids.contains(&creative.advertiser_id)
						&& !filter.exclude_campaign_ids.contains(&creative.campaign_id)
						&& !filter.exclude_creative_ids.contains(&creative.creative_id)
				})
				.filter(|(creative, _)| seen.insert(creative.creative_id.clone()))
				.map(|(creative, stored)| VectorHit {
					similarity: inner
						.scores
						.get(&creative.creative_id)
						.copied()
						.unwrap_or_else(|| cosine(vector, stored)),
					creative: creative.clone(),
				})
				.collect();

			hits.sort_by(|a, b| {
				b.similarity
					.partial_cmp(&a.similarity)
					.unwrap_or(std::cmp::Ordering::Equal)
					.then_with(|| a.creative.creative_id.cmp(&b.creative.creative_id))
			});
			hits.truncate(limit as usize);

			Ok(hits)
		})
	}

	fn upsert_creatives<'a>(
		&'a self,
		items: Vec<(Creative, Vec<f32>)>,
	) -> BoxFuture<'a, admatch_storage::Result<usize>> {
		Box::pin(async move {
			let count = items.len();

			for (creative, vector) in items {
				self.insert(creative, vector);
			}

			Ok(count)
		})
	}

	fn delete_creative<'a>(
		&'a self,
		creative_id: &'a str,
	) -> BoxFuture<'a, admatch_storage::Result<()>> {
		Box::pin(async move {
			self.lock().points.remove(creative_id);

			Ok(())
		})
	}

	fn disable_creatives<'a>(
		&'a self,
		creative_ids: &'a [String],
	) -> BoxFuture<'a, admatch_storage::Result<usize>> {
		Box::pin(async move {
			let mut inner = self.lock();
			let mut disabled = 0;

			for creative_id in creative_ids {
				if let Some((creative, _)) = inner.points.get_mut(creative_id) {
					creative.enabled = false;
					disabled += 1;
				}
			}

			Ok(disabled)
		})
	}

	fn get_creative<'a>(
		&'a self,
		creative_id: &'a str,
	) -> BoxFuture<'a, admatch_storage::Result<Creative>> {
		Box::pin(async move {
			self.lock().points.get(creative_id).map(|(creative, _)| creative.clone()).ok_or_else(
				|| {
					admatch_storage::Error::NotFound(format!(
						"Creative {creative_id} does not exist."
					))
				},
			)
		})
	}

	fn ensure_collection<'a>(&'a self) -> BoxFuture<'a, admatch_storage::Result<()>> {
		Box::pin(async { Ok(()) })
	}

	fn collection_info<'a>(&'a self) -> BoxFuture<'a, admatch_storage::Result<CollectionStatus>> {
		Box::pin(async move {
			Ok(CollectionStatus {
				collection: self.collection.clone(),
				points_count: self.len() as u64,
				vector_dim: self.vector_dim,
				status: "green".to_string(),
			})
		})
	}
}

/// Delivery figures keyed by campaign id. Campaigns without an entry report no data, which
/// the pacing evaluator treats as full weight.
#[derive(Default)]
pub struct FixedDelivery {
	snapshots: Mutex<HashMap<String, DeliverySnapshot>>,
}
impl FixedDelivery {
	pub fn set(&self, campaign_id: &str, snapshot: DeliverySnapshot) {
		let mut snapshots = match self.snapshots.lock() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		};

		snapshots.insert(campaign_id.to_string(), snapshot);
	}
}

impl DeliveryStats for FixedDelivery {
	fn snapshot<'a>(&'a self, campaign_id: &'a str) -> BoxFuture<'a, Option<DeliverySnapshot>> {
		Box::pin(async move {
			let snapshots = match self.snapshots.lock() {
				Ok(guard) => guard,
				Err(poisoned) => poisoned.into_inner(),
			};

			snapshots.get(campaign_id).copied()
		})
	}
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
	if a.is_empty() || a.len() != b.len() {
		return 0.0;
	}

	let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
	let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
	let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

	if norm_a == 0.0 || norm_b == 0.0 { 0.0 } else { dot / (norm_a * norm_b) }
}
