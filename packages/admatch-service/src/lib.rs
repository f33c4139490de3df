pub mod admin;
pub mod audit;
pub mod cache;
pub mod error;
pub mod matching;
pub mod request;

use std::{future::Future, pin::Pin, sync::Arc};

use admatch_config::{Config, EmbeddingProviderConfig};
use admatch_domain::{Creative, DeliverySnapshot};
use admatch_providers::embedding;
use admatch_storage::{CoarseFilter, CollectionStatus, QdrantStore, VectorHit};

pub use admin::{CapabilitiesReport, HealthReport, UpsertReport};
pub use audit::{AuditStore, AuditTrace, CandidateDecision};
pub use cache::ResultCache;
pub use error::{Error, Result};
pub use matching::{
	BatchMatchResponse, BatchSlot, CreativeCandidate, DryRunResponse, MatchResponse,
};
pub use request::{MatchRequest, NormalizedRequest};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

/// The retrieval and ingestion seam. The default implementation is the Qdrant store; tests
/// plug in an in-memory index.
pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		filter: &'a CoarseFilter,
		limit: u64,
	) -> BoxFuture<'a, admatch_storage::Result<Vec<VectorHit>>>;

	fn upsert_creatives<'a>(
		&'a self,
		items: Vec<(Creative, Vec<f32>)>,
	) -> BoxFuture<'a, admatch_storage::Result<usize>>;

	fn delete_creative<'a>(
		&'a self,
		creative_id: &'a str,
	) -> BoxFuture<'a, admatch_storage::Result<()>>;

	fn disable_creatives<'a>(
		&'a self,
		creative_ids: &'a [String],
	) -> BoxFuture<'a, admatch_storage::Result<usize>>;

	fn get_creative<'a>(
		&'a self,
		creative_id: &'a str,
	) -> BoxFuture<'a, admatch_storage::Result<Creative>>;

	fn ensure_collection<'a>(&'a self) -> BoxFuture<'a, admatch_storage::Result<()>>;

	fn collection_info<'a>(&'a self) -> BoxFuture<'a, admatch_storage::Result<CollectionStatus>>;
}

/// Read-only delivery figures from the analytics side. Returning `None` means no data is
/// available for the campaign yet, which pacing treats as full weight.
pub trait DeliveryStats
where
	Self: Send + Sync,
{
	fn snapshot<'a>(&'a self, campaign_id: &'a str) -> BoxFuture<'a, Option<DeliverySnapshot>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub delivery: Arc<dyn DeliveryStats>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>, delivery: Arc<dyn DeliveryStats>) -> Self {
		Self { embedding, delivery }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), delivery: provider }
	}
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl DeliveryStats for DefaultProviders {
	fn snapshot<'a>(&'a self, _campaign_id: &'a str) -> BoxFuture<'a, Option<DeliverySnapshot>> {
		Box::pin(async { None })
	}
}

impl VectorIndex for QdrantStore {
	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		filter: &'a CoarseFilter,
		limit: u64,
	) -> BoxFuture<'a, admatch_storage::Result<Vec<VectorHit>>> {
		Box::pin(QdrantStore::search(self, vector, filter, limit))
	}

	fn upsert_creatives<'a>(
		&'a self,
		items: Vec<(Creative, Vec<f32>)>,
	) -> BoxFuture<'a, admatch_storage::Result<usize>> {
		Box::pin(async move { QdrantStore::upsert_creatives(self, &items).await })
	}

	fn delete_creative<'a>(
		&'a self,
		creative_id: &'a str,
	) -> BoxFuture<'a, admatch_storage::Result<()>> {
		Box::pin(QdrantStore::delete_creative(self, creative_id))
	}

	fn disable_creatives<'a>(
		&'a self,
		creative_ids: &'a [String],
	) -> BoxFuture<'a, admatch_storage::Result<usize>> {
		Box::pin(QdrantStore::disable_creatives(self, creative_ids))
	}

	fn get_creative<'a>(
		&'a self,
		creative_id: &'a str,
	) -> BoxFuture<'a, admatch_storage::Result<Creative>> {
		Box::pin(QdrantStore::get_creative(self, creative_id))
	}

	fn ensure_collection<'a>(&'a self) -> BoxFuture<'a, admatch_storage::Result<()>> {
		Box::pin(QdrantStore::ensure_collection(self))
	}

	fn collection_info<'a>(&'a self) -> BoxFuture<'a, admatch_storage::Result<CollectionStatus>> {
		Box::pin(QdrantStore::collection_info(self))
	}
}

pub struct MatchService {
	pub cfg: Config,
	pub index: Arc<dyn VectorIndex>,
	pub providers: Providers,
	pub(crate) cache: ResultCache,
	pub(crate) audit: AuditStore,
}
impl MatchService {
	pub fn new(cfg: Config, index: Arc<dyn VectorIndex>) -> Self {
		Self::with_providers(cfg, index, Providers::default())
	}

	pub fn with_providers(cfg: Config, index: Arc<dyn VectorIndex>, providers: Providers) -> Self {
		let cache = ResultCache::new(&cfg.cache);
		let audit = AuditStore::new(&cfg.audit);

		Self { cfg, index, providers, cache, audit }
	}
}
