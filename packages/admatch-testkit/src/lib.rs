//! In-memory stand-ins for the match service's collaborators, plus campaign fixtures.
//! Everything here is deterministic so service tests never need a network.

mod fixtures;
mod stubs;

pub use fixtures::{campaign, creative, test_config};
pub use stubs::{FixedDelivery, StubEmbedder, StubIndex};

use std::sync::Arc;

use admatch_service::{MatchService, Providers};

/// A service wired entirely to stubs. The index and delivery handles are returned so tests
/// can seed and mutate them after construction.
pub fn stub_service(vector_dim: u32) -> (MatchService, Arc<StubIndex>, Arc<FixedDelivery>) {
	let cfg = test_config(vector_dim);
	let index = Arc::new(StubIndex::new(&cfg.storage.qdrant));
	let delivery = Arc::new(FixedDelivery::default());
	let providers =
		Providers::new(Arc::new(StubEmbedder::default()), delivery.clone());
	let service = MatchService::with_providers(cfg, index.clone(), providers);

	(service, index, delivery)
}
