use admatch_domain::Creative;

/// One retrieved candidate: the decoded creative plus the raw cosine similarity reported by
/// the index.
#[derive(Clone, Debug)]
pub struct VectorHit {
	pub similarity: f32,
	pub creative: Creative,
}

/// The advisory filter pushed down to the vector index. Everything here is re-verified
/// locally by the match pipeline.
#[derive(Clone, Debug, Default)]
pub struct CoarseFilter {
	pub exclude_advertiser_ids: Vec<String>,
	pub exclude_campaign_ids: Vec<String>,
	pub exclude_creative_ids: Vec<String>,
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct CollectionStatus {
	pub collection: String,
	pub points_count: u64,
	pub vector_dim: u32,
	pub status: String,
}
