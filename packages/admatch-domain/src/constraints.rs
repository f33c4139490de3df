use serde::{Deserialize, Serialize};

/// Typed per-request constraints. Every field is optional; an empty constraint set matches
/// everything the coarse retrieval returns.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MatchConstraints {
	pub topics: Vec<String>,
	pub locale: Option<String>,
	pub verticals: Vec<String>,
	pub audience_segments: Vec<String>,
	pub exclude_advertiser_ids: Vec<String>,
	pub exclude_campaign_ids: Vec<String>,
	pub exclude_creative_ids: Vec<String>,
	pub age_restricted_ok: bool,
	pub sensitive_ok: bool,
}
