use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A campaign as supplied by advertisers at ingestion time. Creatives are kept in the order
/// they were submitted.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Campaign {
	pub campaign_id: String,
	pub advertiser_id: String,
	pub name: String,
	#[serde(default)]
	pub topics: Vec<String>,
	#[serde(default)]
	pub creatives: Vec<CreativeSpec>,
	#[serde(default)]
	pub targeting: Targeting,
	#[serde(default)]
	pub policy: Policy,
	#[serde(default)]
	pub schedule: Schedule,
	#[serde(default)]
	pub budget: Budget,
}
impl Campaign {
	/// Flattens the campaign into per-creative records carrying the campaign metadata the
	/// matcher and the vector payload need.
	pub fn expand(&self) -> Vec<Creative> {
		self.creatives
			.iter()
			.map(|spec| Creative {
				creative_id: spec.creative_id.clone(),
				campaign_id: self.campaign_id.clone(),
				advertiser_id: self.advertiser_id.clone(),
				campaign_name: self.name.clone(),
				title: spec.title.clone(),
				body: spec.body.clone(),
				cta_text: spec.cta_text.clone(),
				landing_url: spec.landing_url.clone(),
				enabled: spec.enabled,
				topics: self.topics.clone(),
				targeting: self.targeting.clone(),
				policy: self.policy.clone(),
				schedule: self.schedule.clone(),
				budget: self.budget.clone(),
			})
			.collect()
	}
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CreativeSpec {
	pub creative_id: String,
	pub title: String,
	pub body: String,
	#[serde(default)]
	pub cta_text: String,
	#[serde(default)]
	pub landing_url: Option<String>,
	#[serde(default = "default_enabled")]
	pub enabled: bool,
}

/// A creative flattened with its campaign metadata. This is the unit that gets embedded,
/// stored, retrieved, and ranked.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Creative {
	pub creative_id: String,
	pub campaign_id: String,
	pub advertiser_id: String,
	pub campaign_name: String,
	pub title: String,
	pub body: String,
	#[serde(default)]
	pub cta_text: String,
	#[serde(default)]
	pub landing_url: Option<String>,
	#[serde(default = "default_enabled")]
	pub enabled: bool,
	#[serde(default)]
	pub topics: Vec<String>,
	#[serde(default)]
	pub targeting: Targeting,
	#[serde(default)]
	pub policy: Policy,
	#[serde(default)]
	pub schedule: Schedule,
	#[serde(default)]
	pub budget: Budget,
}
impl Creative {
	/// Text sent to the embedding provider. Must stay byte-identical between ingestion and any
	/// later re-embed: title, body, then the campaign topics, joined by single spaces. The
	/// call-to-action text is display-only and never embedded.
	pub fn embedding_text(&self) -> String {
		let mut parts = Vec::with_capacity(2 + self.topics.len());

		parts.push(self.title.as_str());
		parts.push(self.body.as_str());
		parts.extend(self.topics.iter().map(String::as_str));

		parts.join(" ")
	}
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Targeting {
	pub topics: Vec<String>,
	pub locales: Vec<String>,
	pub verticals: Vec<String>,
	pub audience_segments: Vec<String>,
	pub blocked_keywords: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Policy {
	pub sensitive: bool,
	pub age_restricted: bool,
	pub brand_safety_tier: BrandSafetyTier,
}
impl Default for Policy {
	fn default() -> Self {
		Self { sensitive: false, age_restricted: false, brand_safety_tier: BrandSafetyTier::Medium }
	}
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BrandSafetyTier {
	Low,
	Medium,
	High,
}
impl BrandSafetyTier {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Low => "low",
			Self::Medium => "medium",
			Self::High => "high",
		}
	}
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Schedule {
	#[serde(with = "time::serde::rfc3339::option")]
	pub start_at: Option<OffsetDateTime>,
	#[serde(with = "time::serde::rfc3339::option")]
	pub end_at: Option<OffsetDateTime>,
}
impl Schedule {
	/// A missing bound leaves that side of the window open.
	pub fn is_active(&self, now: OffsetDateTime) -> bool {
		if let Some(start) = self.start_at
			&& now < start
		{
			return false;
		}
		if let Some(end) = self.end_at
			&& now > end
		{
			return false;
		}

		true
	}
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Budget {
	pub daily_budget: Option<f64>,
	pub total_budget: Option<f64>,
	pub currency: String,
	pub pacing_mode: PacingMode,
	pub cpm: f64,
	pub target_ctr: Option<f64>,
}
impl Default for Budget {
	fn default() -> Self {
		Self {
			daily_budget: None,
			total_budget: None,
			currency: "USD".to_string(),
			pacing_mode: PacingMode::Even,
			cpm: 0.0,
			target_ctr: None,
		}
	}
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PacingMode {
	Even,
	Adaptive,
}

fn default_enabled() -> bool {
	true
}
