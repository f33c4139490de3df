use serde_json::Map;

use admatch_config::{
	Audit, Cache, Config, EmbeddingProviderConfig, Matching, Providers, Qdrant, Security, Service,
	Storage,
};
use admatch_domain::{
	Budget, Campaign, Creative, CreativeSpec, Policy, Schedule, Targeting,
};

/// A ready-to-use configuration pointing at nothing real. Fields that tests commonly
/// override are all public on [`Config`].
pub fn test_config(vector_dim: u32) -> Config {
	Config {
		service: Service {
			mcp_bind: "127.0.0.1:0".to_string(),
			log_level: "warn".to_string(),
		},
		storage: Storage {
			qdrant: Qdrant {
				url: "http://127.0.0.1:6334".to_string(),
				collection: "admatch_test".to_string(),
				vector_dim,
				timeout_ms: 1_000,
			},
		},
		providers: Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "stub".to_string(),
				api_base: "http://127.0.0.1:0".to_string(),
				api_key: "test-key".to_string(),
				path: "/v1/embeddings".to_string(),
				model: "stub-embed-1".to_string(),
				dimensions: vector_dim,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
		},
		matching: Matching::default(),
		cache: Cache::default(),
		audit: Audit::default(),
		security: Security::default(),
	}
}

/// One campaign with a single enabled creative and open targeting.
pub fn campaign(campaign_id: &str, creative_id: &str) -> Campaign {
	Campaign {
		campaign_id: campaign_id.to_string(),
		advertiser_id: format!("adv-{campaign_id}"),
		name: format!("Campaign {campaign_id}"),
		topics: vec!["devtools".to_string()],
		creatives: vec![CreativeSpec {
			creative_id: creative_id.to_string(),
			title: "Ship faster".to_string(),
			body: "CI that stays out of your way.".to_string(),
			cta_text: "Start free.".to_string(),
			landing_url: None,
			enabled: true,
		}],
		targeting: Targeting::default(),
		policy: Policy::default(),
		schedule: Schedule::default(),
		budget: Budget::default(),
	}
}

/// A flattened creative with open targeting, no schedule bounds, and no budget.
pub fn creative(creative_id: &str, campaign_id: &str) -> Creative {
	Creative {
		creative_id: creative_id.to_string(),
		campaign_id: campaign_id.to_string(),
		advertiser_id: format!("adv-{campaign_id}"),
		campaign_name: format!("Campaign {campaign_id}"),
		title: "Ship faster".to_string(),
		body: "CI that stays out of your way.".to_string(),
		cta_text: "Start free.".to_string(),
		landing_url: None,
		enabled: true,
		topics: vec!["devtools".to_string()],
		targeting: Targeting::default(),
		policy: Policy::default(),
		schedule: Schedule::default(),
		budget: Budget::default(),
	}
}
