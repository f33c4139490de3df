//! End-to-end pipeline tests over the in-memory stubs: ranking, caching, audit replay,
//! sampling, batching, and failure isolation.

use std::sync::Arc;

use time::macros::datetime;
use uuid::Uuid;

use admatch_domain::{Budget, DeliverySnapshot, Schedule};
use admatch_service::{Error, MatchRequest, MatchService, Providers};
use admatch_testkit::{StubEmbedder, creative, stub_service, test_config};

const CONTEXT: &str = "Looking for continuous integration tooling for a Rust monorepo.";

fn request(context: &str) -> MatchRequest {
	MatchRequest { context_text: context.to_string(), ..Default::default() }
}

#[tokio::test]
async fn ranking_follows_score_then_similarity_then_id() {
	let (service, index, _) = stub_service(8);

	index.insert_scored(creative("cr-low", "camp-1"), 0.3);
	index.insert_scored(creative("cr-high", "camp-2"), 0.9);
	index.insert_scored(creative("cr-mid", "camp-3"), 0.6);

	let response = service.match_creatives(&request(CONTEXT)).await.expect("match");
	let ids: Vec<&str> =
		response.candidates.iter().map(|c| c.creative_id.as_str()).collect();

	assert_eq!(ids, vec!["cr-high", "cr-mid", "cr-low"]);
	assert_eq!(response.total_considered, 3);
	assert!(!response.cached);
}

#[tokio::test]
async fn disjoint_topics_never_rank() {
	let (service, index, _) = stub_service(8);
	let mut cooking = creative("cr-cooking", "camp-1");

	cooking.targeting.topics = vec!["cooking".to_string()];

	index.insert_scored(cooking, 0.9);
	index.insert_scored(creative("cr-open", "camp-2"), 0.5);

	let mut req = request(CONTEXT);

	req.constraints.topics = vec!["rust".to_string()];

	let response = service.match_creatives(&req).await.expect("match");

	assert!(response.candidates.iter().all(|c| c.creative_id != "cr-cooking"));
	assert_eq!(response.constraint_impact.get("targeting.topics"), Some(&1));
}

#[tokio::test]
async fn final_score_is_the_product_of_its_factors() {
	let (service, index, _) = stub_service(8);

	index.insert_scored(creative("cr-1", "camp-1"), 0.8);

	let mut req = request("A long enough context that mentions ship velocity for teams.");

	req.boost_keywords.insert("faster".to_string(), 1.5);

	let response = service.match_creatives(&req).await.expect("match");
	let candidate = &response.candidates[0];

	assert_eq!(candidate.boost_factor, 1.5);
	assert_eq!(candidate.boost_keyword.as_deref(), Some("faster"));
	assert!((candidate.final_score - 1.2).abs() < 1e-6);
	assert!(candidate.final_score <= candidate.similarity * 2.0);
}

#[tokio::test]
async fn responses_echo_the_normalized_placement() {
	let (service, index, _) = stub_service(8);

	index.insert_scored(creative("cr-1", "camp-1"), 0.7);

	let mut req = request(CONTEXT);

	req.placement = Some("Inline".to_string());

	let response = service.match_creatives(&req).await.expect("match");

	assert_eq!(response.placement.as_deref(), Some("inline"));

	let response = service.match_creatives(&request(CONTEXT)).await.expect("match");

	assert_eq!(response.placement, None);
}

#[tokio::test]
async fn identical_requests_rank_identically() {
	let (service, index, _) = stub_service(8);

	for i in 0..6 {
		index.insert_scored(creative(&format!("cr-{i}"), "camp-1"), 0.1 * i as f32);
	}

	let first = service.match_dry_run(&request(CONTEXT)).await.expect("dry run");
	let second = service.match_dry_run(&request(CONTEXT)).await.expect("dry run");
	let ids = |r: &admatch_service::MatchResponse| {
		r.candidates.iter().map(|c| c.creative_id.clone()).collect::<Vec<_>>()
	};

	assert_eq!(ids(&first.response), ids(&second.response));
	// Match identifiers are fresh per response even when the ranking repeats.
	assert_ne!(first.response.candidates[0].match_id, second.response.candidates[0].match_id);
}

#[tokio::test]
async fn second_identical_match_is_served_from_cache() {
	let (service, index, _) = stub_service(8);

	index.insert_scored(creative("cr-1", "camp-1"), 0.7);

	let first = service.match_creatives(&request(CONTEXT)).await.expect("match");

	// Changing backing data does not invalidate a live cache entry.
	index.insert_scored(creative("cr-2", "camp-2"), 0.9);

	let second = service.match_creatives(&request(CONTEXT)).await.expect("match");

	assert!(!first.cached);
	assert!(second.cached);
	assert_eq!(
		first.candidates.iter().map(|c| c.creative_id.as_str()).collect::<Vec<_>>(),
		second.candidates.iter().map(|c| c.creative_id.as_str()).collect::<Vec<_>>()
	);
}

#[tokio::test]
async fn explain_replays_the_exact_ranked_order() {
	let (service, index, _) = stub_service(8);

	index.insert_scored(creative("cr-a", "camp-1"), 0.9);
	index.insert_scored(creative("cr-b", "camp-2"), 0.4);

	let response = service.match_creatives(&request(CONTEXT)).await.expect("match");
	let expected: Vec<String> =
		response.candidates.iter().map(|c| c.creative_id.clone()).collect();

	for candidate in &response.candidates {
		let trace = service.explain(&candidate.match_id).expect("trace");

		assert_eq!(trace.request_id, response.request_id);
		assert_eq!(trace.ranked_creative_ids, expected);
	}
}

#[tokio::test]
async fn explain_on_an_unknown_match_id_is_not_found() {
	let (service, _, _) = stub_service(8);
	let err = service.explain(&Uuid::new_v4()).expect_err("expected error");

	assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn top_k_boundaries_hold() {
	let (service, index, _) = stub_service(8);

	index.insert_scored(creative("cr-a", "camp-1"), 0.9);
	index.insert_scored(creative("cr-b", "camp-2"), 0.4);

	let mut req = request(CONTEXT);

	req.top_k = Some(1);

	assert_eq!(service.match_creatives(&req).await.expect("match").candidates.len(), 1);

	req.top_k = Some(101);

	assert!(matches!(
		service.match_creatives(&req).await,
		Err(Error::InvalidRequest { .. })
	));
	assert!(matches!(
		service.match_creatives(&request("")).await,
		Err(Error::InvalidRequest { .. })
	));
}

#[tokio::test]
async fn sensitive_creatives_need_an_explicit_opt_in() {
	let (service, index, _) = stub_service(8);
	let mut flagged = creative("cr-sensitive", "camp-1");

	flagged.policy.sensitive = true;

	index.insert_scored(flagged, 0.9);

	let response = service.match_creatives(&request(CONTEXT)).await.expect("match");

	assert!(response.candidates.is_empty());
	assert_eq!(response.constraint_impact.get("policy.sensitive"), Some(&1));

	let mut req = request(CONTEXT);

	req.constraints.sensitive_ok = true;

	let response = service.match_creatives(&req).await.expect("match");

	assert_eq!(response.candidates.len(), 1);
}

#[tokio::test]
async fn expired_schedules_reject_with_the_schedule_reason() {
	let (service, index, _) = stub_service(8);
	let mut expired = creative("cr-expired", "camp-old");

	expired.schedule =
		Schedule { start_at: None, end_at: Some(datetime!(2020-01-01 00:00 UTC)) };

	index.insert_scored(expired, 0.9);
	index.insert_scored(creative("cr-live", "camp-new"), 0.5);

	let dry = service.match_dry_run(&request(CONTEXT)).await.expect("dry run");
	let ids: Vec<&str> =
		dry.response.candidates.iter().map(|c| c.creative_id.as_str()).collect();

	assert_eq!(ids, vec!["cr-live"]);

	let decision = dry
		.trace
		.decisions
		.iter()
		.find(|d| d.creative_id == "cr-expired")
		.expect("decision");

	assert!(!decision.accepted);
	assert_eq!(decision.reason.as_deref(), Some("schedule.inactive"));
}

#[tokio::test]
async fn exhausted_budgets_stay_visible_at_score_zero() {
	let (service, index, delivery) = stub_service(8);
	let mut paced = creative("cr-paced", "camp-paced");

	paced.budget = Budget { daily_budget: Some(100.0), ..Default::default() };

	index.insert_scored(paced, 0.9);
	delivery.set(
		"camp-paced",
		DeliverySnapshot { spent_today: 100.0, spent_total: 100.0, observed_ctr: None },
	);

	let response = service.match_creatives(&request(CONTEXT)).await.expect("match");
	let candidate = &response.candidates[0];

	assert_eq!(candidate.creative_id, "cr-paced");
	assert_eq!(candidate.final_score, 0.0);
	assert_eq!(candidate.pacing_reason, "budget_exhausted");
	assert!(
		response
			.warnings
			.iter()
			.any(|w| w == admatch_service::matching::WARN_ALL_PACING_LIMITED)
	);
}

#[tokio::test]
async fn zero_candidates_is_a_success_with_warnings() {
	let (service, _, _) = stub_service(8);
	let response = service.match_creatives(&request("tiny")).await.expect("match");

	assert!(response.candidates.is_empty());
	assert!(response.warnings.iter().any(|w| w == admatch_service::matching::WARN_NO_ELIGIBLE));
	assert!(
		response.warnings.iter().any(|w| w == admatch_service::matching::WARN_SHORT_CONTEXT)
	);
}

#[tokio::test]
async fn an_unreachable_index_is_retrieval_unavailable() {
	let (service, index, _) = stub_service(8);

	index.set_failing(true);

	assert!(matches!(
		service.match_creatives(&request(CONTEXT)).await,
		Err(Error::RetrievalUnavailable { .. })
	));
}

#[tokio::test]
async fn an_unreachable_embedder_is_retrieval_unavailable() {
	let cfg = test_config(8);
	let index = Arc::new(admatch_testkit::StubIndex::new(&cfg.storage.qdrant));
	let providers = Providers::new(
		Arc::new(StubEmbedder::failing()),
		Arc::new(admatch_testkit::FixedDelivery::default()),
	);
	let service = MatchService::with_providers(cfg, index, providers);

	assert!(matches!(
		service.match_creatives(&request(CONTEXT)).await,
		Err(Error::RetrievalUnavailable { .. })
	));
}

#[tokio::test]
async fn sampling_draws_from_the_eligible_set_without_ranking_bias() {
	let (service, index, _) = stub_service(8);

	for i in 0..10 {
		index.insert_scored(creative(&format!("cr-{i}"), "camp-1"), 0.1 * i as f32);
	}

	let mut req = request(CONTEXT);

	req.top_k = Some(4);

	let response = service.match_sample(&req).await.expect("sample");
	let mut ids: Vec<&str> =
		response.candidates.iter().map(|c| c.creative_id.as_str()).collect();

	assert_eq!(ids.len(), 4);

	ids.sort();
	ids.dedup();

	assert_eq!(ids.len(), 4);
	assert!(ids.iter().all(|id| id.starts_with("cr-")));

	// Sampled matches are explainable like ranked ones.
	assert!(service.explain(&response.candidates[0].match_id).is_ok());
}

#[tokio::test]
async fn dry_runs_leave_no_trace_behind() {
	let (service, index, _) = stub_service(8);

	index.insert_scored(creative("cr-1", "camp-1"), 0.7);

	let dry = service.match_dry_run(&request(CONTEXT)).await.expect("dry run");

	assert_eq!(dry.trace.ranked_creative_ids, vec!["cr-1".to_string()]);
	assert!(matches!(
		service.explain(&dry.response.candidates[0].match_id),
		Err(Error::NotFound { .. })
	));

	// Nothing was cached either.
	let live = service.match_creatives(&request(CONTEXT)).await.expect("match");

	assert!(!live.cached);
}

#[tokio::test]
async fn batch_slots_fail_independently() {
	let (service, index, _) = stub_service(8);

	index.insert_scored(creative("cr-1", "camp-1"), 0.7);

	let requests = vec![request(CONTEXT), request("   "), request(CONTEXT)];
	let batch = service.match_batch(&requests).await.expect("batch");

	assert_eq!(batch.slots.len(), 3);
	assert!(batch.slots[0].response.is_some());
	assert!(batch.slots[1].response.is_none());
	assert!(batch.slots[1].error.as_deref().is_some_and(|e| e.contains("Invalid request")));
	assert!(batch.slots[2].response.is_some());
}

#[tokio::test]
async fn oversized_batches_are_rejected_up_front() {
	let (service, _, _) = stub_service(8);
	let requests: Vec<MatchRequest> = (0..501).map(|_| request(CONTEXT)).collect();

	assert!(matches!(
		service.match_batch(&requests).await,
		Err(Error::InvalidRequest { .. })
	));
}

#[tokio::test]
async fn upsert_then_match_round_trips_through_the_index() {
	let (service, index, _) = stub_service(8);
	let campaigns =
		vec![admatch_testkit::campaign("camp-1", "cr-1"), admatch_testkit::campaign("camp-2", "cr-2")];
	let report = service.upsert_campaigns(&campaigns).await.expect("upsert");

	assert_eq!(report.campaigns, 2);
	assert_eq!(report.creatives, 2);
	assert_eq!(index.len(), 2);

	let response = service.match_creatives(&request(CONTEXT)).await.expect("match");

	assert_eq!(response.candidates.len(), 2);
	assert!(response.candidates.iter().all(|c| c.cta_text == "Start free."));

	service.disable_creatives(&["cr-1".to_string()]).await.expect("disable");

	let dry = service.match_dry_run(&request(CONTEXT)).await.expect("dry run");

	assert_eq!(dry.response.candidates.len(), 1);
	assert_eq!(dry.response.constraint_impact.get("creative.disabled"), Some(&1));
}

#[tokio::test]
async fn health_reports_degraded_when_the_embedder_is_down() {
	let cfg = test_config(8);
	let index = Arc::new(admatch_testkit::StubIndex::new(&cfg.storage.qdrant));
	let providers = Providers::new(
		Arc::new(StubEmbedder::failing()),
		Arc::new(admatch_testkit::FixedDelivery::default()),
	);
	let service = MatchService::with_providers(cfg, index, providers);
	let health = service.health().await;

	assert_eq!(health.status, "degraded");
	assert_eq!(health.index, "up");
	assert_eq!(health.embedding, "down");
}

#[tokio::test]
async fn capabilities_reflect_the_configuration() {
	let (service, _, _) = stub_service(8);
	let caps = service.capabilities();

	assert_eq!(caps.schema_version, 1);
	assert_eq!(caps.embedding_model_id, "stub-embed-1");
	assert!(caps.placements.contains(&"sidebar".to_string()));
	assert!(caps.constraint_keys.contains(&"exclude_campaign_ids".to_string()));
}
