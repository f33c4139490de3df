use std::{cmp::Ordering, collections::BTreeMap};

use rand::seq::SliceRandom;
use serde::Serialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use admatch_domain::{Creative, PacingDecision, PacingLimits, pacing, policy, targeting};
use admatch_storage::CoarseFilter;

use crate::{
	Error, MatchService, Result,
	audit::{AuditTrace, CandidateDecision, context_preview},
	cache, request,
	request::{MatchRequest, NormalizedRequest},
};

pub const WARN_SHORT_CONTEXT: &str = "context_text is below the recommended length.";
pub const WARN_ALL_PACING_LIMITED: &str = "All eligible creatives are pacing-limited.";
pub const WARN_NO_ELIGIBLE: &str = "No eligible creatives matched the request.";

/// One ranked candidate in a response. `final_score` is the raw product
/// `similarity × pacing_weight × boost_factor`; it can exceed 1.0 when a boost applies.
#[derive(Clone, Debug, Serialize)]
pub struct CreativeCandidate {
	pub match_id: Uuid,
	pub creative_id: String,
	pub campaign_id: String,
	pub advertiser_id: String,
	pub campaign_name: String,
	pub title: String,
	pub body: String,
	pub cta_text: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub landing_url: Option<String>,
	pub topics: Vec<String>,
	pub brand_safety_tier: String,
	pub similarity: f32,
	pub pacing_weight: f32,
	pub pacing_reason: String,
	pub boost_factor: f32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub boost_keyword: Option<String>,
	pub final_score: f32,
}

#[derive(Clone, Debug, Serialize)]
pub struct MatchResponse {
	pub request_id: Uuid,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub placement: Option<String>,
	pub candidates: Vec<CreativeCandidate>,
	pub warnings: Vec<String>,
	pub total_considered: u32,
	pub constraint_impact: BTreeMap<String, u32>,
	pub cached: bool,
}

/// Dry-run output: the would-be response plus the preview trace that was never persisted.
#[derive(Clone, Debug, Serialize)]
pub struct DryRunResponse {
	pub response: MatchResponse,
	pub trace: AuditTrace,
}

#[derive(Clone, Debug, Serialize)]
pub struct BatchSlot {
	pub index: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub response: Option<MatchResponse>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct BatchMatchResponse {
	pub slots: Vec<BatchSlot>,
}

struct ScoredCandidate {
	creative: Creative,
	similarity: f32,
	pacing: PacingDecision,
	boost_factor: f32,
	boost_keyword: Option<String>,
	final_score: f32,
}

struct PipelineOutcome {
	survivors: Vec<ScoredCandidate>,
	decisions: Vec<CandidateDecision>,
	constraint_impact: BTreeMap<String, u32>,
	warnings: Vec<String>,
	total_considered: u32,
}

impl MatchService {
	/// The primary operation: validate, retrieve, filter, rank, truncate, persist the trace,
	/// cache the response. A cache hit returns the stored response with `cached` set and skips
	/// embedding and retrieval entirely.
	pub async fn match_creatives(&self, req: &MatchRequest) -> Result<MatchResponse> {
		let normalized = request::validate(req, &self.cfg.matching)?;
		let now = OffsetDateTime::now_utc();
		let digest = if self.cfg.cache.enabled {
			let digest = cache::request_digest(&normalized, self.cfg.matching.schema_version)?;

			if let Some(mut hit) = self.cache.get(&digest, now) {
				tracing::debug!(request_digest = %digest, "Serving match response from cache.");

				hit.cached = true;

				return Ok(hit);
			}

			Some(digest)
		} else {
			None
		};
		let outcome = self.run_pipeline(&normalized, now).await?;
		let (response, trace) = build_ranked(&normalized, outcome, now);

		self.audit.insert(trace);

		if let Some(digest) = digest {
			self.cache.put(digest, response.clone(), now);
		}

		Ok(response)
	}

	/// Uniform-random draw of `top_k` from the eligible set, unbiased by score. The returned
	/// order is the draw order, explicitly not a ranking. The trace is persisted; the cache is
	/// never consulted or filled.
	pub async fn match_sample(&self, req: &MatchRequest) -> Result<MatchResponse> {
		let normalized = request::validate(req, &self.cfg.matching)?;
		let now = OffsetDateTime::now_utc();
		let outcome = self.run_pipeline(&normalized, now).await?;
		let PipelineOutcome { survivors, decisions, constraint_impact, warnings, total_considered } =
			outcome;
		let mut rng = rand::thread_rng();
		let sampled: Vec<&ScoredCandidate> =
			survivors.choose_multiple(&mut rng, normalized.top_k as usize).collect();
		let candidates: Vec<CreativeCandidate> =
			sampled.into_iter().map(to_candidate).collect();
		let response = MatchResponse {
			request_id: Uuid::new_v4(),
			placement: normalized.placement.clone(),
			candidates,
			warnings,
			total_considered,
			constraint_impact,
			cached: false,
		};

		self.audit.insert(trace_for(&normalized, &response, decisions, now));

		Ok(response)
	}

	/// Full pipeline with no side effects: nothing cached, nothing persisted. The preview
	/// trace comes back alongside the response instead.
	pub async fn match_dry_run(&self, req: &MatchRequest) -> Result<DryRunResponse> {
		let normalized = request::validate(req, &self.cfg.matching)?;
		let now = OffsetDateTime::now_utc();
		let outcome = self.run_pipeline(&normalized, now).await?;
		let (response, trace) = build_ranked(&normalized, outcome, now);

		Ok(DryRunResponse { response, trace })
	}

	/// Sequential per-slot execution. One slot's failure is recorded in that slot and never
	/// aborts its siblings.
	pub async fn match_batch(&self, requests: &[MatchRequest]) -> Result<BatchMatchResponse> {
		let max = self.cfg.matching.max_batch_size as usize;

		if requests.len() > max {
			return Err(Error::InvalidRequest {
				message: format!("Batch size must be at most {max}."),
			});
		}

		let mut slots = Vec::with_capacity(requests.len());

		for (index, req) in requests.iter().enumerate() {
			match self.match_creatives(req).await {
				Ok(response) => slots.push(BatchSlot { index, response: Some(response), error: None }),
				Err(err) => {
					tracing::warn!(slot = index, error = %err, "Batch slot failed.");

					slots.push(BatchSlot { index, response: None, error: Some(err.to_string()) });
				},
			}
		}

		Ok(BatchMatchResponse { slots })
	}

	/// The stored trace for a previously returned match id, verbatim.
	pub fn explain(&self, match_id: &Uuid) -> Result<AuditTrace> {
		self.audit.explain(match_id, OffsetDateTime::now_utc()).ok_or_else(|| Error::NotFound {
			message: format!("No audit trace found for match id {match_id}."),
		})
	}

	async fn run_pipeline(
		&self,
		normalized: &NormalizedRequest,
		now: OffsetDateTime,
	) -> Result<PipelineOutcome> {
		let vector = self.embed_context(&normalized.context_text).await?;
		let limits = &self.cfg.matching;
		let limit =
			u64::from(limits.max_top_k.min(normalized.top_k.saturating_mul(limits.overfetch_factor)));
		let filter = CoarseFilter {
			exclude_advertiser_ids: normalized.constraints.exclude_advertiser_ids.clone(),
			exclude_campaign_ids: normalized.constraints.exclude_campaign_ids.clone(),
			exclude_creative_ids: normalized.constraints.exclude_creative_ids.clone(),
		};
		let hits = self.index.search(&vector, &filter, limit).await.map_err(|err| {
			Error::RetrievalUnavailable { message: format!("Vector index search failed: {err}") }
		})?;
		let pacing_limits =
			PacingLimits { adaptive_min: limits.adaptive_min, adaptive_max: limits.adaptive_max };
		let total_considered = hits.len() as u32;
		let mut survivors = Vec::new();
		let mut decisions = Vec::new();
		let mut constraint_impact = BTreeMap::new();

		for hit in hits {
			let creative = hit.creative;
			let similarity = hit.similarity;

			// The coarse filter is advisory; the enabled flag is re-checked locally like
			// everything else.
			if !creative.enabled {
				decisions.push(reject(&creative, similarity, "retrieval", "creative.disabled"));
				bump(&mut constraint_impact, "creative.disabled");

				continue;
			}
			if let Some(fail) =
				targeting::evaluate(&creative, &normalized.constraints, &normalized.context_text)
			{
				decisions.push(reject(&creative, similarity, "targeting", fail.reason()));
				bump(&mut constraint_impact, fail.reason());

				continue;
			}
			if let Some(fail) = policy::evaluate(&creative.policy, &normalized.constraints) {
				decisions.push(reject(&creative, similarity, "policy", fail.reason()));
				bump(&mut constraint_impact, fail.reason());

				continue;
			}

			let delivery = self.providers.delivery.snapshot(&creative.campaign_id).await;
			let decision = pacing::evaluate(
				&creative.schedule,
				&creative.budget,
				delivery.as_ref(),
				&pacing_limits,
				now,
			);

			if !decision.active {
				decisions.push(reject(&creative, similarity, "pacing", decision.reason.reason()));
				bump(&mut constraint_impact, decision.reason.reason());

				continue;
			}

			let (boost_factor, boost_keyword) = boost_for(&creative, &normalized.boosts);
			let final_score = similarity * decision.weight * boost_factor;

			decisions.push(CandidateDecision {
				creative_id: creative.creative_id.clone(),
				campaign_id: creative.campaign_id.clone(),
				stage: "accepted".to_string(),
				accepted: true,
				reason: Some(decision.reason.reason().to_string()),
				similarity,
				pacing_weight: Some(decision.weight),
				boost_factor: Some(boost_factor),
				final_score: Some(final_score),
			});
			survivors.push(ScoredCandidate {
				creative,
				similarity,
				pacing: decision,
				boost_factor,
				boost_keyword,
				final_score,
			});
		}

		let mut warnings = Vec::new();

		if (normalized.context_text.chars().count() as u32) < limits.min_context_chars {
			warnings.push(WARN_SHORT_CONTEXT.to_string());
		}
		if survivors.is_empty() {
			warnings.push(WARN_NO_ELIGIBLE.to_string());
		} else if survivors.iter().all(|s| s.pacing.weight < limits.low_pacing_threshold) {
			warnings.push(WARN_ALL_PACING_LIMITED.to_string());
		}

		sort_candidates(&mut survivors);

		Ok(PipelineOutcome { survivors, decisions, constraint_impact, warnings, total_considered })
	}

	async fn embed_context(&self, context_text: &str) -> Result<Vec<f32>> {
		let texts = vec![context_text.to_string()];
		let mut vectors = self
			.providers
			.embedding
			.embed(&self.cfg.providers.embedding, &texts)
			.await
			.map_err(|err| Error::RetrievalUnavailable {
				message: format!("Embedding provider unavailable: {err}"),
			})?;

		if vectors.is_empty() {
			return Err(Error::RetrievalUnavailable {
				message: "Embedding provider returned no vector for the context text.".to_string(),
			});
		}

		Ok(vectors.swap_remove(0))
	}
}

/// Descending order with a total order over NaN: any NaN sorts below every number.
pub(crate) fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

fn sort_candidates(survivors: &mut [ScoredCandidate]) {
	survivors.sort_by(|x, y| {
		cmp_f32_desc(x.final_score, y.final_score)
			.then_with(|| cmp_f32_desc(x.similarity, y.similarity))
			.then_with(|| x.creative.creative_id.cmp(&y.creative.creative_id))
	});
}

/// First matching keyword over the validation-sorted boost list wins. The tie-break is
/// defined but arbitrary; sorting at validation time makes it stable across calls. Each
/// field is checked on its own, so a phrase never matches across the title/body boundary;
/// topics match by whole entry.
fn boost_for(creative: &Creative, boosts: &[(String, f32)]) -> (f32, Option<String>) {
	if boosts.is_empty() {
		return (1.0, None);
	}

	let title = creative.title.to_lowercase();
	let body = creative.body.to_lowercase();

	for (keyword, multiplier) in boosts {
		let hit = title.contains(keyword.as_str())
			|| body.contains(keyword.as_str())
			|| creative.topics.iter().any(|topic| topic.eq_ignore_ascii_case(keyword));

		if hit {
			return (*multiplier, Some(keyword.clone()));
		}
	}

	(1.0, None)
}

fn reject(creative: &Creative, similarity: f32, stage: &str, reason: &str) -> CandidateDecision {
	CandidateDecision {
		creative_id: creative.creative_id.clone(),
		campaign_id: creative.campaign_id.clone(),
		stage: stage.to_string(),
		accepted: false,
		reason: Some(reason.to_string()),
		similarity,
		pacing_weight: None,
		boost_factor: None,
		final_score: None,
	}
}

fn bump(impact: &mut BTreeMap<String, u32>, reason: &str) {
	*impact.entry(reason.to_string()).or_insert(0) += 1;
}

fn to_candidate(scored: &ScoredCandidate) -> CreativeCandidate {
	CreativeCandidate {
		match_id: Uuid::new_v4(),
		creative_id: scored.creative.creative_id.clone(),
		campaign_id: scored.creative.campaign_id.clone(),
		advertiser_id: scored.creative.advertiser_id.clone(),
		campaign_name: scored.creative.campaign_name.clone(),
		title: scored.creative.title.clone(),
		body: scored.creative.body.clone(),
		cta_text: scored.creative.cta_text.clone(),
		landing_url: scored.creative.landing_url.clone(),
		topics: scored.creative.topics.clone(),
		brand_safety_tier: scored.creative.policy.brand_safety_tier.as_str().to_string(),
		similarity: scored.similarity,
		pacing_weight: scored.pacing.weight,
		pacing_reason: scored.pacing.reason.reason().to_string(),
		boost_factor: scored.boost_factor,
		boost_keyword: scored.boost_keyword.clone(),
		final_score: scored.final_score,
	}
}

fn build_ranked(
	normalized: &NormalizedRequest,
	outcome: PipelineOutcome,
	now: OffsetDateTime,
) -> (MatchResponse, AuditTrace) {
	let PipelineOutcome { survivors, decisions, constraint_impact, warnings, total_considered } =
		outcome;
	let candidates: Vec<CreativeCandidate> =
		survivors.iter().take(normalized.top_k as usize).map(to_candidate).collect();
	let response = MatchResponse {
		request_id: Uuid::new_v4(),
		placement: normalized.placement.clone(),
		candidates,
		warnings,
		total_considered,
		constraint_impact,
		cached: false,
	};
	let trace = trace_for(normalized, &response, decisions, now);

	(response, trace)
}

fn trace_for(
	normalized: &NormalizedRequest,
	response: &MatchResponse,
	decisions: Vec<CandidateDecision>,
	now: OffsetDateTime,
) -> AuditTrace {
	AuditTrace {
		request_id: response.request_id,
		created_at: now.format(&Rfc3339).unwrap_or_else(|_| now.to_string()),
		context_preview: context_preview(&normalized.context_text),
		top_k: normalized.top_k,
		placement: normalized.placement.clone(),
		constraints: normalized.constraints.clone(),
		decisions,
		constraint_impact: response.constraint_impact.clone(),
		ranked_creative_ids: response.candidates.iter().map(|c| c.creative_id.clone()).collect(),
		match_ids: response.candidates.iter().map(|c| c.match_id).collect(),
		warnings: response.warnings.clone(),
	}
}
