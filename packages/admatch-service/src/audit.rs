use std::{
	collections::{BTreeMap, HashMap, VecDeque},
	sync::{Mutex, MutexGuard},
};

use serde::Serialize;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use admatch_domain::MatchConstraints;

pub const CONTEXT_PREVIEW_CHARS: usize = 500;

/// A full replay record for one match run: every considered candidate with the stage where it
/// was accepted or rejected, plus the final ranking. Stored verbatim so `explain` can return
/// exactly what the pipeline decided at the time, not a re-computation.
#[derive(Clone, Debug, Serialize)]
pub struct AuditTrace {
	pub request_id: Uuid,
	pub created_at: String,
	pub context_preview: String,
	pub top_k: u32,
	pub placement: Option<String>,
	pub constraints: MatchConstraints,
	pub decisions: Vec<CandidateDecision>,
	pub constraint_impact: BTreeMap<String, u32>,
	pub ranked_creative_ids: Vec<String>,
	pub match_ids: Vec<Uuid>,
	pub warnings: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CandidateDecision {
	pub creative_id: String,
	pub campaign_id: String,
	pub stage: String,
	pub accepted: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
	pub similarity: f32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub pacing_weight: Option<f32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub boost_factor: Option<f32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub final_score: Option<f32>,
}

/// In-memory trace store with a hard capacity and a retention window. Insertion evicts the
/// oldest trace once full; lookup by match id fails once the trace has aged out.
pub struct AuditStore {
	inner: Mutex<AuditInner>,
	capacity: usize,
	retention: Duration,
}

#[derive(Default)]
struct AuditInner {
	traces: HashMap<Uuid, AuditTrace>,
	order: VecDeque<Uuid>,
	by_match: HashMap<Uuid, Uuid>,
}

impl AuditStore {
	pub fn new(cfg: &admatch_config::Audit) -> Self {
		Self {
			inner: Mutex::new(AuditInner::default()),
			capacity: (cfg.capacity as usize).max(1),
			retention: Duration::seconds(cfg.retention_seconds),
		}
	}

	pub fn insert(&self, trace: AuditTrace) {
		let mut inner = self.lock();

		while inner.order.len() >= self.capacity {
			let Some(oldest) = inner.order.pop_front() else { break };

			if let Some(evicted) = inner.traces.remove(&oldest) {
				for match_id in &evicted.match_ids {
					inner.by_match.remove(match_id);
				}
			}
		}

		for match_id in &trace.match_ids {
			inner.by_match.insert(*match_id, trace.request_id);
		}

		inner.order.push_back(trace.request_id);
		inner.traces.insert(trace.request_id, trace);
	}

	/// The trace that produced the given match id, if it is still retained.
	pub fn explain(&self, match_id: &Uuid, now: OffsetDateTime) -> Option<AuditTrace> {
		let inner = self.lock();
		let request_id = inner.by_match.get(match_id)?;
		let trace = inner.traces.get(request_id)?;
		let created_at =
			OffsetDateTime::parse(&trace.created_at, &time::format_description::well_known::Rfc3339)
				.ok()?;

		if now - created_at > self.retention {
			return None;
		}

		Some(trace.clone())
	}

	pub fn len(&self) -> usize {
		self.lock().traces.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn lock(&self) -> MutexGuard<'_, AuditInner> {
		match self.inner.lock() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		}
	}
}

/// At most [`CONTEXT_PREVIEW_CHARS`] characters of the request context. Traces keep a preview
/// rather than the full text to bound memory.
pub fn context_preview(context_text: &str) -> String {
	context_text.chars().take(CONTEXT_PREVIEW_CHARS).collect()
}
