use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use admatch_config::Matching;
use admatch_domain::MatchConstraints;

use crate::{Error, Result};

pub const MAX_CONTEXT_CHARS: usize = 10_000;
pub const BOOST_MIN: f32 = 0.1;
pub const BOOST_MAX: f32 = 2.0;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct MatchRequest {
	pub context_text: String,
	#[serde(default)]
	pub top_k: Option<u32>,
	#[serde(default)]
	pub placement: Option<String>,
	#[serde(default)]
	pub surface: Option<String>,
	#[serde(default)]
	pub constraints: MatchConstraints,
	#[serde(default)]
	pub boost_keywords: HashMap<String, f32>,
}

/// A request after validation: defaults applied, term lists lowercased/sorted/deduplicated,
/// boost multipliers clamped and key-sorted. This is the form the pipeline and the cache key
/// both work from.
#[derive(Clone, Debug, Serialize)]
pub struct NormalizedRequest {
	pub context_text: String,
	pub top_k: u32,
	pub placement: Option<String>,
	pub surface: Option<String>,
	pub constraints: MatchConstraints,
	pub boosts: Vec<(String, f32)>,
}

/// All violations surface as `InvalidRequest` before any retrieval happens.
pub fn validate(req: &MatchRequest, limits: &Matching) -> Result<NormalizedRequest> {
	let context_chars = req.context_text.chars().count();

	if req.context_text.trim().is_empty() {
		return Err(invalid("context_text must be non-blank."));
	}
	if context_chars > MAX_CONTEXT_CHARS {
		return Err(invalid(format!(
			"context_text must be at most {MAX_CONTEXT_CHARS} characters."
		)));
	}

	let top_k = req.top_k.unwrap_or(limits.default_top_k);

	if top_k == 0 || top_k > limits.max_top_k {
		return Err(invalid(format!("top_k must be in the range 1-{}.", limits.max_top_k)));
	}

	let placement = match req.placement.as_deref() {
		None => None,
		Some(raw) => {
			let placement = raw.trim().to_ascii_lowercase();

			if placement.is_empty() {
				return Err(invalid("placement must be non-empty when present."));
			}
			if !limits.placements.contains(&placement) {
				return Err(invalid(format!(
					"placement must be one of {}.",
					limits.placements.join(", ")
				)));
			}

			Some(placement)
		},
	};
	let surface = match req.surface.as_deref() {
		None => None,
		Some(raw) => {
			let surface = raw.trim().to_string();

			if surface.is_empty() {
				return Err(invalid("surface must be non-empty when present."));
			}

			Some(surface)
		},
	};
	let constraints = normalize_constraints(&req.constraints)?;
	let boosts = normalize_boosts(&req.boost_keywords)?;

	Ok(NormalizedRequest {
		context_text: req.context_text.clone(),
		top_k,
		placement,
		surface,
		constraints,
		boosts,
	})
}

fn normalize_constraints(constraints: &MatchConstraints) -> Result<MatchConstraints> {
	let locale = match constraints.locale.as_deref() {
		None => None,
		Some(raw) => {
			let locale = raw.trim().to_ascii_lowercase();

			if locale.is_empty() {
				return Err(invalid("constraints.locale must be non-empty when present."));
			}

			Some(locale)
		},
	};

	Ok(MatchConstraints {
		topics: normalize_terms(&constraints.topics, "topics")?,
		locale,
		verticals: normalize_terms(&constraints.verticals, "verticals")?,
		audience_segments: normalize_terms(&constraints.audience_segments, "audience_segments")?,
		exclude_advertiser_ids: normalize_ids(
			&constraints.exclude_advertiser_ids,
			"exclude_advertiser_ids",
		)?,
		exclude_campaign_ids: normalize_ids(
			&constraints.exclude_campaign_ids,
			"exclude_campaign_ids",
		)?,
		exclude_creative_ids: normalize_ids(
			&constraints.exclude_creative_ids,
			"exclude_creative_ids",
		)?,
		age_restricted_ok: constraints.age_restricted_ok,
		sensitive_ok: constraints.sensitive_ok,
	})
}

fn normalize_terms(values: &[String], label: &str) -> Result<Vec<String>> {
	let mut out = Vec::with_capacity(values.len());

	for value in values {
		let term = value.trim().to_lowercase();

		if term.is_empty() {
			return Err(invalid(format!("constraints.{label} entries must be non-empty.")));
		}

		out.push(term);
	}

	out.sort();
	out.dedup();

	Ok(out)
}

fn normalize_ids(values: &[String], label: &str) -> Result<Vec<String>> {
	let mut out = Vec::with_capacity(values.len());

	for value in values {
		let id = value.trim().to_string();

		if id.is_empty() {
			return Err(invalid(format!("constraints.{label} entries must be non-empty.")));
		}

		out.push(id);
	}

	out.sort();
	out.dedup();

	Ok(out)
}

fn normalize_boosts(boosts: &HashMap<String, f32>) -> Result<Vec<(String, f32)>> {
	let mut sorted = BTreeMap::new();

	for (keyword, multiplier) in boosts {
		let keyword = keyword.trim().to_lowercase();

		if keyword.is_empty() {
			return Err(invalid("boost_keywords keys must be non-empty."));
		}
		if !multiplier.is_finite() {
			return Err(invalid("boost_keywords multipliers must be finite numbers."));
		}

		let multiplier = multiplier.clamp(BOOST_MIN, BOOST_MAX);

		// Case-folding can collide distinct keys; keep the stronger boost.
		sorted
			.entry(keyword)
			.and_modify(|existing: &mut f32| *existing = existing.max(multiplier))
			.or_insert(multiplier);
	}

	Ok(sorted.into_iter().collect())
}

fn invalid(message: impl Into<String>) -> Error {
	Error::InvalidRequest { message: message.into() }
}
