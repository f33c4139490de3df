use crate::{constraints::MatchConstraints, sponsorship::Creative};

/// Why a creative failed the targeting stage. `reason()` values are stable strings recorded
/// in audit traces and surfaced through `explain`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TargetingReject {
	Excluded,
	Topics,
	Locale,
	Verticals,
	BlockedKeywords,
}
impl TargetingReject {
	pub fn reason(&self) -> &'static str {
		match self {
			Self::Excluded => "targeting.excluded",
			Self::Topics => "targeting.topics",
			Self::Locale => "targeting.locale",
			Self::Verticals => "targeting.verticals",
			Self::BlockedKeywords => "targeting.blocked_keywords",
		}
	}
}

/// Evaluates a retrieved creative against the request constraints and context text. Returns
/// the first failing check; a creative with empty targeting matches anything.
///
/// The id exclusions are also pushed into the coarse retrieval filter; they are re-checked
/// here because the coarse filter is advisory.
pub fn evaluate(
	creative: &Creative,
	constraints: &MatchConstraints,
	context_text: &str,
) -> Option<TargetingReject> {
	if is_excluded(creative, constraints) {
		return Some(TargetingReject::Excluded);
	}
	if !topics_match(creative, constraints) {
		return Some(TargetingReject::Topics);
	}
	if !locale_matches(creative, constraints) {
		return Some(TargetingReject::Locale);
	}
	if !interests_match(creative, constraints) {
		return Some(TargetingReject::Verticals);
	}
	if hits_blocked_keyword(creative, context_text) {
		return Some(TargetingReject::BlockedKeywords);
	}

	None
}

fn is_excluded(creative: &Creative, constraints: &MatchConstraints) -> bool {
	constraints.exclude_advertiser_ids.iter().any(|id| id == &creative.advertiser_id)
		|| constraints.exclude_campaign_ids.iter().any(|id| id == &creative.campaign_id)
		|| constraints.exclude_creative_ids.iter().any(|id| id == &creative.creative_id)
}

fn topics_match(creative: &Creative, constraints: &MatchConstraints) -> bool {
	if constraints.topics.is_empty() || creative.targeting.topics.is_empty() {
		return true;
	}

	intersects(&constraints.topics, &creative.targeting.topics)
}

fn locale_matches(creative: &Creative, constraints: &MatchConstraints) -> bool {
	let Some(locale) = constraints.locale.as_deref() else { return true };

	// A campaign with no locales is locale-agnostic.
	creative.targeting.locales.is_empty()
		|| creative
			.targeting
			.locales
			.iter()
			.any(|candidate| candidate.trim().eq_ignore_ascii_case(locale.trim()))
}

fn interests_match(creative: &Creative, constraints: &MatchConstraints) -> bool {
	let requested: Vec<&String> =
		constraints.verticals.iter().chain(constraints.audience_segments.iter()).collect();

	if requested.is_empty() {
		return true;
	}

	let offered: Vec<&String> = creative
		.targeting
		.verticals
		.iter()
		.chain(creative.targeting.audience_segments.iter())
		.collect();

	if offered.is_empty() {
		return true;
	}

	requested.iter().any(|request| {
		offered.iter().any(|offer| offer.trim().eq_ignore_ascii_case(request.trim()))
	})
}

fn hits_blocked_keyword(creative: &Creative, context_text: &str) -> bool {
	if creative.targeting.blocked_keywords.is_empty() {
		return false;
	}

	let lowered = context_text.to_lowercase();
	let tokens: Vec<&str> = lowered.split_whitespace().collect();

	creative.targeting.blocked_keywords.iter().any(|keyword| {
		let keyword = keyword.trim().to_lowercase();

		if keyword.is_empty() {
			return false;
		}

		tokens.iter().any(|token| *token == keyword || token.contains(&keyword))
	})
}

fn intersects(request: &[String], creative: &[String]) -> bool {
	request.iter().any(|requested| {
		creative.iter().any(|offered| offered.trim().eq_ignore_ascii_case(requested.trim()))
	})
}
