use crate::{constraints::MatchConstraints, sponsorship::Policy};

/// Why a creative failed the policy gate.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PolicyReject {
	Sensitive,
	AgeRestricted,
}
impl PolicyReject {
	pub fn reason(&self) -> &'static str {
		match self {
			Self::Sensitive => "policy.sensitive",
			Self::AgeRestricted => "policy.age_restricted",
		}
	}
}

/// Policy flags require an explicit per-request opt-in. The brand-safety tier is recorded in
/// traces but never rejects on its own.
pub fn evaluate(policy: &Policy, constraints: &MatchConstraints) -> Option<PolicyReject> {
	if policy.sensitive && !constraints.sensitive_ok {
		return Some(PolicyReject::Sensitive);
	}
	if policy.age_restricted && !constraints.age_restricted_ok {
		return Some(PolicyReject::AgeRestricted);
	}

	None
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sponsorship::BrandSafetyTier;

	#[test]
	fn sensitive_requires_opt_in() {
		let policy = Policy { sensitive: true, ..Default::default() };
		let mut constraints = MatchConstraints::default();

		assert_eq!(evaluate(&policy, &constraints), Some(PolicyReject::Sensitive));

		constraints.sensitive_ok = true;

		assert_eq!(evaluate(&policy, &constraints), None);
	}

	#[test]
	fn age_restricted_requires_opt_in() {
		let policy = Policy { age_restricted: true, ..Default::default() };
		let mut constraints = MatchConstraints::default();

		assert_eq!(evaluate(&policy, &constraints), Some(PolicyReject::AgeRestricted));

		constraints.age_restricted_ok = true;

		assert_eq!(evaluate(&policy, &constraints), None);
	}

	#[test]
	fn sensitive_is_checked_before_age_restriction() {
		let policy = Policy { sensitive: true, age_restricted: true, ..Default::default() };

		assert_eq!(
			evaluate(&policy, &MatchConstraints::default()),
			Some(PolicyReject::Sensitive)
		);
	}

	#[test]
	fn brand_safety_tier_never_rejects() {
		let policy = Policy { brand_safety_tier: BrandSafetyTier::Low, ..Default::default() };

		assert_eq!(evaluate(&policy, &MatchConstraints::default()), None);
	}
}
