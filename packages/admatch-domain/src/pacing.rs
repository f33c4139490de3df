use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::sponsorship::{Budget, PacingMode, Schedule};

/// Delivery-to-date figures for one campaign, supplied by an external analytics collaborator.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
pub struct DeliverySnapshot {
	pub spent_today: f64,
	pub spent_total: f64,
	pub observed_ctr: Option<f64>,
}

/// Bounds on the adaptive CTR multiplier, from configuration.
#[derive(Clone, Copy, Debug)]
pub struct PacingLimits {
	pub adaptive_min: f32,
	pub adaptive_max: f32,
}
impl Default for PacingLimits {
	fn default() -> Self {
		Self { adaptive_min: 0.5, adaptive_max: 1.5 }
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PacingReason {
	ScheduleInactive,
	NoDeliveryData,
	WithinBudget,
	Paced,
	BudgetExhausted,
}
impl PacingReason {
	pub fn reason(&self) -> &'static str {
		match self {
			Self::ScheduleInactive => "schedule.inactive",
			Self::NoDeliveryData => "no_delivery_data",
			Self::WithinBudget => "within_budget",
			Self::Paced => "paced",
			Self::BudgetExhausted => "budget_exhausted",
		}
	}
}

/// `active == false` is a hard reject; `weight == 0.0` keeps the candidate visible with a
/// zero final score.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PacingDecision {
	pub active: bool,
	pub weight: f32,
	pub reason: PacingReason,
}

pub fn evaluate(
	schedule: &Schedule,
	budget: &Budget,
	delivery: Option<&DeliverySnapshot>,
	limits: &PacingLimits,
	now: OffsetDateTime,
) -> PacingDecision {
	if !schedule.is_active(now) {
		return PacingDecision { active: false, weight: 0.0, reason: PacingReason::ScheduleInactive };
	}

	let Some(snapshot) = delivery else {
		return PacingDecision { active: true, weight: 1.0, reason: PacingReason::NoDeliveryData };
	};

	if let Some(total) = budget.total_budget
		&& total > 0.0
		&& snapshot.spent_total >= total
	{
		return PacingDecision { active: true, weight: 0.0, reason: PacingReason::BudgetExhausted };
	}

	let mut weight = match budget.daily_budget {
		Some(daily) if daily > 0.0 => {
			if snapshot.spent_today >= daily {
				return PacingDecision {
					active: true,
					weight: 0.0,
					reason: PacingReason::BudgetExhausted,
				};
			}

			let remaining = daily - snapshot.spent_today;
			let expected_remaining = daily * (1.0 - day_fraction(now));

			// With the day nearly over and budget left, deliver at full weight.
			if expected_remaining <= f64::EPSILON {
				1.0
			} else {
				(remaining / expected_remaining).min(1.0)
			}
		},
		_ => 1.0,
	};

	if budget.pacing_mode == PacingMode::Adaptive
		&& let Some(target) = budget.target_ctr
		&& target > 0.0
		&& let Some(observed) = snapshot.observed_ctr
	{
		let multiplier =
			(observed / target).clamp(f64::from(limits.adaptive_min), f64::from(limits.adaptive_max));

		weight *= multiplier;
	}

	let weight = weight.clamp(0.0, 1.0) as f32;
	let reason = if weight >= 1.0 { PacingReason::WithinBudget } else { PacingReason::Paced };

	PacingDecision { active: true, weight, reason }
}

fn day_fraction(now: OffsetDateTime) -> f64 {
	let utc = now.to_offset(time::UtcOffset::UTC);
	let seconds = u32::from(utc.hour()) * 3_600 + u32::from(utc.minute()) * 60
		+ u32::from(utc.second());

	f64::from(seconds) / 86_400.0
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	use super::*;

	fn budget(daily: Option<f64>) -> Budget {
		Budget { daily_budget: daily, ..Default::default() }
	}

	fn snapshot(spent_today: f64) -> DeliverySnapshot {
		DeliverySnapshot { spent_today, spent_total: spent_today, observed_ctr: None }
	}

	#[test]
	fn inactive_schedule_is_a_hard_reject() {
		let schedule = Schedule {
			start_at: Some(datetime!(2026-06-01 00:00 UTC)),
			end_at: None,
		};
		let decision = evaluate(
			&schedule,
			&budget(Some(100.0)),
			Some(&snapshot(0.0)),
			&PacingLimits::default(),
			datetime!(2026-05-01 12:00 UTC),
		);

		assert!(!decision.active);
		assert_eq!(decision.reason, PacingReason::ScheduleInactive);
	}

	#[test]
	fn missing_delivery_data_means_full_weight() {
		let decision = evaluate(
			&Schedule::default(),
			&budget(Some(100.0)),
			None,
			&PacingLimits::default(),
			datetime!(2026-05-01 12:00 UTC),
		);

		assert_eq!(decision.weight, 1.0);
		assert_eq!(decision.reason, PacingReason::NoDeliveryData);
	}

	#[test]
	fn on_track_spend_keeps_full_weight() {
		// Half the day gone, half the budget spent.
		let decision = evaluate(
			&Schedule::default(),
			&budget(Some(100.0)),
			Some(&snapshot(50.0)),
			&PacingLimits::default(),
			datetime!(2026-05-01 12:00 UTC),
		);

		assert_eq!(decision.weight, 1.0);
		assert_eq!(decision.reason, PacingReason::WithinBudget);
	}

	#[test]
	fn ahead_of_schedule_spend_is_throttled() {
		// Half the day gone, 80% spent: remaining 20 vs expected 50.
		let decision = evaluate(
			&Schedule::default(),
			&budget(Some(100.0)),
			Some(&snapshot(80.0)),
			&PacingLimits::default(),
			datetime!(2026-05-01 12:00 UTC),
		);

		assert!((decision.weight - 0.4).abs() < 1e-6);
		assert_eq!(decision.reason, PacingReason::Paced);
	}

	#[test]
	fn exhausted_daily_budget_scores_zero_but_stays_active() {
		let decision = evaluate(
			&Schedule::default(),
			&budget(Some(100.0)),
			Some(&snapshot(100.0)),
			&PacingLimits::default(),
			datetime!(2026-05-01 12:00 UTC),
		);

		assert!(decision.active);
		assert_eq!(decision.weight, 0.0);
		assert_eq!(decision.reason, PacingReason::BudgetExhausted);
	}

	#[test]
	fn exhausted_total_budget_scores_zero() {
		let budget = Budget {
			daily_budget: Some(100.0),
			total_budget: Some(1_000.0),
			..Default::default()
		};
		let delivery =
			DeliverySnapshot { spent_today: 10.0, spent_total: 1_000.0, observed_ctr: None };
		let decision = evaluate(
			&Schedule::default(),
			&budget,
			Some(&delivery),
			&PacingLimits::default(),
			datetime!(2026-05-01 12:00 UTC),
		);

		assert!(decision.active);
		assert_eq!(decision.weight, 0.0);
		assert_eq!(decision.reason, PacingReason::BudgetExhausted);
	}

	#[test]
	fn end_of_day_with_remaining_budget_keeps_full_weight() {
		let decision = evaluate(
			&Schedule::default(),
			&budget(Some(100.0)),
			Some(&snapshot(10.0)),
			&PacingLimits::default(),
			datetime!(2026-05-01 23:59:59 UTC),
		);

		assert_eq!(decision.weight, 1.0);
	}

	#[test]
	fn no_budget_configured_means_full_weight() {
		let decision = evaluate(
			&Schedule::default(),
			&budget(None),
			Some(&snapshot(5_000.0)),
			&PacingLimits::default(),
			datetime!(2026-05-01 12:00 UTC),
		);

		assert_eq!(decision.weight, 1.0);
		assert_eq!(decision.reason, PacingReason::WithinBudget);
	}

	#[test]
	fn adaptive_underperformance_halves_the_weight_at_the_floor() {
		let budget = Budget {
			daily_budget: Some(100.0),
			pacing_mode: PacingMode::Adaptive,
			target_ctr: Some(0.02),
			..Default::default()
		};
		let delivery =
			DeliverySnapshot { spent_today: 50.0, spent_total: 50.0, observed_ctr: Some(0.001) };
		// On-track even weight of 1.0, scaled by the clamped CTR ratio floor.
		let decision = evaluate(
			&Schedule::default(),
			&budget,
			Some(&delivery),
			&PacingLimits::default(),
			datetime!(2026-05-01 12:00 UTC),
		);

		assert!((decision.weight - 0.5).abs() < 1e-6);
		assert_eq!(decision.reason, PacingReason::Paced);
	}

	#[test]
	fn adaptive_overperformance_is_capped_at_full_weight() {
		let budget = Budget {
			daily_budget: Some(100.0),
			pacing_mode: PacingMode::Adaptive,
			target_ctr: Some(0.02),
			..Default::default()
		};
		let delivery =
			DeliverySnapshot { spent_today: 80.0, spent_total: 80.0, observed_ctr: Some(0.2) };
		// Throttled to 0.4 by spend, boosted by the capped 1.5x multiplier.
		let decision = evaluate(
			&Schedule::default(),
			&budget,
			Some(&delivery),
			&PacingLimits::default(),
			datetime!(2026-05-01 12:00 UTC),
		);

		assert!((decision.weight - 0.6).abs() < 1e-6);
	}

	#[test]
	fn adaptive_without_observed_ctr_falls_back_to_even() {
		let budget = Budget {
			daily_budget: Some(100.0),
			pacing_mode: PacingMode::Adaptive,
			target_ctr: Some(0.02),
			..Default::default()
		};
		let decision = evaluate(
			&Schedule::default(),
			&budget,
			Some(&snapshot(50.0)),
			&PacingLimits::default(),
			datetime!(2026-05-01 12:00 UTC),
		);

		assert_eq!(decision.weight, 1.0);
	}
}
