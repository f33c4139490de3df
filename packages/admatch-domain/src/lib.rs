pub mod constraints;
pub mod pacing;
pub mod policy;
pub mod sponsorship;
pub mod targeting;

pub use constraints::MatchConstraints;
pub use pacing::{DeliverySnapshot, PacingDecision, PacingLimits, PacingReason};
pub use policy::PolicyReject;
pub use sponsorship::{
	BrandSafetyTier, Budget, Campaign, Creative, CreativeSpec, PacingMode, Policy, Schedule,
	Targeting,
};
pub use targeting::TargetingReject;
