//! Approval routing: which track a request needs and who may act at each step.

pub mod permission;
pub mod threshold;

pub use permission::{Capability, CapabilityProvider, CapabilityTable, PermissionGate};
pub use threshold::{ApprovalRequirement, ApprovalThresholds, ThresholdError};
