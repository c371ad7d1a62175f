use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::actor::Role;
use crate::domain::request::ApprovalLevel;

/// Atomic permission held by a role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ProcessRequests,
    ApproveStandard,
    ApproveHighValue,
}

impl Capability {
    pub const ALL: [Capability; 3] =
        [Self::ProcessRequests, Self::ApproveStandard, Self::ApproveHighValue];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProcessRequests => "process_requests",
            Self::ApproveStandard => "approve_standard",
            Self::ApproveHighValue => "approve_high_value",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "process_requests" => Some(Self::ProcessRequests),
            "approve_standard" => Some(Self::ApproveStandard),
            "approve_high_value" => Some(Self::ApproveHighValue),
            _ => None,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait CapabilityProvider: Send + Sync {
    fn has_capability(&self, role: &Role, capability: Capability) -> bool;
}

/// Static role to capability table. Unknown roles hold nothing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapabilityTable {
    roles: BTreeMap<String, BTreeSet<Capability>>,
}

impl CapabilityTable {
    pub fn new<I, R, C>(entries: I) -> Self
    where
        I: IntoIterator<Item = (R, C)>,
        R: Into<String>,
        C: IntoIterator<Item = Capability>,
    {
        let roles = entries
            .into_iter()
            .map(|(role, capabilities)| {
                (Role::new(role).0, capabilities.into_iter().collect::<BTreeSet<_>>())
            })
            .collect();
        Self { roles }
    }

    pub fn capabilities_of(&self, role: &Role) -> BTreeSet<Capability> {
        self.roles.get(role.as_str()).cloned().unwrap_or_default()
    }

    pub fn roles(&self) -> impl Iterator<Item = (&str, &BTreeSet<Capability>)> {
        self.roles.iter().map(|(role, capabilities)| (role.as_str(), capabilities))
    }
}

impl Default for CapabilityTable {
    fn default() -> Self {
        use Capability::{ApproveHighValue, ApproveStandard, ProcessRequests};

        Self::new([
            ("employee", vec![]),
            ("accountant", vec![ProcessRequests]),
            ("chief_accountant", vec![ProcessRequests, ApproveStandard]),
            ("director", vec![ApproveStandard, ApproveHighValue]),
            ("admin", vec![ProcessRequests, ApproveStandard, ApproveHighValue]),
        ])
    }
}

impl CapabilityProvider for CapabilityTable {
    fn has_capability(&self, role: &Role, capability: Capability) -> bool {
        self.roles.get(role.as_str()).is_some_and(|held| held.contains(&capability))
    }
}

/// Answers "may this role act here" purely through capability checks.
#[derive(Clone)]
pub struct PermissionGate {
    provider: Arc<dyn CapabilityProvider>,
}

impl PermissionGate {
    pub fn new(provider: Arc<dyn CapabilityProvider>) -> Self {
        Self { provider }
    }

    /// Capability an approver needs at `step` of `level`, if that step exists.
    pub fn required_capability_for_step(level: ApprovalLevel, step: u8) -> Option<Capability> {
        match (level, step) {
            (ApprovalLevel::ChiefAccountant, 1) | (ApprovalLevel::Executive, 1) => {
                Some(Capability::ApproveStandard)
            }
            (ApprovalLevel::Executive, 2) => Some(Capability::ApproveHighValue),
            _ => None,
        }
    }

    pub fn can_approve_at_step(&self, role: &Role, level: ApprovalLevel, step: u8) -> bool {
        Self::required_capability_for_step(level, step)
            .is_some_and(|capability| self.provider.has_capability(role, capability))
    }

    pub fn can_process(&self, role: &Role) -> bool {
        self.provider.has_capability(role, Capability::ProcessRequests)
    }

    /// Staff hold at least one workflow capability.
    pub fn is_staff(&self, role: &Role) -> bool {
        Capability::ALL.iter().any(|capability| self.provider.has_capability(role, *capability))
    }
}

impl Default for PermissionGate {
    fn default() -> Self {
        Self::new(Arc::new(CapabilityTable::default()))
    }
}

impl fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionGate").finish_non_exhaustive()
    }
}
