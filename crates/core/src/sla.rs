use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::request::{Priority, Request, RequestStatus, RequestType};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaStatus {
    /// Terminal requests and requests without a deadline.
    None,
    Ok,
    Warning,
    Breached,
}

impl SlaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Breached => "breached",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum SlaPolicyError {
    #[error("sla warning fraction must be within (0, 1), got {0}")]
    WarningFraction(f64),
    #[error("sla window for {request_type}/{priority} must be positive")]
    NonPositiveWindow { request_type: &'static str, priority: &'static str },
}

/// Resolution windows keyed by `(request type, priority)`.
#[derive(Clone, Debug, PartialEq)]
pub struct SlaPolicy {
    windows: BTreeMap<(RequestType, Priority), Duration>,
    warning_fraction: f64,
}

impl SlaPolicy {
    pub fn new(
        windows: BTreeMap<(RequestType, Priority), Duration>,
        warning_fraction: f64,
    ) -> Result<Self, SlaPolicyError> {
        if !(warning_fraction > 0.0 && warning_fraction < 1.0) {
            return Err(SlaPolicyError::WarningFraction(warning_fraction));
        }
        for ((request_type, priority), window) in &windows {
            if *window <= Duration::zero() {
                return Err(SlaPolicyError::NonPositiveWindow {
                    request_type: request_type.as_str(),
                    priority: priority.as_str(),
                });
            }
        }
        Ok(Self { windows, warning_fraction })
    }

    pub fn warning_fraction(&self) -> f64 {
        self.warning_fraction
    }

    /// Window for the pair, falling back to the default table for unconfigured pairs.
    pub fn window(&self, request_type: RequestType, priority: Priority) -> Duration {
        self.windows
            .get(&(request_type, priority))
            .copied()
            .unwrap_or_else(|| default_window(request_type, priority))
    }

    pub fn compute_deadline(
        &self,
        created_at: DateTime<Utc>,
        request_type: RequestType,
        priority: Priority,
    ) -> DateTime<Utc> {
        created_at + self.window(request_type, priority)
    }

    /// The warning band is sized from the request's own deadline, so retuned
    /// windows only affect requests created afterwards.
    pub fn classify_request(&self, request: &Request, now: DateTime<Utc>) -> SlaStatus {
        let window = request
            .sla_deadline
            .map(|deadline| deadline - request.created_at)
            .filter(|window| *window > Duration::zero())
            .unwrap_or_else(|| self.window(request.request_type, request.priority));
        classify(request.sla_deadline, request.status, window, self.warning_fraction, now)
    }
}

impl Default for SlaPolicy {
    fn default() -> Self {
        let windows = RequestType::ALL
            .into_iter()
            .flat_map(|request_type| {
                [Priority::Normal, Priority::Urgent].into_iter().map(move |priority| {
                    ((request_type, priority), default_window(request_type, priority))
                })
            })
            .collect();
        Self { windows, warning_fraction: 0.2 }
    }
}

pub fn default_window_hours(request_type: RequestType, priority: Priority) -> i64 {
    match (request_type, priority) {
        (RequestType::Reconciliation, Priority::Normal) => 72,
        (RequestType::Reconciliation, Priority::Urgent) => 24,
        (RequestType::Payment, Priority::Normal) => 48,
        (RequestType::Payment, Priority::Urgent) => 8,
        (RequestType::Confirmation, Priority::Normal) => 24,
        (RequestType::Confirmation, Priority::Urgent) => 4,
    }
}

fn default_window(request_type: RequestType, priority: Priority) -> Duration {
    Duration::hours(default_window_hours(request_type, priority))
}

/// Classifies remaining time. Depends only on its arguments.
pub fn classify(
    deadline: Option<DateTime<Utc>>,
    status: RequestStatus,
    window: Duration,
    warning_fraction: f64,
    now: DateTime<Utc>,
) -> SlaStatus {
    if status.is_terminal() {
        return SlaStatus::None;
    }
    let Some(deadline) = deadline else {
        return SlaStatus::None;
    };
    if now > deadline {
        return SlaStatus::Breached;
    }

    let remaining_ms = (deadline - now).num_milliseconds() as f64;
    let warning_ms = window.num_milliseconds() as f64 * warning_fraction;
    if remaining_ms < warning_ms {
        SlaStatus::Warning
    } else {
        SlaStatus::Ok
    }
}
