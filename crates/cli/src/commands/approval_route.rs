use std::str::FromStr;

use opsdesk_core::approvals::{Capability, CapabilityTable, PermissionGate};
use opsdesk_core::config::{AppConfig, LoadOptions};
use opsdesk_core::domain::RequestType;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct RouteStep {
    step: u8,
    capability: &'static str,
    eligible_roles: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ApprovalRoute {
    request_type: &'static str,
    amount: Option<String>,
    approval_level: &'static str,
    required_steps: u8,
    low_threshold: String,
    high_threshold: String,
    steps: Vec<RouteStep>,
}

pub fn run(request_type: &str, amount: Option<&str>) -> CommandResult {
    let Some(request_type) = RequestType::parse(request_type) else {
        return CommandResult::failure(
            "approval-route",
            "invalid_input",
            format!(
                "unknown request type `{request_type}` \
                 (expected reconciliation|payment|confirmation)"
            ),
            7,
        );
    };

    let parsed = amount.map(|raw| Decimal::from_str(raw.trim()).map_err(|_| raw)).transpose();
    let amount = match parsed {
        Ok(amount) => amount,
        Err(raw) => {
            return CommandResult::failure(
                "approval-route",
                "invalid_input",
                format!("amount `{raw}` is not a decimal number"),
                7,
            );
        }
    };
    if amount.is_some_and(|amount| amount.is_sign_negative()) {
        return CommandResult::failure(
            "approval-route",
            "invalid_input",
            "amount must not be negative",
            7,
        );
    }

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "approval-route",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };
    let thresholds = match config.approval_thresholds() {
        Ok(thresholds) => thresholds,
        Err(error) => {
            return CommandResult::failure(
                "approval-route",
                "config_validation",
                error.to_string(),
                2,
            );
        }
    };

    let requirement = thresholds.resolve(request_type, amount);
    let table = config.capability_table();
    let steps = (1..=requirement.required_steps)
        .filter_map(|step| {
            PermissionGate::required_capability_for_step(requirement.level, step).map(|capability| {
                RouteStep {
                    step,
                    capability: capability.as_str(),
                    eligible_roles: roles_holding(&table, capability),
                }
            })
        })
        .collect();

    let route = ApprovalRoute {
        request_type: request_type.as_str(),
        amount: amount.map(|amount| amount.to_string()),
        approval_level: requirement.level.as_str(),
        required_steps: requirement.required_steps,
        low_threshold: thresholds.low().to_string(),
        high_threshold: thresholds.high().to_string(),
        steps,
    };
    let message = if requirement.required_steps == 0 {
        "no approval required".to_string()
    } else {
        format!(
            "{} approval step(s) at level {}",
            requirement.required_steps,
            requirement.level.as_str()
        )
    };

    match serde_json::to_value(&route) {
        Ok(details) => CommandResult::success_with("approval-route", message, Some(details)),
        Err(error) => {
            CommandResult::failure("approval-route", "serialization", error.to_string(), 1)
        }
    }
}

fn roles_holding(table: &CapabilityTable, capability: Capability) -> Vec<String> {
    table
        .roles()
        .filter(|(_, held)| held.contains(&capability))
        .map(|(role, _)| role.to_string())
        .collect()
}
