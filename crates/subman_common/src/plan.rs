//! Command plan builder: the registration state machine.
//!
//! Pure functions from (desired parameters, current state, parsed pool
//! inventory) to an ordered list of invocations plus a changed verdict
//! and outcome message. Nothing here touches the process boundary;
//! the orchestrator executes the result.
//!
//! Argument order is load-bearing: the wrapped tool's CLI is the
//! compatibility contract, so `register` flags are always emitted as
//! `[--force] [--org X] (--activationkey K | --username U --password P)
//! [--auto-attach] [--serverurl H] [--proxy H:P --proxyuser U
//! --proxypassword P]`.

use std::path::Path;

use crate::error::{Result, SubmanError};
use crate::inspect::RegistrationStatus;
use crate::params::{DesiredState, RegistrationParams};
use crate::pools::PoolRecord;
use crate::runner::Invocation;

/// Ordered invocations plus the convergence verdict, computed once per
/// run and never re-derived mid-execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub invocations: Vec<Invocation>,
    pub changed: bool,
    pub message: String,
    /// True when the plan performs a (re-)registration; the
    /// orchestrator runs the repo-file hook before executing it.
    pub registers: bool,
}

impl Plan {
    fn unchanged(message: &str) -> Self {
        Self {
            invocations: Vec::new(),
            changed: false,
            message: message.to_string(),
            registers: false,
        }
    }
}

/// Pool attachment sub-plan: unsubscribes first, then attaches, both
/// in deterministic order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PoolPlan {
    pub invocations: Vec<Invocation>,
    pub changed: bool,
}

/// Apply the transition table for (current, desired) state.
pub fn build_registration_plan(
    params: &RegistrationParams,
    status: &RegistrationStatus,
    bin: &Path,
    default_hostname: &str,
) -> Plan {
    match (status.registered, params.state) {
        (true, DesiredState::Present) if !params.force_register => {
            Plan::unchanged("System already registered.")
        }
        (_, DesiredState::Present) => {
            let force = status.registered && params.force_register;
            let mut invocations = Vec::new();
            if let Some(config) = config_invocation(params, bin, default_hostname) {
                invocations.push(config);
            }
            invocations.push(register_invocation(params, bin, default_hostname, force));
            Plan {
                invocations,
                changed: true,
                message: registered_message(params),
                registers: true,
            }
        }
        (false, DesiredState::Absent) => Plan::unchanged("System already unregistered."),
        (true, DesiredState::Absent) => {
            let bin = bin.display().to_string();
            Plan {
                invocations: vec![
                    Invocation::argv([bin.clone(), "unsubscribe".into(), "--all".into()]),
                    Invocation::argv([bin, "unregister".into()]),
                ],
                changed: true,
                message: unregistered_message(params),
                registers: false,
            }
        }
    }
}

/// The single `config` invocation, or `None` when nothing needs
/// configuring. Flags come out in fixed key order: hostname first,
/// then the proxy fields alphabetically, all as `--server.<key>=<value>`
/// pairs in one call.
fn config_invocation(
    params: &RegistrationParams,
    bin: &Path,
    default_hostname: &str,
) -> Option<Invocation> {
    let mut args = vec![bin.display().to_string(), "config".to_string()];

    if let Some(hostname) = non_default_hostname(params, default_hostname) {
        args.push(format!("--server.hostname={hostname}"));
    }
    let proxy_fields = [
        ("proxy_hostname", &params.server_proxy_hostname),
        ("proxy_password", &params.server_proxy_password),
        ("proxy_port", &params.server_proxy_port),
        ("proxy_user", &params.server_proxy_user),
    ];
    for (key, value) in proxy_fields {
        if let Some(value) = value {
            args.push(format!("--server.{key}={value}"));
        }
    }

    if args.len() == 2 {
        return None;
    }
    Some(Invocation::argv(args))
}

fn register_invocation(
    params: &RegistrationParams,
    bin: &Path,
    default_hostname: &str,
    force: bool,
) -> Invocation {
    let mut args = vec![bin.display().to_string(), "register".to_string()];

    if force {
        args.push("--force".into());
    }
    if let Some(org) = &params.org_id {
        args.push("--org".into());
        args.push(org.clone());
    }
    if let Some(key) = &params.activationkey {
        args.push("--activationkey".into());
        args.push(key.clone());
    } else {
        if let Some(username) = &params.username {
            args.push("--username".into());
            args.push(username.clone());
        }
        if let Some(password) = &params.password {
            args.push("--password".into());
            args.push(password.clone());
        }
    }
    if params.auto_attach {
        args.push("--auto-attach".into());
    }
    if let Some(hostname) = non_default_hostname(params, default_hostname) {
        args.push("--serverurl".into());
        args.push(hostname.to_string());
    }
    if let Some(proxy_host) = &params.server_proxy_hostname {
        let proxy = match &params.server_proxy_port {
            Some(port) => format!("{proxy_host}:{port}"),
            None => proxy_host.clone(),
        };
        args.push("--proxy".into());
        args.push(proxy);
        if let Some(user) = &params.server_proxy_user {
            args.push("--proxyuser".into());
            args.push(user.clone());
        }
        if let Some(password) = &params.server_proxy_password {
            args.push("--proxypassword".into());
            args.push(password.clone());
        }
    }

    Invocation::argv(args)
}

fn non_default_hostname<'a>(
    params: &'a RegistrationParams,
    default_hostname: &str,
) -> Option<&'a str> {
    params
        .server_hostname
        .as_deref()
        .filter(|hostname| *hostname != default_hostname)
}

fn registered_message(params: &RegistrationParams) -> String {
    match &params.server_hostname {
        Some(hostname) => format!("System successfully registered to '{hostname}'."),
        None => "System successfully registered.".to_string(),
    }
}

fn unregistered_message(params: &RegistrationParams) -> String {
    match &params.server_hostname {
        Some(hostname) => format!("System successfully unregistered from '{hostname}'."),
        None => "System successfully unregistered.".to_string(),
    }
}

/// Diff the requested pool set against what is currently consumed.
///
/// Consumed pools outside the target set are detached individually by
/// serial; target pools not already consumed at the requested quantity
/// are attached, in input order. Every requested attach is validated
/// against the available listing before any invocation is built, so a
/// bad pool id fails the whole plan before an `attach` runs.
pub fn build_pool_plan(
    targets: &[(String, u32)],
    consumed: &[PoolRecord],
    available: &[PoolRecord],
    bin: &Path,
) -> Result<PoolPlan> {
    let bin = bin.display().to_string();
    let mut plan = PoolPlan::default();

    for pool in consumed {
        if targets.iter().any(|(id, _)| *id == pool.pool_id) {
            continue;
        }
        let Some(serial) = &pool.serial else {
            // Cannot target a detach without a serial; the listing was
            // incomplete for this block.
            continue;
        };
        plan.invocations.push(Invocation::argv([
            bin.clone(),
            "unsubscribe".into(),
            format!("--serial={serial}"),
        ]));
    }

    let mut attaches = Vec::new();
    for (pool_id, quantity) in targets {
        let already_consumed = consumed
            .iter()
            .any(|pool| pool.pool_id == *pool_id && pool.quantity_used == Some(*quantity));
        if already_consumed {
            continue;
        }

        let candidate = available
            .iter()
            .find(|pool| pool.pool_id == *pool_id)
            .ok_or_else(|| {
                SubmanError::UnresolvedPool(format!(
                    "pool id {pool_id} is not present in the available listing"
                ))
            })?;
        if let Some(count) = candidate.available {
            if count < *quantity {
                return Err(SubmanError::UnresolvedPool(format!(
                    "pool id {pool_id} has {count} available, {quantity} requested"
                )));
            }
        }

        attaches.push(Invocation::argv([
            bin.clone(),
            "attach".into(),
            "--pool".into(),
            pool_id.clone(),
            "--quantity".into(),
            quantity.to_string(),
        ]));
    }
    plan.invocations.extend(attaches);

    plan.changed = !plan.invocations.is_empty();
    Ok(plan)
}
