//! Single-run convergence: inspect, plan, execute, report.
//!
//! Execution is strictly in order and stops at the first enforced
//! return-code failure. No retries, no rollback: a partially-run plan
//! leaves the host in a valid intermediate state that the next run
//! picks up from.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::Result;
use crate::inspect::{consumed_pools, inspect, list_invocation};
use crate::params::{DesiredState, RegistrationParams};
use crate::plan::{build_pool_plan, build_registration_plan, PoolPlan};
use crate::pools::{parse_pools, ListingKind};
use crate::runner::{CommandRunner, Invocation};

pub const DEFAULT_RHSM_HOSTNAME: &str = "subscription.rhsm.redhat.com";
pub const DEFAULT_REPO_FILE: &str = "/etc/yum.repos.d/redhat.repo";

/// Environment the orchestrator runs in: which binary to drive, which
/// hostname counts as the tool's default, and where the stale repo
/// marker file lives. Passed in rather than read from globals.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub binary: String,
    pub default_hostname: String,
    pub repo_file: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            binary: "subscription-manager".to_string(),
            default_hostname: DEFAULT_RHSM_HOSTNAME.to_string(),
            repo_file: PathBuf::from(DEFAULT_REPO_FILE),
        }
    }
}

/// Outcome of one run, reported to the calling automation framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Convergence {
    pub changed: bool,
    pub msg: String,
}

/// Pre-registration filesystem hook: a stale repository definition
/// left behind by a previous registration is removed before the tool
/// registers again. Kept outside the state machine on purpose.
#[derive(Debug, Clone)]
pub struct RepoFileHook {
    path: PathBuf,
}

impl RepoFileHook {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn run(&self) -> Result<()> {
        if self.path.is_file() {
            debug!(path = %self.path.display(), "removing stale repo file before registration");
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// Converge the host to the desired registration state.
///
/// `bin` is the already-resolved path of the external tool; resolution
/// failures are surfaced before this point.
pub fn converge(
    params: &RegistrationParams,
    config: &RunnerConfig,
    runner: &mut dyn CommandRunner,
    bin: &Path,
) -> Result<Convergence> {
    params.validate()?;

    let mut status = inspect(runner, bin)?;

    let targets = params.pool_targets();
    let wants_explicit_pools =
        params.state == DesiredState::Present && !targets.is_empty() && !params.auto_attach;

    // The consumed set only matters for the diff when the current
    // registration survives the run; a forced re-register starts over.
    if wants_explicit_pools && status.registered && !params.force_register {
        status.consumed_pools = consumed_pools(runner, bin)?;
    }

    let plan = build_registration_plan(params, &status, bin, &config.default_hostname);
    info!(
        changed = plan.changed,
        steps = plan.invocations.len(),
        "registration plan built"
    );

    if plan.registers {
        RepoFileHook::new(&config.repo_file).run()?;
    }
    execute(runner, &plan.invocations)?;

    let mut changed = plan.changed;
    if wants_explicit_pools {
        let pool_plan = attachment_plan(&targets, &status, runner, bin)?;
        execute(runner, &pool_plan.invocations)?;
        changed = changed || pool_plan.changed;
    }

    Ok(Convergence {
        changed,
        msg: plan.message,
    })
}

/// Build the pool sub-plan, querying the available listing only when
/// at least one attach is actually needed.
fn attachment_plan(
    targets: &[(String, u32)],
    status: &crate::inspect::RegistrationStatus,
    runner: &mut dyn CommandRunner,
    bin: &Path,
) -> Result<PoolPlan> {
    let needs_attach = targets.iter().any(|(pool_id, quantity)| {
        !status
            .consumed_pools
            .iter()
            .any(|pool| pool.pool_id == *pool_id && pool.quantity_used == Some(*quantity))
    });

    let available = if needs_attach {
        let output = runner.run_enforced(&list_invocation(bin, "--available"))?;
        parse_pools(&output.stdout, ListingKind::Available)
    } else {
        Vec::new()
    };

    build_pool_plan(targets, &status.consumed_pools, &available, bin)
}

fn execute(runner: &mut dyn CommandRunner, invocations: &[Invocation]) -> Result<()> {
    for invocation in invocations {
        runner.run_enforced(invocation)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_hook_removes_existing_marker() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("redhat.repo");
        fs::write(&marker, "[rhel]\n").unwrap();

        RepoFileHook::new(&marker).run().unwrap();
        assert!(!marker.exists());
    }

    #[test]
    fn repo_hook_tolerates_missing_marker() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("redhat.repo");
        assert!(RepoFileHook::new(&marker).run().is_ok());
    }

    #[test]
    fn default_config_points_at_the_real_tool() {
        let config = RunnerConfig::default();
        assert_eq!(config.binary, "subscription-manager");
        assert_eq!(config.default_hostname, DEFAULT_RHSM_HOSTNAME);
        assert_eq!(config.repo_file, PathBuf::from(DEFAULT_REPO_FILE));
    }
}
