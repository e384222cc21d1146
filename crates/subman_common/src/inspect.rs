//! Registration state inspection.
//!
//! The `identity` probe is the one invocation whose return code is not
//! enforced: a non-zero exit is the normal way the tool reports an
//! unregistered host.

use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::pools::{parse_pools, ListingKind, PoolRecord};
use crate::runner::{CommandRunner, Invocation};

/// Current registration state, derived fresh on every run.
#[derive(Debug, Clone, Default)]
pub struct RegistrationStatus {
    pub registered: bool,
    pub identity: Option<String>,
    pub consumed_pools: Vec<PoolRecord>,
}

/// The `identity` probe invocation.
pub fn identity_invocation(bin: &Path) -> Invocation {
    Invocation::argv([bin.display().to_string(), "identity".to_string()]).no_check_rc()
}

/// A `list` query. Invoked as a raw shell string with the locale
/// pinned to `C` so the labels stay non-localized and parseable.
pub fn list_invocation(bin: &Path, selector: &str) -> Invocation {
    Invocation::shell(format!("{} list {}", bin.display(), selector))
        .env("LANG", "C")
        .env("LC_ALL", "C")
        .env("LC_MESSAGES", "C")
}

/// Classify the host: exit code 0 means registered, anything else
/// means unregistered regardless of stderr content.
pub fn inspect(runner: &mut dyn CommandRunner, bin: &Path) -> Result<RegistrationStatus> {
    let output = runner.run_enforced(&identity_invocation(bin))?;
    let registered = output.rc == 0;
    let identity = if registered {
        extract_identity(&output.stdout)
    } else {
        None
    };
    debug!(registered, "identity probe finished");
    Ok(RegistrationStatus {
        registered,
        identity,
        consumed_pools: Vec::new(),
    })
}

/// Fetch and parse the consumed entitlements of a registered host.
pub fn consumed_pools(runner: &mut dyn CommandRunner, bin: &Path) -> Result<Vec<PoolRecord>> {
    let output = runner.run_enforced(&list_invocation(bin, "--consumed"))?;
    Ok(parse_pools(&output.stdout, ListingKind::Consumed))
}

fn extract_identity(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        line.trim()
            .strip_prefix("system identity:")
            .map(|value| value.trim().to_string())
    })
}
