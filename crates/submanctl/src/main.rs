//! submanctl - Idempotent subscription-manager registration.
//!
//! One-shot convergence: inspect the host, compute the minimal command
//! plan, run it, and print a single JSON result object on stdout:
//! `{"changed": bool, "msg": "..."}` on success,
//! `{"failed": true, "msg": "..."}` with exit code 1 on failure.
//! Diagnostics go to stderr via tracing.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use subman_common::orchestrate::{converge, Convergence, RunnerConfig};
use subman_common::params::{DesiredState, PoolIds, RegistrationParams};
use subman_common::runner::{resolve_binary, SystemRunner};

#[derive(Parser)]
#[command(name = "submanctl")]
#[command(version, about = "Idempotent host registration with a subscription service")]
struct Cli {
    /// Read the full parameter record from a JSON file ('-' for stdin)
    #[arg(long, value_name = "FILE", conflicts_with = "state")]
    params_file: Option<PathBuf>,

    /// Desired registration state
    #[arg(long, value_enum, required_unless_present = "params_file")]
    state: Option<StateArg>,

    #[arg(long)]
    username: Option<String>,

    #[arg(long)]
    password: Option<String>,

    #[arg(long)]
    activationkey: Option<String>,

    #[arg(long)]
    org_id: Option<String>,

    /// Let the tool attach the best-fitting entitlements itself
    #[arg(long)]
    auto_attach: bool,

    /// Re-register even when the host is already registered
    #[arg(long)]
    force_register: bool,

    /// Pool to attach, as ID or ID=QUANTITY; repeatable
    #[arg(long = "pool", value_name = "ID[=QTY]")]
    pools: Vec<String>,

    #[arg(long)]
    server_hostname: Option<String>,

    #[arg(long)]
    server_proxy_hostname: Option<String>,

    #[arg(long)]
    server_proxy_port: Option<String>,

    #[arg(long)]
    server_proxy_user: Option<String>,

    #[arg(long)]
    server_proxy_password: Option<String>,

    /// Name or path of the external subscription tool
    #[arg(long, default_value = "subscription-manager")]
    binary: String,

    /// Hostname the tool considers its default; config/serverurl flags
    /// are only emitted for other hostnames
    #[arg(long, default_value = subman_common::orchestrate::DEFAULT_RHSM_HOSTNAME)]
    default_hostname: String,

    /// Stale repository definition removed before registering
    #[arg(long, default_value = subman_common::orchestrate::DEFAULT_REPO_FILE)]
    repo_file: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum StateArg {
    Present,
    Absent,
}

impl From<StateArg> for DesiredState {
    fn from(state: StateArg) -> Self {
        match state {
            StateArg::Present => DesiredState::Present,
            StateArg::Absent => DesiredState::Absent,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(outcome) => {
            println!(
                "{}",
                serde_json::json!({ "changed": outcome.changed, "msg": outcome.msg })
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            println!(
                "{}",
                serde_json::json!({ "failed": true, "msg": format!("{err:#}") })
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<Convergence> {
    let params = load_params(&cli)?;
    let config = RunnerConfig {
        binary: cli.binary,
        default_hostname: cli.default_hostname,
        repo_file: cli.repo_file,
    };

    let bin = resolve_binary(&config.binary)?;
    tracing::debug!(binary = %bin.display(), "resolved subscription tool");
    let mut runner = SystemRunner::new();
    let outcome = converge(&params, &config, &mut runner, &bin)?;
    Ok(outcome)
}

fn load_params(cli: &Cli) -> Result<RegistrationParams> {
    if let Some(path) = &cli.params_file {
        let raw = if path.as_os_str() == "-" {
            std::io::read_to_string(std::io::stdin()).context("reading parameters from stdin")?
        } else {
            std::fs::read_to_string(path)
                .with_context(|| format!("reading parameters from {}", path.display()))?
        };
        return serde_json::from_str(&raw).context("parsing parameter JSON");
    }

    let state = cli
        .state
        .context("--state is required without --params-file")?;
    let mut params = RegistrationParams::new(state.into());
    params.username = cli.username.clone();
    params.password = cli.password.clone();
    params.activationkey = cli.activationkey.clone();
    params.org_id = cli.org_id.clone();
    params.auto_attach = cli.auto_attach;
    params.force_register = cli.force_register;
    params.pool_ids = parse_pool_args(&cli.pools)?;
    params.server_hostname = cli.server_hostname.clone();
    params.server_proxy_hostname = cli.server_proxy_hostname.clone();
    params.server_proxy_port = cli.server_proxy_port.clone();
    params.server_proxy_user = cli.server_proxy_user.clone();
    params.server_proxy_password = cli.server_proxy_password.clone();
    Ok(params)
}

/// `--pool ID` gives implicit quantity 1; any `--pool ID=QTY` switches
/// the whole selection to an explicit quantity mapping.
fn parse_pool_args(pools: &[String]) -> Result<Option<PoolIds>> {
    if pools.is_empty() {
        return Ok(None);
    }

    let mut quantities = BTreeMap::new();
    let mut explicit = false;
    for pool in pools {
        match pool.split_once('=') {
            Some((id, quantity)) => {
                let quantity: u32 = quantity
                    .parse()
                    .with_context(|| format!("invalid pool quantity in '{pool}'"))?;
                quantities.insert(id.to_string(), quantity);
                explicit = true;
            }
            None => {
                quantities.insert(pool.clone(), 1);
            }
        }
    }

    if explicit {
        Ok(Some(PoolIds::Quantities(quantities)))
    } else {
        Ok(Some(PoolIds::Many(
            pools.iter().map(|pool| pool.to_string()).collect(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_pool_ids_become_a_list() {
        let parsed = parse_pool_args(&["P1".to_string(), "P2".to_string()])
            .unwrap()
            .unwrap();
        assert_eq!(
            parsed.targets(),
            vec![("P1".to_string(), 1), ("P2".to_string(), 1)]
        );
    }

    #[test]
    fn quantity_suffix_switches_to_mapping() {
        let parsed = parse_pool_args(&["P1=4".to_string(), "P2".to_string()])
            .unwrap()
            .unwrap();
        assert_eq!(
            parsed.targets(),
            vec![("P1".to_string(), 4), ("P2".to_string(), 1)]
        );
    }

    #[test]
    fn bad_quantity_is_rejected() {
        assert!(parse_pool_args(&["P1=lots".to_string()]).is_err());
    }

    #[test]
    fn no_pools_means_no_selection() {
        assert!(parse_pool_args(&[]).unwrap().is_none());
    }
}
