//! Process boundary to the external subscription tool.
//!
//! Executes one command at a time, blocking, and captures real exit
//! code, stdout and stderr without reinterpretation. Two invocation
//! styles exist: argv lists routed straight to the resolved binary,
//! and raw shell strings used for the `list` queries where the locale
//! must be pinned for parseable output.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::{Result, SubmanError};

/// How a command is handed to the operating system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationStyle {
    /// Ordered argument vector, first element is the binary path.
    Argv(Vec<String>),
    /// Raw shell string, run through `sh -c`.
    Shell(String),
}

/// One planned external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub style: InvocationStyle,
    /// When true, a non-zero exit code is an error that aborts the
    /// remaining plan. The `identity` probe runs with this off.
    pub check_rc: bool,
    /// Registration carries secrets that must never be interpreted as
    /// shell expansions; argv-style invocations never go through a
    /// shell, and this flag documents that the invocation must not be
    /// rerouted through one.
    pub expand_user_and_vars: bool,
    /// Extra environment for the child process.
    pub env: Vec<(String, String)>,
}

impl Invocation {
    pub fn argv<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            style: InvocationStyle::Argv(args.into_iter().map(Into::into).collect()),
            check_rc: true,
            expand_user_and_vars: false,
            env: Vec::new(),
        }
    }

    pub fn shell(command: impl Into<String>) -> Self {
        Self {
            style: InvocationStyle::Shell(command.into()),
            check_rc: true,
            expand_user_and_vars: false,
            env: Vec::new(),
        }
    }

    pub fn no_check_rc(mut self) -> Self {
        self.check_rc = false;
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    /// Subcommand name plus trailing flags, without the binary path.
    /// Used for logs and error messages; never includes credentials
    /// for the `register` case because only the leading token is kept
    /// there.
    pub fn subcommand(&self) -> String {
        match &self.style {
            InvocationStyle::Argv(args) => {
                args.get(1).cloned().unwrap_or_else(|| "<empty>".to_string())
            }
            InvocationStyle::Shell(line) => {
                let mut words = line.split_whitespace();
                let _bin = words.next();
                let rest: Vec<&str> = words.collect();
                if rest.is_empty() {
                    "<empty>".to_string()
                } else {
                    rest.join(" ")
                }
            }
        }
    }
}

/// Captured result of one external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub rc: i32,
    pub stdout: String,
    pub stderr: String,
}

/// The single seam the core talks through; tests script it.
pub trait CommandRunner {
    /// Execute and capture. `Err` only for spawn-level failures, not
    /// for non-zero exit codes.
    fn run(&mut self, invocation: &Invocation) -> Result<CommandOutput>;

    /// Execute, translating a non-zero exit code into an error when
    /// the invocation enforces its return code.
    fn run_enforced(&mut self, invocation: &Invocation) -> Result<CommandOutput> {
        let output = self.run(invocation)?;
        if invocation.check_rc && output.rc != 0 {
            return Err(SubmanError::ExternalTool {
                command: invocation.subcommand(),
                code: output.rc,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }
}

/// Real executor backed by `std::process::Command`.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&mut self, invocation: &Invocation) -> Result<CommandOutput> {
        let mut command = match &invocation.style {
            InvocationStyle::Argv(args) => {
                let (bin, rest) = args
                    .split_first()
                    .ok_or_else(|| SubmanError::Validation("empty argv".into()))?;
                let mut command = Command::new(bin);
                command.args(rest);
                command
            }
            InvocationStyle::Shell(line) => {
                let mut command = Command::new("sh");
                command.arg("-c").arg(line);
                command
            }
        };
        for (key, value) in &invocation.env {
            command.env(key, value);
        }

        debug!(subcommand = %invocation.subcommand(), "running external command");
        let output = command.output()?;
        let rc = output.status.code().unwrap_or(-1);
        debug!(subcommand = %invocation.subcommand(), rc, "external command finished");

        Ok(CommandOutput {
            rc,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Locate the external binary on PATH (plus the usual sbin
/// directories). A missing binary is a fatal configuration error.
pub fn resolve_binary(name: &str) -> Result<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        if candidate.is_file() {
            return Ok(candidate.to_path_buf());
        }
        return Err(SubmanError::BinaryNotFound(name.to_string()));
    }

    let path_var = std::env::var_os("PATH").unwrap_or_default();
    let sbin_dirs = ["/sbin", "/usr/sbin", "/usr/local/sbin"].map(PathBuf::from);
    for dir in std::env::split_paths(&path_var).chain(sbin_dirs) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(SubmanError::BinaryNotFound(name.to_string()))
}
