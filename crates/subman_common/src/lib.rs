//! Idempotent host registration against a subscription management
//! service, wrapping the `subscription-manager` CLI.
//!
//! The crate splits into a pure decision core and thin collaborators:
//! - `params`: validated input record describing the desired state
//! - `inspect`: classifies the host as registered or not
//! - `pools`: tolerant parser for `list --available` / `list --consumed`
//! - `plan`: the state machine producing the minimal command sequence
//! - `runner`: the process boundary (real or scripted in tests)
//! - `orchestrate`: wires the above together for a single run

pub mod error;
pub mod inspect;
pub mod orchestrate;
pub mod params;
pub mod plan;
pub mod pools;
pub mod runner;

pub use error::{Result, SubmanError};
pub use orchestrate::{converge, Convergence, RunnerConfig};
pub use params::{DesiredState, RegistrationParams};
