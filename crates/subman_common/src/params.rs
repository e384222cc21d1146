//! Input record for a single convergence run.
//!
//! Mirrors the parameter surface of the automation-framework module:
//! credentials, activation key, proxy settings and pool selections.
//! The record is immutable once built; `validate` is called before any
//! external command runs.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{Result, SubmanError};

/// Desired registration state of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    Present,
    Absent,
}

/// Pool selection, as accepted on the module boundary.
///
/// A bare pool id is a one-element list with implicit quantity 1; a
/// mapping carries explicit per-pool quantities.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PoolIds {
    One(String),
    Many(Vec<String>),
    Quantities(BTreeMap<String, u32>),
}

impl PoolIds {
    /// Normalized target set: (pool id, quantity), quantity defaulting
    /// to 1 where the input did not specify one.
    pub fn targets(&self) -> Vec<(String, u32)> {
        match self {
            PoolIds::One(id) => vec![(id.clone(), 1)],
            PoolIds::Many(ids) => ids.iter().map(|id| (id.clone(), 1)).collect(),
            PoolIds::Quantities(map) => map.iter().map(|(id, q)| (id.clone(), *q)).collect(),
        }
    }
}

/// Immutable input for one run.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationParams {
    pub state: DesiredState,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub activationkey: Option<String>,
    #[serde(default)]
    pub org_id: Option<String>,
    #[serde(default)]
    pub auto_attach: bool,
    #[serde(default)]
    pub force_register: bool,
    #[serde(default)]
    pub pool_ids: Option<PoolIds>,
    #[serde(default)]
    pub server_hostname: Option<String>,
    #[serde(default)]
    pub server_proxy_hostname: Option<String>,
    #[serde(default)]
    pub server_proxy_port: Option<String>,
    #[serde(default)]
    pub server_proxy_user: Option<String>,
    #[serde(default)]
    pub server_proxy_password: Option<String>,
}

impl RegistrationParams {
    /// Minimal record for a given desired state, everything else unset.
    pub fn new(state: DesiredState) -> Self {
        Self {
            state,
            username: None,
            password: None,
            activationkey: None,
            org_id: None,
            auto_attach: false,
            force_register: false,
            pool_ids: None,
            server_hostname: None,
            server_proxy_hostname: None,
            server_proxy_port: None,
            server_proxy_user: None,
            server_proxy_password: None,
        }
    }

    /// Check required parameter combinations.
    ///
    /// The activation-key path and the username/password path are
    /// mutually exclusive; an activation key requires an organization.
    pub fn validate(&self) -> Result<()> {
        if self.activationkey.is_some() && (self.username.is_some() || self.password.is_some()) {
            return Err(SubmanError::Validation(
                "activationkey is mutually exclusive with username/password".into(),
            ));
        }
        if self.activationkey.is_some() && self.org_id.is_none() {
            return Err(SubmanError::Validation(
                "activationkey requires org_id".into(),
            ));
        }
        if self.state == DesiredState::Present {
            let has_credentials = self.username.is_some() && self.password.is_some();
            if !has_credentials && self.activationkey.is_none() {
                return Err(SubmanError::Validation(
                    "state=present requires either username and password, or activationkey".into(),
                ));
            }
        }
        Ok(())
    }

    /// Target pool set, empty when no explicit selection was given.
    pub fn pool_targets(&self) -> Vec<(String, u32)> {
        self.pool_ids.as_ref().map(PoolIds::targets).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn present_with_credentials_is_valid() {
        let mut params = RegistrationParams::new(DesiredState::Present);
        params.username = Some("admin".into());
        params.password = Some("admin".into());
        assert!(params.validate().is_ok());
    }

    #[test]
    fn present_without_credentials_is_rejected() {
        let params = RegistrationParams::new(DesiredState::Present);
        let err = params.validate().unwrap_err();
        assert!(err.to_string().contains("username and password"));
    }

    #[test]
    fn activationkey_requires_org_id() {
        let mut params = RegistrationParams::new(DesiredState::Present);
        params.activationkey = Some("K".into());
        let err = params.validate().unwrap_err();
        assert!(err.to_string().contains("org_id"));

        params.org_id = Some("admin".into());
        assert!(params.validate().is_ok());
    }

    #[test]
    fn activationkey_excludes_username() {
        let mut params = RegistrationParams::new(DesiredState::Present);
        params.activationkey = Some("K".into());
        params.org_id = Some("admin".into());
        params.username = Some("admin".into());
        let err = params.validate().unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn absent_needs_no_credentials() {
        let params = RegistrationParams::new(DesiredState::Absent);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn pool_quantity_defaults_to_one() {
        let one = PoolIds::One("P1".into());
        assert_eq!(one.targets(), vec![("P1".to_string(), 1)]);

        let many = PoolIds::Many(vec!["P1".into(), "P2".into()]);
        assert_eq!(
            many.targets(),
            vec![("P1".to_string(), 1), ("P2".to_string(), 1)]
        );
    }

    #[test]
    fn pool_mapping_carries_quantities() {
        let mut map = BTreeMap::new();
        map.insert("P1".to_string(), 4);
        let quantities = PoolIds::Quantities(map);
        assert_eq!(quantities.targets(), vec![("P1".to_string(), 4)]);
    }

    #[test]
    fn params_file_forms_deserialize() {
        let bare: RegistrationParams = serde_json::from_str(
            r#"{"state": "present", "activationkey": "K", "org_id": "admin", "pool_ids": "P1"}"#,
        )
        .unwrap();
        assert_eq!(bare.pool_targets(), vec![("P1".to_string(), 1)]);

        let listed: RegistrationParams = serde_json::from_str(
            r#"{"state": "present", "username": "u", "password": "p", "pool_ids": ["P1", "P2"]}"#,
        )
        .unwrap();
        assert_eq!(listed.pool_targets().len(), 2);

        let mapped: RegistrationParams = serde_json::from_str(
            r#"{"state": "present", "username": "u", "password": "p", "pool_ids": {"P1": 3}}"#,
        )
        .unwrap();
        assert_eq!(mapped.pool_targets(), vec![("P1".to_string(), 3)]);
    }
}
