//! Construction-time configuration of the high-level API.
//!
//! # Responsibility
//! - Carry the initial keys of the four fixed root nodes.
//! - Carry the opaque ledger context.
//! - Resolve a ledger endpoint when no ledger instance is supplied.
//!
//! # Invariants
//! - Endpoint resolution prefers explicit config over the environment.
//! - `QH_URL` wins over `QH_HOST` + `QH_PORT`.

use crate::error::{HlApiError, HlApiResult};
use crate::ledger::LedgerContext;

pub const ENV_URL: &str = "QH_URL";
pub const ENV_HOST: &str = "QH_HOST";
pub const ENV_PORT: &str = "QH_PORT";

const QUOTAHOLDER_PATH: &str = "/api/quotaholder/v";

/// Where a remote quota ledger lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEndpoint {
    Url(String),
    HostPort { host: String, port: u16 },
}

impl LedgerEndpoint {
    /// Full URL handed to a ledger connector.
    pub fn url(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::HostPort { host, port } => format!("http://{host}:{port}{QUOTAHOLDER_PATH}"),
        }
    }

    /// Resolves an endpoint from `QH_*` variables served by `lookup`.
    ///
    /// Returns `Ok(None)` when neither form is present and an error when
    /// `QH_PORT` is not a port number.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> HlApiResult<Option<LedgerEndpoint>> {
        if let Some(url) = lookup(ENV_URL).filter(|value| !value.trim().is_empty()) {
            return Ok(Some(Self::Url(url)));
        }
        let (Some(host), Some(port)) = (lookup(ENV_HOST), lookup(ENV_PORT)) else {
            return Ok(None);
        };
        let port = port.trim().parse::<u16>().map_err(|_| {
            HlApiError::Configuration(format!("{ENV_PORT} is not a port number: `{port}`"))
        })?;
        Ok(Some(Self::HostPort { host, port }))
    }

    pub fn from_env() -> HlApiResult<Option<LedgerEndpoint>> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }
}

/// Options recognized by `HighLevelApi` construction.
#[derive(Debug, Clone, Default)]
pub struct HlApiConfig {
    pub system_key: Option<String>,
    pub resources_key: Option<String>,
    pub groups_key: Option<String>,
    pub users_key: Option<String>,
    /// Forwarded unchanged to every ledger call.
    pub context: LedgerContext,
    /// Used only when no ledger instance is supplied.
    pub endpoint: Option<LedgerEndpoint>,
}

impl HlApiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_key(mut self, key: impl Into<String>) -> Self {
        self.system_key = Some(key.into());
        self
    }

    pub fn with_resources_key(mut self, key: impl Into<String>) -> Self {
        self.resources_key = Some(key.into());
        self
    }

    pub fn with_groups_key(mut self, key: impl Into<String>) -> Self {
        self.groups_key = Some(key.into());
        self
    }

    pub fn with_users_key(mut self, key: impl Into<String>) -> Self {
        self.users_key = Some(key.into());
        self
    }

    pub fn with_context(mut self, context: LedgerContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_endpoint(mut self, endpoint: LedgerEndpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Explicit endpoint, else the one served by `lookup`.
    pub fn resolve_endpoint(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> HlApiResult<LedgerEndpoint> {
        if let Some(endpoint) = &self.endpoint {
            return Ok(endpoint.clone());
        }
        LedgerEndpoint::from_lookup(lookup)?.ok_or_else(|| {
            HlApiError::Configuration("no quota holder ledger endpoint specified".to_string())
        })
    }
}
