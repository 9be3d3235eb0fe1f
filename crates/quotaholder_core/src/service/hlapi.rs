//! `HighLevelApi` construction and node key cache access.
//!
//! # Invariants
//! - The four root nodes always have a cached key (possibly empty).
//! - The ledger context is fixed at construction and forwarded verbatim.

use crate::config::{HlApiConfig, LedgerEndpoint};
use crate::error::HlApiResult;
use crate::ledger::{LedgerContext, LedgerResult, QuotaLedger};
use crate::naming::{GROUPS_NODE, RESOURCES_NODE, SYSTEM_NODE, USERS_NODE};
use crate::node_keys::{check_node_key, NodeKeyCache};
use log::info;
use std::collections::BTreeMap;

/// Resource, group and user definitions on top of a quota ledger.
///
/// A node is a ledger entity with an absolute name. `system` always exists;
/// `system/resources`, `system/groups` and `system/users` are created on
/// demand and parent every resource, group and user respectively.
pub struct HighLevelApi<L: QuotaLedger> {
    pub(crate) ledger: L,
    pub(crate) context: LedgerContext,
    pub(crate) node_keys: NodeKeyCache,
}

impl<L: QuotaLedger> HighLevelApi<L> {
    /// Wraps an existing ledger client.
    ///
    /// Root keys missing from `config` default to the empty key.
    pub fn new(ledger: L, config: HlApiConfig) -> HlApiResult<Self> {
        let roots = [
            (SYSTEM_NODE, config.system_key, "system_key"),
            (RESOURCES_NODE, config.resources_key, "resources_key"),
            (GROUPS_NODE, config.groups_key, "groups_key"),
            (USERS_NODE, config.users_key, "users_key"),
        ];
        let mut node_keys = NodeKeyCache::new();
        for (node, key, label) in roots {
            check_node_key(key.as_deref().unwrap_or_default(), label)?;
            node_keys.set(node, key.as_deref(), label)?;
        }

        Ok(Self {
            ledger,
            context: config.context,
            node_keys,
        })
    }

    /// Builds the ledger client from the configured or environment endpoint.
    ///
    /// # Errors
    /// - `Configuration` when no endpoint can be resolved.
    /// - `Ledger` when `connector` fails.
    pub fn connect(
        config: HlApiConfig,
        connector: impl FnOnce(&LedgerEndpoint) -> LedgerResult<L>,
    ) -> HlApiResult<Self> {
        let endpoint = config.resolve_endpoint(|name| std::env::var(name).ok())?;
        info!(
            "event=ledger_connect module=hlapi status=start url={}",
            endpoint.url()
        );
        let ledger = connector(&endpoint)?;
        Self::new(ledger, config)
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn context(&self) -> &LedgerContext {
        &self.context
    }

    /// Cached key of `node_name`, or `""` when none is cached.
    pub fn get_cached_node_key(&self, node_name: &str) -> HlApiResult<String> {
        self.node_keys.get(node_name).map(str::to_string)
    }

    pub fn set_cached_node_key(
        &mut self,
        abs_node_name: &str,
        node_key: Option<&str>,
    ) -> HlApiResult<()> {
        self.node_keys.set(abs_node_name, node_key, "abs_node_name")
    }

    /// Copy of the key cache.
    pub fn node_keys(&self) -> BTreeMap<String, String> {
        self.node_keys.snapshot()
    }
}
