//! Process-local cache of node authorization keys.
//!
//! # Responsibility
//! - Remember the key needed to mutate each node.
//! - Fall back to the empty key when nothing is cached.
//!
//! # Invariants
//! - The ledger stays the authority; a cached key may be stale.
//! - Snapshots are copies; callers cannot mutate the cache through them.

use crate::error::{HlApiError, HlApiResult};
use crate::naming::check_abs_name;
use std::collections::BTreeMap;

const MAX_NODE_KEY_CHARS: usize = 256;

/// Checks the key alphabet: printable ASCII without whitespace.
///
/// The empty key is valid and means "no key enforced".
pub fn check_node_key(key: &str, label: &'static str) -> HlApiResult<()> {
    let well_formed = key.len() <= MAX_NODE_KEY_CHARS && key.bytes().all(|b| b.is_ascii_graphic());
    if well_formed {
        Ok(())
    } else {
        Err(HlApiError::InvalidKey { label })
    }
}

/// Mapping from absolute node name to authorization key.
#[derive(Debug, Clone, Default)]
pub struct NodeKeyCache {
    keys: BTreeMap<String, String>,
}

impl NodeKeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached key, or `""` when none is cached.
    pub fn get(&self, node: &str) -> HlApiResult<&str> {
        check_abs_name(node, "node_name")?;
        Ok(self.keys.get(node).map_or("", String::as_str))
    }

    /// Stores `key` for `node`; `None` stores the empty key.
    pub fn set(&mut self, node: &str, key: Option<&str>, label: &'static str) -> HlApiResult<()> {
        self.replace(node, key, label).map(|_| ())
    }

    /// Like `set`, returning the entry it displaced.
    pub fn replace(
        &mut self,
        node: &str,
        key: Option<&str>,
        label: &'static str,
    ) -> HlApiResult<Option<String>> {
        check_abs_name(node, label)?;
        let key = key.unwrap_or_default();
        check_node_key(key, "node_key")?;
        Ok(self.keys.insert(node.to_string(), key.to_string()))
    }

    /// Puts back an entry returned by `replace`; `None` forgets `node`.
    pub fn restore(&mut self, node: &str, previous: Option<String>) {
        match previous {
            Some(key) => {
                self.keys.insert(node.to_string(), key);
            }
            None => {
                self.keys.remove(node);
            }
        }
    }

    /// Picks `explicit` when non-empty, otherwise the cached key of `node`.
    ///
    /// `node` is validated either way.
    pub fn resolve(&self, node: &str, explicit: &str) -> HlApiResult<String> {
        check_abs_name(node, "entity")?;
        if explicit.is_empty() {
            self.get(node).map(str::to_string)
        } else {
            check_node_key(explicit, "key")?;
            Ok(explicit.to_string())
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.keys.clone()
    }
}
