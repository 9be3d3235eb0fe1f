//! Node hierarchy management.
//!
//! # Responsibility
//! - Answer whether a node exists in the ledger.
//! - Create nodes together with every missing ancestor.
//!
//! # Invariants
//! - `system` is never created; it exists by construction of the ledger.
//! - Ancestors are created before descendants.
//! - Each ancestor's key must already be cached for creation to succeed.

use super::hlapi::HighLevelApi;
use crate::error::{HlApiError, HlApiResult};
use crate::ledger::{CreateEntityRequest, EntityKeyRequest, QuotaLedger};
use crate::naming::{
    check_abs_global_resource_name, check_abs_name, is_system_node, parent_abs_name_of,
    GROUPS_NODE, RESOURCES_NODE, SYSTEM_NODE, USERS_NODE,
};
use log::{error, info};

impl<L: QuotaLedger> HighLevelApi<L> {
    /// Returns whether exactly one owner is recorded for `abs_node_name`.
    ///
    /// The lookup uses the cached key, so a node whose key is unknown reads
    /// as missing.
    pub fn has_node(&self, abs_node_name: &str) -> HlApiResult<bool> {
        check_abs_name(abs_node_name, "abs_node_name")?;
        let request = EntityKeyRequest {
            entity: abs_node_name.to_string(),
            key: self.node_keys.get(abs_node_name)?.to_string(),
        };
        let owners = self.ledger.get_entity(&self.context, &[request])?;
        match owners.len() {
            0 => Ok(false),
            1 => Ok(true),
            owners => Err(HlApiError::AmbiguousNode {
                node: abs_node_name.to_string(),
                owners,
            }),
        }
    }

    /// Creates `node_name` and any missing ancestors, top-down.
    ///
    /// The missing chain is collected first so nothing is created unless
    /// every ancestor name is valid. Returns the absolute name.
    pub fn create_node(&self, node_name: &str) -> HlApiResult<String> {
        check_abs_name(node_name, "node_name")?;
        if is_system_node(node_name) {
            return Ok(node_name.to_string());
        }

        let mut missing = Vec::new();
        let mut cursor = parent_abs_name_of(node_name, "node_name")?;
        while !is_system_node(cursor) && !self.has_node(cursor)? {
            missing.push(cursor);
            cursor = parent_abs_name_of(cursor, "node_name")?;
        }

        for ancestor in missing.iter().rev() {
            self.create_entity_for_node(ancestor)?;
        }
        self.create_entity_for_node(node_name)?;
        Ok(node_name.to_string())
    }

    /// Creates `abs_node_name` only if it does not exist yet.
    pub fn ensure_node(&self, abs_node_name: &str) -> HlApiResult<String> {
        if self.has_node(abs_node_name)? {
            Ok(abs_node_name.to_string())
        } else {
            self.create_node(abs_node_name)
        }
    }

    /// Ensures `system/resources` exists.
    pub fn ensure_resources_node(&self) -> HlApiResult<String> {
        self.ensure_node(RESOURCES_NODE)
    }

    /// Ensures `system/groups` exists.
    pub fn ensure_groups_node(&self) -> HlApiResult<String> {
        self.ensure_node(GROUPS_NODE)
    }

    /// Ensures `system/users` exists.
    pub fn ensure_users_node(&self) -> HlApiResult<String> {
        self.ensure_node(USERS_NODE)
    }

    /// Direct and indirect children of `node_name` visible with its key.
    pub fn get_node_children(&self, node_name: &str) -> HlApiResult<Vec<String>> {
        check_abs_name(node_name, "node_name")?;
        let key = self.node_keys.get(node_name)?;
        let prefix = format!("{node_name}/");
        let children = self
            .ledger
            .list_entities(&self.context, node_name, key)?
            .into_iter()
            .filter(|child| child.starts_with(&prefix))
            .collect();
        Ok(children)
    }

    pub fn get_toplevel_nodes(&self) -> HlApiResult<Vec<String>> {
        self.get_node_children(SYSTEM_NODE)
    }

    pub fn get_global_resources(&self) -> HlApiResult<Vec<String>> {
        self.ensure_resources_node()?;
        self.get_node_children(RESOURCES_NODE)
    }

    pub fn get_groups(&self) -> HlApiResult<Vec<String>> {
        self.ensure_groups_node()?;
        self.get_node_children(GROUPS_NODE)
    }

    pub fn get_users(&self) -> HlApiResult<Vec<String>> {
        self.ensure_users_node()?;
        self.get_node_children(USERS_NODE)
    }

    pub fn has_global_resource(&self, abs_resource_name: &str) -> HlApiResult<bool> {
        check_abs_global_resource_name(abs_resource_name)?;
        self.has_node(abs_resource_name)
    }

    fn create_entity_for_node(&self, node_name: &str) -> HlApiResult<()> {
        let parent = parent_abs_name_of(node_name, "node_name")?;
        let request = CreateEntityRequest {
            entity: node_name.to_string(),
            owner: parent.to_string(),
            key: self.node_keys.get(node_name)?.to_string(),
            owner_key: self.node_keys.get(parent)?.to_string(),
        };
        let rejected = self.ledger.create_entity(&self.context, &[request])?;
        if rejected.is_empty() {
            info!("event=node_create module=hierarchy status=ok node={node_name}");
            return Ok(());
        }

        // Rejections carry no reason; a node that exists now was created by
        // someone else and counts as success.
        if self.has_node(node_name)? {
            info!("event=node_create module=hierarchy status=ok node={node_name} existing=true");
            return Ok(());
        }
        error!("event=node_create module=hierarchy status=error node={node_name} parent={parent}");
        Err(HlApiError::NodeCreation {
            node: node_name.to_string(),
            parent: parent.to_string(),
        })
    }
}
