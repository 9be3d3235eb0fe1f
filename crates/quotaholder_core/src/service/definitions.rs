//! Resource, group and user definitions.
//!
//! # Responsibility
//! - Create global resources, groups and users as hierarchy nodes.
//! - Attach quota attributes to nodes, scoped to one global resource.
//!
//! # Invariants
//! - Every attribute is written through `create_attribute_for_node_and_resource`.
//! - Attribute keys are `<scope>_<attribute>_<relative resource name>`.
//! - `define_group_resource` never creates the group or the resource.

use super::hlapi::HighLevelApi;
use crate::error::{HlApiError, HlApiResult};
use crate::ledger::{QuotaLedger, SetQuotaRequest};
use crate::naming::{
    check_abs_name, check_name, make_abs_global_resource_name, make_abs_group_name,
    make_abs_user_name, make_rel_global_resource_name, reparent_child_name_under, GROUPS_NODE,
    RESOURCES_NODE,
};
use crate::node_keys::check_node_key;
use log::{error, info};

/// Per-member cap a group grants for one resource.
pub const DEF_PERUSER: &str = "def_peruser";
/// Cap for the group as a whole.
pub const DEF_PERGROUP: &str = "def_pergroup";
/// Live quota actually enforced for the group.
pub const OPERATIONAL: &str = "operational";

/// Which kind of node an attribute belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeScope {
    /// Attribute of a global resource node (`r`).
    Resource,
    /// Attribute of a group node (`g`).
    Group,
}

impl AttributeScope {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Resource => "r",
            Self::Group => "g",
        }
    }
}

/// Flat ledger resource name for `attribute` of `relative_resource`.
///
/// `attribute_key(AttributeScope::Group, "def_peruser", "pithos+")` is
/// `g_def_peruser_pithos+`.
pub fn attribute_key(scope: AttributeScope, attribute: &str, relative_resource: &str) -> String {
    format!("{}_{attribute}_{relative_resource}", scope.prefix())
}

/// Values written with one quota attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuotaLimits {
    pub quantity: i64,
    pub capacity: i64,
    pub import_limit: i64,
    pub export_limit: i64,
    pub flags: i64,
}

impl QuotaLimits {
    /// Capacity-only limits, as used for the `def_*` attributes.
    pub fn capacity_only(capacity: i64) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }
}

/// What a group provides to its members for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupResourceLimits {
    pub limit_per_group: i64,
    /// Negative means "inherit from the global resource"; no attribute is written.
    pub limit_per_user: i64,
    pub operational: QuotaLimits,
}

impl<L: QuotaLedger> HighLevelApi<L> {
    /// Defines a global resource under `system/resources`.
    ///
    /// Returns the absolute name actually used, which may differ from
    /// `resource_name` (`pithos+` becomes `system/resources/pithos+`).
    pub fn define_global_resource(&self, resource_name: &str) -> HlApiResult<String> {
        let abs_resource_name = make_abs_global_resource_name(resource_name)?;
        self.create_node(&abs_resource_name)
    }

    /// Defines attribute `r_<attribute>_<resource>` on a global resource.
    ///
    /// Returns the computed attribute name.
    pub fn define_attribute_of_global_resource(
        &self,
        global_resource_name: &str,
        attribute_name: &str,
        limits: QuotaLimits,
    ) -> HlApiResult<String> {
        self.create_attribute_for_node_and_resource(
            global_resource_name,
            RESOURCES_NODE,
            global_resource_name,
            AttributeScope::Resource,
            attribute_name,
            limits,
        )
    }

    /// Creates a group under `system/groups` and caches its key.
    ///
    /// The key is cached before creation so the ledger entity is created
    /// with it. Defining an existing group again succeeds. No resource is
    /// attached; use `define_group_resource`.
    pub fn define_group(
        &mut self,
        group_name: &str,
        group_node_key: Option<&str>,
    ) -> HlApiResult<String> {
        self.define_keyed_node(group_name, group_node_key, "group_node_key", NodeRoot::Groups)
    }

    /// Creates a user under `system/users` and caches its key.
    pub fn define_user(
        &mut self,
        user_name: &str,
        user_node_key: Option<&str>,
    ) -> HlApiResult<String> {
        self.define_keyed_node(user_name, user_node_key, "user_node_key", NodeRoot::Users)
    }

    /// Defines attribute `g_<attribute>_<resource>` on a group.
    pub fn define_attribute_of_group_for_resource(
        &self,
        group_name: &str,
        attribute_name: &str,
        resource_name: &str,
        limits: QuotaLimits,
    ) -> HlApiResult<String> {
        self.create_attribute_for_node_and_resource(
            group_name,
            GROUPS_NODE,
            resource_name,
            AttributeScope::Group,
            attribute_name,
            limits,
        )
    }

    /// Attaches a global resource to an existing group.
    ///
    /// Writes `def_peruser` (only when `limit_per_user >= 0`), `def_pergroup`
    /// and `operational`. Returns the computed attribute names in that order.
    ///
    /// # Errors
    /// - `MissingGlobalResource` / `MissingGroup` before anything is written.
    pub fn define_group_resource(
        &self,
        group_name: &str,
        resource_name: &str,
        limits: &GroupResourceLimits,
    ) -> HlApiResult<Vec<String>> {
        let abs_group_name = make_abs_group_name(group_name)?;
        let abs_resource_name = make_abs_global_resource_name(resource_name)?;

        if !self.has_global_resource(&abs_resource_name)? {
            return Err(HlApiError::MissingGlobalResource {
                resource: abs_resource_name,
                group: abs_group_name,
            });
        }
        if !self.has_node(&abs_group_name)? {
            return Err(HlApiError::MissingGroup {
                group: abs_group_name,
                resource: abs_resource_name,
            });
        }

        let mut defined = Vec::with_capacity(3);
        if limits.limit_per_user >= 0 {
            defined.push(self.define_attribute_of_group_for_resource(
                &abs_group_name,
                DEF_PERUSER,
                &abs_resource_name,
                QuotaLimits::capacity_only(limits.limit_per_user),
            )?);
        }
        defined.push(self.define_attribute_of_group_for_resource(
            &abs_group_name,
            DEF_PERGROUP,
            &abs_resource_name,
            QuotaLimits::capacity_only(limits.limit_per_group),
        )?);
        defined.push(self.define_attribute_of_group_for_resource(
            &abs_group_name,
            OPERATIONAL,
            &abs_resource_name,
            limits.operational,
        )?);
        Ok(defined)
    }

    fn define_keyed_node(
        &mut self,
        name: &str,
        node_key: Option<&str>,
        key_label: &'static str,
        root: NodeRoot,
    ) -> HlApiResult<String> {
        check_node_key(node_key.unwrap_or_default(), key_label)?;
        let abs_name = match root {
            NodeRoot::Groups => {
                self.ensure_groups_node()?;
                make_abs_group_name(name)?
            }
            NodeRoot::Users => {
                self.ensure_users_node()?;
                make_abs_user_name(name)?
            }
        };
        // `create_node` reads the new key from the cache.
        let previous = self.node_keys.replace(&abs_name, node_key, "abs_node_name")?;
        match self.create_node(&abs_name) {
            Ok(name) => Ok(name),
            Err(err) => {
                self.node_keys.restore(&abs_name, previous);
                error!(
                    "event=node_define module=definitions status=error node={abs_name} error={err}"
                );
                Err(err)
            }
        }
    }

    fn create_attribute_for_node_and_resource(
        &self,
        abs_or_not_node_name: &str,
        intended_parent_node_name: &str,
        resource_name: &str,
        scope: AttributeScope,
        attribute_name: &str,
        limits: QuotaLimits,
    ) -> HlApiResult<String> {
        check_abs_name(intended_parent_node_name, "intended_parent_node_name")?;
        check_name(attribute_name, "attribute_name")?;
        let parent = self.ensure_node(intended_parent_node_name)?;
        let node_name = reparent_child_name_under(
            abs_or_not_node_name,
            &parent,
            "abs_or_not_node_name",
            "intended_parent_node_name",
        )?;

        self.ensure_resources_node()?;
        let abs_resource_name = make_abs_global_resource_name(resource_name)?;
        self.ensure_node(&abs_resource_name)?;
        let relative_resource_name = make_rel_global_resource_name(resource_name, "resource_name")?;
        let computed_attribute_name = attribute_key(scope, attribute_name, &relative_resource_name);

        let request = SetQuotaRequest {
            entity: node_name.clone(),
            resource: computed_attribute_name.clone(),
            key: self.node_keys.get(&node_name)?.to_string(),
            quantity: limits.quantity,
            capacity: limits.capacity,
            import_limit: limits.import_limit,
            export_limit: limits.export_limit,
            flags: limits.flags,
        };
        let rejected = self.ledger.set_quota(&self.context, &[request])?;
        if !rejected.is_empty() {
            error!(
                "event=attribute_define module=definitions status=error node={node_name} attribute={computed_attribute_name}"
            );
            return Err(HlApiError::QuotaRejected {
                attribute: attribute_name.to_string(),
                computed_attribute: computed_attribute_name,
                node: node_name,
                resource: abs_resource_name,
            });
        }

        info!(
            "event=attribute_define module=definitions status=ok node={node_name} attribute={computed_attribute_name}"
        );
        Ok(computed_attribute_name)
    }
}

#[derive(Debug, Clone, Copy)]
enum NodeRoot {
    Groups,
    Users,
}
