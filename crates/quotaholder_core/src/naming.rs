//! Absolute node naming rules.
//!
//! # Responsibility
//! - Validate absolute and relative node names against the fixed roots.
//! - Normalize resource, group and user names in both directions.
//!
//! # Invariants
//! - Every absolute name starts with the `system` segment.
//! - Every segment matches the identifier grammar (`SEGMENT_RE`).
//! - Resources, groups and users are direct children of their root.

use crate::error::{invalid_name, HlApiResult};
use once_cell::sync::Lazy;
use regex::Regex;

/// Root of every node hierarchy. Always exists in the ledger.
pub const SYSTEM_NODE: &str = "system";
/// Parent of all global resources.
pub const RESOURCES_NODE: &str = "system/resources";
/// Parent of all groups.
pub const GROUPS_NODE: &str = "system/groups";
/// Parent of all users.
pub const USERS_NODE: &str = "system/users";

static SEGMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.+@-]*$").expect("valid segment regex"));

/// Checks that `name` is one legal segment (no `/`).
pub fn check_name(name: &str, label: &'static str) -> HlApiResult<()> {
    if SEGMENT_RE.is_match(name) {
        Ok(())
    } else {
        Err(invalid_name(label, name))
    }
}

/// Checks that `name` is rooted at `system` and every segment is legal.
pub fn check_abs_name(name: &str, label: &'static str) -> HlApiResult<()> {
    let mut segments = name.split('/');
    if segments.next() != Some(SYSTEM_NODE) {
        return Err(invalid_name(label, name));
    }
    if !segments.all(|segment| SEGMENT_RE.is_match(segment)) {
        return Err(invalid_name(label, name));
    }
    Ok(())
}

/// Returns whether `name` is spelled in absolute form.
///
/// This is a syntactic test only; use `check_abs_name` to validate.
pub fn is_abs_name(name: &str) -> bool {
    name == SYSTEM_NODE || name.starts_with("system/")
}

/// Whether `name` is a path below `system`.
///
/// The bare segment `system` is a legal relative name for a group, user or
/// resource, so the reparenting helpers use this test instead of `is_abs_name`.
fn is_nested_abs_name(name: &str) -> bool {
    name.starts_with("system/")
}

pub fn is_system_node(name: &str) -> bool {
    name == SYSTEM_NODE
}

/// Hierarchy level: `system` is 0, `system/groups` is 1 and so on.
pub fn level_of_node(name: &str) -> usize {
    name.matches('/').count()
}

/// Strips the last segment of an absolute name.
///
/// Fails on `system`, which has no parent.
pub fn parent_abs_name_of<'a>(name: &'a str, label: &'static str) -> HlApiResult<&'a str> {
    check_abs_name(name, label)?;
    name.rsplit_once('/')
        .map(|(parent, _)| parent)
        .ok_or_else(|| invalid_name(label, name))
}

/// Returns the single segment `x` when `name == parent/x`.
pub fn relative_child_name_under<'a>(name: &'a str, parent: &str) -> Option<&'a str> {
    name.strip_prefix(parent)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|segment| SEGMENT_RE.is_match(segment))
}

/// Places `child` directly under `parent`.
///
/// A relative child must be one segment and is joined as `parent/child`.
/// An absolute child is accepted only if it already is `parent/<segment>`;
/// deeper or foreign names are rejected, never silently moved.
pub fn reparent_child_name_under(
    child: &str,
    parent: &str,
    child_label: &'static str,
    parent_label: &'static str,
) -> HlApiResult<String> {
    check_abs_name(parent, parent_label)?;
    if is_nested_abs_name(child) {
        check_abs_name(child, child_label)?;
        relative_child_name_under(child, parent)
            .map(|_| child.to_string())
            .ok_or_else(|| invalid_name(child_label, child))
    } else {
        check_name(child, child_label)?;
        Ok(format!("{parent}/{child}"))
    }
}

fn make_rel_name_under(name: &str, root: &str, label: &'static str) -> HlApiResult<String> {
    if is_nested_abs_name(name) {
        check_abs_name(name, label)?;
        relative_child_name_under(name, root)
            .map(str::to_string)
            .ok_or_else(|| invalid_name(label, name))
    } else {
        check_name(name, label)?;
        Ok(name.to_string())
    }
}

/// `pithos+` and `system/resources/pithos+` both give `system/resources/pithos+`.
pub fn make_abs_global_resource_name(name: &str) -> HlApiResult<String> {
    reparent_child_name_under(name, RESOURCES_NODE, "resource_name", "RESOURCES_NODE")
}

/// Inverse of `make_abs_global_resource_name`.
pub fn make_rel_global_resource_name(name: &str, label: &'static str) -> HlApiResult<String> {
    make_rel_name_under(name, RESOURCES_NODE, label)
}

pub fn check_abs_global_resource_name(name: &str) -> HlApiResult<()> {
    check_abs_name(name, "abs_resource_name")?;
    relative_child_name_under(name, RESOURCES_NODE)
        .map(|_| ())
        .ok_or_else(|| invalid_name("abs_resource_name", name))
}

pub fn make_abs_group_name(name: &str) -> HlApiResult<String> {
    reparent_child_name_under(name, GROUPS_NODE, "group_name", "GROUPS_NODE")
}

pub fn make_rel_group_name(name: &str, label: &'static str) -> HlApiResult<String> {
    make_rel_name_under(name, GROUPS_NODE, label)
}

pub fn make_abs_user_name(name: &str) -> HlApiResult<String> {
    reparent_child_name_under(name, USERS_NODE, "user_name", "USERS_NODE")
}

pub fn make_rel_user_name(name: &str, label: &'static str) -> HlApiResult<String> {
    make_rel_name_under(name, USERS_NODE, label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HlApiError;

    #[test]
    fn check_abs_name_requires_system_root_and_legal_segments() {
        assert!(check_abs_name("system", "n").is_ok());
        assert!(check_abs_name("system/groups/dev-team", "n").is_ok());
        assert!(check_abs_name("system/users/alice@example.org", "n").is_ok());
        assert!(check_abs_name("groups/dev", "n").is_err());
        assert!(check_abs_name("system//dev", "n").is_err());
        assert!(check_abs_name("system/groups/", "n").is_err());
        assert!(check_abs_name("system/gr oups", "n").is_err());
        assert!(check_abs_name("", "n").is_err());
    }

    #[test]
    fn invalid_name_carries_label_and_value() {
        let err = check_abs_name("nope/x", "node_name").unwrap_err();
        match err {
            HlApiError::InvalidName { label, value } => {
                assert_eq!(label, "node_name");
                assert_eq!(value, "nope/x");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn resource_names_round_trip() {
        for name in ["pithos+", "cyclades.vm", "cpu", "disk_gb"] {
            let abs = make_abs_global_resource_name(name).unwrap();
            assert_eq!(abs, format!("system/resources/{name}"));
            assert_eq!(make_abs_global_resource_name(&abs).unwrap(), abs);
            assert_eq!(make_rel_global_resource_name(&abs, "r").unwrap(), name);
        }
    }

    #[test]
    fn make_abs_rejects_names_under_other_roots() {
        assert!(make_abs_global_resource_name("system/groups/g1").is_err());
        assert!(make_abs_global_resource_name("system/resources").is_err());
        assert!(make_abs_group_name("system/users/alice").is_err());
        assert!(make_rel_group_name("system/resources/cpu", "g").is_err());
        assert!(make_rel_user_name("system/groups/g1", "u").is_err());
    }

    #[test]
    fn group_and_user_names_normalize_both_ways() {
        assert_eq!(make_abs_group_name("g1").unwrap(), "system/groups/g1");
        assert_eq!(make_rel_group_name("system/groups/g1", "g").unwrap(), "g1");
        assert_eq!(make_abs_user_name("alice").unwrap(), "system/users/alice");
        assert_eq!(make_rel_user_name("alice", "u").unwrap(), "alice");
    }

    #[test]
    fn reparent_accepts_only_direct_children() {
        assert_eq!(
            reparent_child_name_under("g1", GROUPS_NODE, "c", "p").unwrap(),
            "system/groups/g1"
        );
        assert_eq!(
            reparent_child_name_under("system/groups/g1", GROUPS_NODE, "c", "p").unwrap(),
            "system/groups/g1"
        );
        assert!(reparent_child_name_under("system/groups/g1/x", GROUPS_NODE, "c", "p").is_err());
        assert!(reparent_child_name_under("system/users/g1", GROUPS_NODE, "c", "p").is_err());
        assert!(reparent_child_name_under("a/b", GROUPS_NODE, "c", "p").is_err());
        assert!(reparent_child_name_under("g1", "groups", "c", "p").is_err());
    }

    #[test]
    fn child_literally_named_system_is_relative() {
        assert_eq!(make_abs_group_name("system").unwrap(), "system/groups/system");
        assert_eq!(make_abs_user_name("system").unwrap(), "system/users/system");
        assert_eq!(
            make_abs_global_resource_name("system").unwrap(),
            "system/resources/system"
        );
        assert_eq!(make_rel_group_name("system", "g").unwrap(), "system");
        assert_eq!(
            make_rel_global_resource_name("system/resources/system", "r").unwrap(),
            "system"
        );
        assert!(is_abs_name(SYSTEM_NODE));
    }

    #[test]
    fn parent_of_system_fails() {
        assert_eq!(parent_abs_name_of("system/groups/g1", "n").unwrap(), GROUPS_NODE);
        assert_eq!(parent_abs_name_of(GROUPS_NODE, "n").unwrap(), SYSTEM_NODE);
        assert!(parent_abs_name_of(SYSTEM_NODE, "n").is_err());
    }

    #[test]
    fn level_counts_depth_below_system() {
        assert_eq!(level_of_node(SYSTEM_NODE), 0);
        assert_eq!(level_of_node(RESOURCES_NODE), 1);
        assert_eq!(level_of_node("system/resources/cpu"), 2);
    }

    #[test]
    fn check_abs_global_resource_name_rejects_roots() {
        assert!(check_abs_global_resource_name("system/resources/cpu").is_ok());
        assert!(check_abs_global_resource_name(RESOURCES_NODE).is_err());
        assert!(check_abs_global_resource_name("system/groups/cpu").is_err());
    }
}
