//! Commissioning and raw ledger primitives.
//!
//! # Responsibility
//! - Expose ledger primitives keyed through the node key cache.
//! - Transfer quota in one call by issuing and accepting a commission.
//!
//! # Invariants
//! - An empty key argument means "use the cached key of that entity".
//! - Entity names are validated before any ledger call.
//! - A failed issue never reaches accept.
//! - A failed accept is reported as is; the issued commission stays
//!   pending on the ledger and is not rolled back here.

use super::definitions::QuotaLimits;
use super::hlapi::HighLevelApi;
use crate::error::{HlApiError, HlApiResult};
use crate::ledger::{
    CommissionSerial, CreateEntityRequest, EntityKeyRequest, GetQuotaRequest,
    IssueCommissionRequest, Provision, QuotaLedger, SetQuotaRequest,
};
use crate::model::quota::Quota;
use crate::naming::check_abs_name;
use log::{error, info};

/// One-provision transfer from `source_entity` to `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneCommission {
    pub target: String,
    pub target_key: String,
    pub client_key: String,
    pub owner: String,
    pub owner_key: String,
    pub source_entity: String,
    pub source_resource: String,
    pub quantity: i64,
}

impl<L: QuotaLedger> HighLevelApi<L> {
    pub fn qh_list_entities(&self, entity: &str, key: &str) -> HlApiResult<Vec<String>> {
        let key = self.resolve_key(entity, key)?;
        Ok(self.ledger.list_entities(&self.context, entity, &key)?)
    }

    pub fn qh_list_resources(&self, entity: &str, key: &str) -> HlApiResult<Vec<String>> {
        let key = self.resolve_key(entity, key)?;
        Ok(self.ledger.list_resources(&self.context, entity, &key)?)
    }

    /// Reads one quota row; an absent row gives `Quota::unknown()`.
    pub fn qh_get_quota(&self, entity: &str, resource: &str, key: &str) -> HlApiResult<Quota> {
        let request = GetQuotaRequest {
            entity: entity.to_string(),
            resource: resource.to_string(),
            key: self.resolve_key(entity, key)?,
        };
        let quota = self
            .ledger
            .get_quota(&self.context, &[request])?
            .into_iter()
            .next()
            .map_or_else(Quota::unknown, Quota::from_tuple);
        Ok(quota)
    }

    /// Writes one quota row and returns the values that were set.
    ///
    /// Ledger counters are not known after a write and stay unset.
    pub fn qh_set_quota(
        &self,
        entity: &str,
        resource: &str,
        key: &str,
        limits: QuotaLimits,
    ) -> HlApiResult<Quota> {
        let request = SetQuotaRequest {
            entity: entity.to_string(),
            resource: resource.to_string(),
            key: self.resolve_key(entity, key)?,
            quantity: limits.quantity,
            capacity: limits.capacity,
            import_limit: limits.import_limit,
            export_limit: limits.export_limit,
            flags: limits.flags,
        };
        let rejected = self.ledger.set_quota(&self.context, &[request])?;
        if !rejected.is_empty() {
            return Err(HlApiError::QuotaRejected {
                attribute: resource.to_string(),
                computed_attribute: resource.to_string(),
                node: entity.to_string(),
                resource: resource.to_string(),
            });
        }
        Ok(Quota {
            entity: Some(entity.to_string()),
            resource: Some(resource.to_string()),
            quantity: Some(limits.quantity),
            capacity: Some(limits.capacity),
            import_limit: Some(limits.import_limit),
            export_limit: Some(limits.export_limit),
            flags: limits.flags,
            ..Quota::default()
        })
    }

    /// Creates `entity` under `owner` without touching the hierarchy.
    pub fn qh_create_entity(
        &self,
        entity: &str,
        owner: &str,
        key: &str,
        owner_key: &str,
    ) -> HlApiResult<String> {
        let request = CreateEntityRequest {
            entity: entity.to_string(),
            owner: owner.to_string(),
            key: self.resolve_key(entity, key)?,
            owner_key: self.resolve_key(owner, owner_key)?,
        };
        let rejected = self.ledger.create_entity(&self.context, &[request])?;
        if !rejected.is_empty() {
            return Err(HlApiError::NodeCreation {
                node: entity.to_string(),
                parent: owner.to_string(),
            });
        }
        Ok(entity.to_string())
    }

    /// Owner of `entity`, or `None` when not found with that key.
    pub fn qh_get_entity(&self, entity: &str, key: &str) -> HlApiResult<Option<String>> {
        let request = EntityKeyRequest {
            entity: entity.to_string(),
            key: self.resolve_key(entity, key)?,
        };
        let owners = self.ledger.get_entity(&self.context, &[request])?;
        Ok(owners.into_iter().next())
    }

    pub fn qh_release_entity(&self, entity: &str, key: &str) -> HlApiResult<()> {
        let request = EntityKeyRequest {
            entity: entity.to_string(),
            key: self.resolve_key(entity, key)?,
        };
        let rejected = self.ledger.release_entity(&self.context, &[request])?;
        if !rejected.is_empty() {
            return Err(HlApiError::EntityRelease {
                entity: entity.to_string(),
            });
        }
        info!("event=entity_release module=commission status=ok entity={entity}");
        Ok(())
    }

    /// Issues a one-provision commission and accepts it immediately.
    ///
    /// Not idempotent: every call issues a new transaction. Returns the
    /// serial of the accepted commission.
    pub fn make_one_commission(&self, order: &OneCommission) -> HlApiResult<CommissionSerial> {
        check_abs_name(&order.target, "target_entity")?;
        check_abs_name(&order.owner, "owner")?;
        check_abs_name(&order.source_entity, "source_entity")?;
        let request = IssueCommissionRequest {
            target: order.target.clone(),
            key: order.target_key.clone(),
            client_key: order.client_key.clone(),
            owner: order.owner.clone(),
            owner_key: order.owner_key.clone(),
            provisions: vec![Provision {
                entity: order.source_entity.clone(),
                resource: order.source_resource.clone(),
                quantity: order.quantity,
            }],
        };
        let serial = self.ledger.issue_commission(&self.context, &request)?;
        info!(
            "event=commission_issue module=commission status=ok serial={serial} target={} source={} resource={} quantity={}",
            order.target, order.source_entity, order.source_resource, order.quantity
        );

        if let Err(err) = self
            .ledger
            .accept_commission(&self.context, &order.client_key, &[serial])
        {
            error!(
                "event=commission_accept module=commission status=error serial={serial} pending=true error={err}"
            );
            return Err(err.into());
        }
        info!("event=commission_accept module=commission status=ok serial={serial}");
        Ok(serial)
    }

    fn resolve_key(&self, entity: &str, key: &str) -> HlApiResult<String> {
        self.node_keys.resolve(entity, key)
    }
}
