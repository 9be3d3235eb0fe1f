//! High-level quota API over a `QuotaLedger`.
//!
//! # Responsibility
//! - Map nodes, resources, groups and users onto ledger entities.
//! - Map typed quota attributes onto flat ledger resource names.
//! - Drive the issue/accept commissioning protocol.
//!
//! # See also
//! - `ledger` for the primitives this layer depends on.

pub mod commission;
pub mod definitions;
pub mod hierarchy;
pub mod hlapi;
