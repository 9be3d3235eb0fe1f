//! Value objects exchanged with the quota ledger.
//!
//! # Invariants
//! - Values are plain data; the ledger owns the durable state they describe.

pub mod quota;
