//! LedgerLink Common Types
//!
//! This crate contains shared types used across the LedgerLink client core,
//! including identifiers, identities, proposal/endorsement types and the
//! error taxonomy.

pub mod identifiers;
pub mod identity;
pub mod transaction;
pub mod error;

pub use identifiers::*;
pub use identity::*;
pub use transaction::*;
pub use error::*;
