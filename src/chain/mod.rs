//! Transaction model and broadcaster extraction
//!
//! Pure data types and functions over transaction contents. Nothing
//! here touches the ledger or the network.

pub mod broadcaster;
pub mod transaction;

pub use broadcaster::extract_broadcaster;
pub use transaction::{Operation, Transaction};
