//! Ratewatch Common Types
//!
//! Shared data model for the rate service: reference currencies, symbols,
//! rate records and snapshots.

pub mod reference;
pub mod record;

pub use reference::*;
pub use record::*;
