//! sea-orm entities of the record store tables.

pub mod transaction;
pub mod wallet;
