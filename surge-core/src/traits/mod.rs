pub use ledger::*;
pub use store::*;

mod ledger;
mod store;
