pub use account::*;
pub use batch::*;
pub use block_feed::*;
pub use outcome::*;
pub use record::*;
pub use transfer::*;

mod account;
mod batch;
mod block_feed;
mod outcome;
mod record;
mod transfer;
