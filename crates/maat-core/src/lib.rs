//! MA'AT Core - canonical records, content hashing, append-only ledgers

pub mod canonical;
pub mod error;
pub mod ledger;
pub mod records;
pub mod ring;
pub mod stamp;
pub mod types;

pub use error::{Error, Result};
pub use ledger::Ledger;
pub use records::*;
pub use ring::RingBuffer;
pub use stamp::{Clock, Stamper, SteppingClock, SystemClock};
pub use types::*;
