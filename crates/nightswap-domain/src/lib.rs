//! nightswap-domain
//!
//! Pure domain models for split-lease night exchange (Lease, Night, Request,
//! Message, TransactionRecord). No I/O, no locking, no storage.

pub mod common;
pub mod ids;
pub mod lease;
pub mod message;
pub mod night;
pub mod request;
pub mod transaction;

pub use common::*;
pub use ids::*;
pub use lease::*;
pub use message::*;
pub use night::*;
pub use request::*;
pub use transaction::*;
