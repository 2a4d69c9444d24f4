//! Shared types used by every fulfillment service.

pub mod money;
pub mod requester;
pub mod types;

pub use money::Money;
pub use requester::{Requester, Role};
pub use types::{ProductId, RecordId, UserId};
