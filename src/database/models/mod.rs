pub mod rfq;
pub mod task;
pub mod tender;
pub mod user;

pub use rfq::{Rfq, RfqItem, RfqStatus};
pub use task::{TaskStatus, TenderTask};
pub use tender::{Tender, TenderStatus};
pub use user::UserAccount;

/// Raised when a stored status string does not name a known variant
#[derive(Debug, thiserror::Error)]
#[error("Unknown {kind} status: {value}")]
pub struct UnknownStatus {
    pub kind: &'static str,
    pub value: String,
}
