pub mod authorization;
pub mod error;
pub mod lifecycle;
pub mod rfq_service;
pub mod task_service;
pub mod tender_service;

pub use error::{ServiceError, ServiceResult};
pub use rfq_service::{NewRfq, RfqService, RfqUpdate, RfqView};
pub use task_service::{NewTask, TaskService, TaskUpdate};
pub use tender_service::{NewTender, TenderService, TenderUpdate};

use serde::{Deserialize, Deserializer};

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`) in patch bodies
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub(crate) fn require_text(field: &str, value: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        Err(ServiceError::Validation(format!("{} must not be empty", field)))
    } else {
        Ok(())
    }
}
