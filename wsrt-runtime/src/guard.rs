//! Turns adapter panics into internal infrastructure errors.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use wsrt_core::InfrastructureError;

pub(crate) async fn guarded<T, F>(operation: &str, future: F) -> Result<T, InfrastructureError>
where
    F: Future<Output = Result<T, InfrastructureError>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(InfrastructureError::internal(format!(
            "'{operation}' panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}
