//! The imperative client API.
//!
//! Each connection runs one driver task owning the engine and the
//! socket; the handles in this module are thin fronts over the driver's
//! control channel. Blocking operations are async fns; each one accepts
//! or inherits a timeout, and a timeout failure never cancels the
//! underlying protocol action.

mod connection;
mod delivery;
mod driver;
pub mod error;
mod options;
mod receiver;
mod sender;
mod session;
mod streaming;
pub(crate) mod tracker;

pub use connection::{Client, Connection};
pub use delivery::Delivery;
pub use error::ClientError;
pub use options::{
    ClientOptions, ConnectionOptions, DeliveryMode, ReceiverOptions, SenderOptions, SourceOptions,
    TargetOptions,
};
pub use receiver::Receiver;
pub use sender::Sender;
pub use session::Session;
pub use streaming::{StreamDelivery, StreamReceiver, StreamSender, StreamSenderMessage, StreamTracker};
pub use tracker::Tracker;

use std::future::Future;
use std::time::Duration;

/// Applies an optional timeout to a client operation, mapping the
/// elapse to [`ClientError::OperationTimedOut`].
pub(crate) async fn with_timeout<T, F>(
    operation: &'static str,
    timeout: Option<Duration>,
    future: F,
) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    match timeout {
        None => future.await,
        Some(timeout) => match tokio::time::timeout(timeout, future).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::OperationTimedOut(operation)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_timeout_maps_to_operation_timed_out() {
        tokio_test::block_on(async {
            let result: Result<(), ClientError> =
                with_timeout("probe", Some(Duration::from_millis(5)), async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                })
                .await;
            assert!(matches!(
                result,
                Err(ClientError::OperationTimedOut("probe"))
            ));
        });
    }

    #[test]
    fn absent_timeout_runs_to_completion() {
        tokio_test::block_on(async {
            let result = with_timeout("probe", None, async { Ok(7u32) }).await;
            assert_eq!(result.unwrap(), 7);
        });
    }
}
