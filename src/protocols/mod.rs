//! Protocol implementations.
//!
//! - `ping`: client side; sends payloads and reads back the echo
//! - `echo`: server side; mirrors every received byte to its sender

pub mod echo;
pub mod ping;

use std::future::Future;
use std::time::Duration;
use tokio::time::error::Elapsed;

/// Await `fut`, giving up after `limit` if one is set.
pub(crate) async fn with_timeout<F>(limit: Option<Duration>, fut: F) -> Result<F::Output, Elapsed>
where
    F: Future,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await,
        None => Ok(fut.await),
    }
}
