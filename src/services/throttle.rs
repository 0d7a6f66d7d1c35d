//! Fixed pause between store mutations in bulk loops.

use crate::errors::{FsError, FsResult};
use std::{io, time::Duration};
use tokio_util::sync::CancellationToken;

/// Sleeps for the configured delay between successive mutating requests.
///
/// Cancelling the token while a pause is in progress ends the pause with
/// an `Interrupted` I/O error; the bulk operation stops there.
#[derive(Clone, Debug, Default)]
pub struct Throttle {
    delay: Duration,
    cancel: CancellationToken,
}

impl Throttle {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(delay: Duration, cancel: CancellationToken) -> Self {
        Self { delay, cancel }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub async fn pause(&self) -> FsResult<()> {
        if self.delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(FsError::Io(io::Error::new(
                io::ErrorKind::Interrupted,
                "interrupted during throttle delay",
            ))),
            _ = tokio::time::sleep(self.delay) => Ok(()),
        }
    }
}
