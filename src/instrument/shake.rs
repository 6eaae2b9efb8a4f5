//! Continuous shaking
//!
//! The instrument only shakes for a fixed duration (at most 16 minutes) per
//! command. To shake until told otherwise, a background task re-issues the
//! maximum-duration shake command each time the previous one is about to run out.
//!
//! Lifecycle: `Idle -> Shaking -> Idle`.
//!
//! Stopping clears the session's cancellation token first, then sends the abort
//! command, then waits for the task to finish. With the token cleared before the
//! abort goes out, the loop cannot issue a fresh shake after the abort. The loop only
//! observes cancellation between exchanges, so an exchange that is in flight always
//! completes and never leaves a half-written command on the wire.
//!
//! A rejected shake command (wrong acknowledgment) ends the loop at once. Timeouts
//! and I/O errors are retried up to `shake.retry`. Either way the loop's error is
//! returned by [`ShakeSession::stop`].

use crate::config::ShakeSettings;
use crate::error::{AppResult, DaqError};
use crate::payload::{self, ShakeType, SHAKE_PRIMING};
use crate::transport::{Command, FramedTransport, TRIGGER_ACK};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Abort whatever the instrument is doing. No response is sent.
pub(crate) async fn send_abort(transport: &FramedTransport) -> AppResult<()> {
    transport.send(&Command::new(b'x'), false).await?;
    Ok(())
}

/// A running background shake.
pub struct ShakeSession {
    shake_type: ShakeType,
    token: CancellationToken,
    handle: JoinHandle<AppResult<()>>,
}

impl ShakeSession {
    /// Start shaking in the background.
    ///
    /// The shake body is built before the task is spawned, so an invalid duration
    /// is reported here and nothing is sent.
    pub(crate) fn start(
        transport: FramedTransport,
        shake_type: ShakeType,
        settings: &ShakeSettings,
    ) -> AppResult<Self> {
        let body = payload::shake_body(shake_type, settings.max_duration)?;
        let token = CancellationToken::new();
        let handle = tokio::spawn(shake_continuously(
            transport,
            body,
            settings.clone(),
            token.clone(),
        ));
        info!(?shake_type, "Shaking started");
        Ok(Self {
            shake_type,
            token,
            handle,
        })
    }

    /// Motion this session drives.
    pub fn shake_type(&self) -> ShakeType {
        self.shake_type
    }

    /// False once the loop has exited on its own (repeated failures).
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop shaking and wait for the background task to finish.
    ///
    /// A failed abort is logged and the session still ends. If the loop itself
    /// had failed, its error is returned once the task has been joined.
    pub(crate) async fn stop(self, transport: &FramedTransport) -> AppResult<()> {
        self.token.cancel();
        if let Err(e) = send_abort(transport).await {
            warn!(error = %e, "Abort command failed while stopping shake");
        }

        match self.handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(error = %e, "Shake loop had already stopped with an error");
                return Err(e);
            }
            Err(e) if e.is_cancelled() => {}
            Err(e) => {
                error!(error = %e, "Shake task panicked");
                return Err(DaqError::ShakeTask(e.to_string()));
            }
        }
        info!(shake_type = ?self.shake_type, "Shaking stopped");
        Ok(())
    }
}

/// Start one maximum-duration shake. Returns as soon as shaking has started.
async fn shake_for_max_duration(
    transport: &FramedTransport,
    body: &str,
    token: &CancellationToken,
) -> AppResult<()> {
    let mut exchange = transport.lock().await;
    // Stop may have been requested while we waited for the channel.
    if token.is_cancelled() {
        return Ok(());
    }
    exchange
        .send(&Command::with_parameter(b'y', SHAKE_PRIMING), true)
        .await?;
    exchange
        .send(&Command::with_parameter(b'D', body), true)
        .await?;
    exchange
        .send_expecting(&Command::new(b'O'), TRIGGER_ACK)
        .await
}

async fn shake_continuously(
    transport: FramedTransport,
    body: String,
    settings: ShakeSettings,
    token: CancellationToken,
) -> AppResult<()> {
    let mut failures = 0;
    while !token.is_cancelled() {
        let wait = match shake_for_max_duration(&transport, &body, &token).await {
            Ok(()) => {
                failures = 0;
                debug!(duration = ?settings.max_duration, "Shake command issued");
                settings.max_duration
            }
            Err(e) if e.is_protocol() => {
                error!(error = %e, "Shake command rejected");
                return Err(e);
            }
            Err(e) => {
                failures += 1;
                if !settings.retry.allows_another(failures) {
                    error!(error = %e, failures, "Giving up re-issuing shake command");
                    return Err(e);
                }
                warn!(error = %e, failures, "Shake command failed, retrying");
                settings.retry.backoff_delay
            }
        };

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }
    }
    Ok(())
}
