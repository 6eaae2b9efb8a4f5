//! In-memory byte channel for tests and dry runs.
//!
//! The channel answers each write with bytes produced by a responder closure, so a
//! test can model the instrument's ACK/ETX behaviour without hardware. A
//! [`MockHandle`] stays with the test after the channel is moved into a transport
//! and exposes every write and purge that happened.

use super::{ByteChannel, PurgeBuffer};
use crate::error::AppResult;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

#[derive(Default)]
struct MockState {
    writes: Vec<Vec<u8>>,
    rx: VecDeque<u8>,
    rx_purges: usize,
    tx_purges: usize,
    fail_writes: bool,
}

/// Scripted [`ByteChannel`].
pub struct MockChannel {
    state: Arc<Mutex<MockState>>,
    responder: Responder,
}

/// Inspection handle shared with a [`MockChannel`].
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockChannel {
    /// Channel whose responses are computed from each write.
    pub fn with_responder<F>(responder: F) -> (Self, MockHandle)
    where
        F: FnMut(&[u8]) -> Vec<u8> + Send + 'static,
    {
        let state = Arc::new(Mutex::new(MockState::default()));
        let channel = Self {
            state: state.clone(),
            responder: Box::new(responder),
        };
        (channel, MockHandle { state })
    }

    /// Channel that answers the n-th write with the n-th scripted response and
    /// stays silent once the script runs out.
    pub fn scripted<I>(responses: I) -> (Self, MockHandle)
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let mut script: VecDeque<Vec<u8>> = responses.into_iter().collect();
        Self::with_responder(move |_| script.pop_front().unwrap_or_default())
    }

    /// Channel that never answers.
    pub fn silent() -> (Self, MockHandle) {
        Self::with_responder(|_| Vec::new())
    }
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    // A panicking test thread must not hide the recorded traffic from the others.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ByteChannel for MockChannel {
    async fn write(&mut self, bytes: &[u8]) -> AppResult<()> {
        if lock(&self.state).fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock channel closed").into());
        }
        let reply = (self.responder)(bytes);
        let mut state = lock(&self.state);
        state.writes.push(bytes.to_vec());
        state.rx.extend(reply);
        Ok(())
    }

    async fn read(&mut self, max: usize) -> AppResult<Vec<u8>> {
        let mut state = lock(&self.state);
        let n = max.min(state.rx.len());
        Ok(state.rx.drain(..n).collect())
    }

    async fn purge(&mut self, buffer: PurgeBuffer) -> AppResult<()> {
        let mut state = lock(&self.state);
        match buffer {
            PurgeBuffer::Receive => {
                state.rx.clear();
                state.rx_purges += 1;
            }
            PurgeBuffer::Transmit => state.tx_purges += 1,
        }
        Ok(())
    }
}

impl MockHandle {
    /// Every write, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        lock(&self.state).writes.clone()
    }

    /// Number of writes exactly equal to `bytes`.
    pub fn count_writes(&self, bytes: &[u8]) -> usize {
        lock(&self.state)
            .writes
            .iter()
            .filter(|w| w.as_slice() == bytes)
            .count()
    }

    /// Total writes so far.
    pub fn write_count(&self) -> usize {
        lock(&self.state).writes.len()
    }

    /// Receive-buffer purges so far.
    pub fn rx_purges(&self) -> usize {
        lock(&self.state).rx_purges
    }

    /// Transmit-buffer purges so far.
    pub fn tx_purges(&self) -> usize {
        lock(&self.state).tx_purges
    }

    /// Make every following write fail, as if the cable had been pulled.
    pub fn fail_writes(&self, fail: bool) {
        lock(&self.state).fail_writes = fail;
    }

    /// Queue bytes as if the device had sent them unprompted.
    pub fn inject(&self, bytes: &[u8]) {
        lock(&self.state).rx.extend(bytes.iter().copied());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_replies_follow_writes() {
        let (mut channel, handle) = MockChannel::scripted(vec![b"\x06".to_vec()]);
        assert!(channel.read(8).await.unwrap().is_empty());

        channel.write(b"y").await.unwrap();
        assert_eq!(channel.read(8).await.unwrap(), b"\x06");

        channel.write(b"body").await.unwrap();
        assert!(channel.read(8).await.unwrap().is_empty());
        assert_eq!(handle.writes(), vec![b"y".to_vec(), b"body".to_vec()]);
    }

    #[tokio::test]
    async fn test_purge_discards_pending_bytes() {
        let (mut channel, handle) = MockChannel::silent();
        handle.inject(b"stale\x03");
        channel.purge(PurgeBuffer::Receive).await.unwrap();
        channel.purge(PurgeBuffer::Transmit).await.unwrap();

        assert!(channel.read(16).await.unwrap().is_empty());
        assert_eq!(handle.rx_purges(), 1);
        assert_eq!(handle.tx_purges(), 1);
    }
}
