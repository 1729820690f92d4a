//! Audio plumbing: the chunk type, the microphone arbiter, and the
//! capture/playback implementations built on `cpal`.
//!
//! The device has exactly one microphone and it cannot be shared: the wake
//! listener and the speech recognizer take turns through [`MicArbiter`].

pub mod capture;
pub mod playback;

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A chunk of mono f32 samples captured from the microphone.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Samples in \[-1, 1\] at `sample_rate`.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// When this chunk was captured.
    pub captured_at: Instant,
}

/// Arbiter for the single physical audio input device.
///
/// At most one [`MicLease`] exists at any instant. Handoff between the wake
/// listener and the recognizer is release-then-acquire: the holder drops its
/// capture stream (stopping and freeing the native handle) and then the
/// lease, before the next holder's `acquire` completes.
#[derive(Clone, Default)]
pub struct MicArbiter {
    slot: Arc<Mutex<()>>,
}

impl MicArbiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take exclusive ownership of the microphone, waiting for the current
    /// holder (if any) to release it.
    pub async fn acquire(&self) -> MicLease {
        MicLease {
            _slot: Arc::clone(&self.slot).lock_owned().await,
        }
    }
}

/// Exclusive lease over the microphone.
///
/// Capture streams are opened through the lease (see [`capture::open`]) and
/// borrow it, so the native handle cannot outlive the lease.
pub struct MicLease {
    _slot: OwnedMutexGuard<()>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn lease_never_has_two_holders() {
        let arbiter = MicArbiter::new();
        let holders = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let arbiter = arbiter.clone();
            let holders = Arc::clone(&holders);
            let peak = Arc::clone(&peak);
            tasks.push(tokio::spawn(async move {
                let lease = arbiter.acquire().await;
                let now = holders.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                holders.fetch_sub(1, Ordering::SeqCst);
                drop(lease);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(holders.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn release_then_acquire_handoff() {
        let arbiter = MicArbiter::new();
        let first = arbiter.acquire().await;

        let contender = {
            let arbiter = arbiter.clone();
            tokio::spawn(async move {
                let _lease = arbiter.acquire().await;
            })
        };

        // The contender cannot finish while the first lease is held.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!contender.is_finished());

        drop(first);
        contender.await.unwrap();
    }
}
