//! Request pacing and bounded, order-preserving dispatch

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use longform_tts_core::SynthesisError;
use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Spaces outbound requests at least `min_interval` apart
///
/// Callers queue on a fair async lock and the holder sleeps until its turn.
/// Only issued requests move the clock, so a caller cancelled while queued
/// or sleeping leaves no reservation behind.
#[derive(Debug)]
pub struct RequestGate {
    min_interval: Option<Duration>,
    last_issued: AsyncMutex<Option<Instant>>,
}

impl RequestGate {
    /// `None` or a zero interval disables pacing
    pub fn new(min_interval: Option<Duration>) -> Self {
        Self {
            min_interval: min_interval.filter(|interval| !interval.is_zero()),
            last_issued: AsyncMutex::new(None),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    pub fn min_interval(&self) -> Option<Duration> {
        self.min_interval
    }

    /// Wait for this caller's turn
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), SynthesisError> {
        if cancel.is_cancelled() {
            return Err(SynthesisError::Cancelled);
        }
        let Some(interval) = self.min_interval else {
            return Ok(());
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SynthesisError::Cancelled),
            _ = self.take_turn(interval) => Ok(()),
        }
    }

    async fn take_turn(&self, interval: Duration) {
        let mut last = self.last_issued.lock().await;
        if let Some(previous) = *last {
            tokio::time::sleep_until(previous + interval).await;
        }
        *last = Some(Instant::now());
    }
}

/// Runs one task per unit with at most `max_in_flight` running at once
///
/// Results land in a slot per original index, so the returned order is the
/// input order regardless of completion order. A slot stays `None` when its
/// task never started (cancelled before dispatch) or panicked.
#[derive(Debug, Clone)]
pub struct ConcurrencyController {
    max_in_flight: usize,
}

impl ConcurrencyController {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            max_in_flight: max_in_flight.max(1),
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Dispatch `count` tasks built by `make_task` and wait for all of them
    pub async fn run<T, F, Fut>(
        &self,
        count: usize,
        cancel: &CancellationToken,
        make_task: F,
    ) -> Vec<Option<T>>
    where
        F: Fn(usize) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let mut tasks = JoinSet::new();
        let mut slots: Vec<Option<T>> = (0..count).map(|_| None).collect();

        for index in 0..count {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                tracing::debug!(dispatched = index, total = count, "dispatch stopped");
                break;
            };

            let task = make_task(index);
            tasks.spawn(async move {
                let _permit = permit;
                (index, task.await)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, output)) => slots[index] = Some(output),
                Err(e) => tracing::error!(error = %e, "unit task failed to complete"),
            }
        }

        slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_gate_spaces_requests() {
        let gate = RequestGate::new(Some(Duration::from_millis(200)));
        let cancel = CancellationToken::new();
        let start = Instant::now();
        for _ in 0..4 {
            gate.acquire(&cancel).await.unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(600));
        assert!(start.elapsed() < Duration::from_millis(800));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlimited_gate_never_waits() {
        let gate = RequestGate::new(Some(Duration::ZERO));
        assert!(gate.min_interval().is_none());
        let cancel = CancellationToken::new();
        let start = Instant::now();
        for _ in 0..10 {
            gate.acquire(&cancel).await.unwrap();
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_gate_observes_cancel() {
        let gate = RequestGate::new(Some(Duration::from_secs(3600)));
        let cancel = CancellationToken::new();
        gate.acquire(&cancel).await.unwrap();
        cancel.cancel();
        assert_eq!(gate.acquire(&cancel).await, Err(SynthesisError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_waiters_release_their_turns() {
        let gate = Arc::new(RequestGate::new(Some(Duration::from_millis(200))));
        let start = Instant::now();
        gate.acquire(&CancellationToken::new()).await.unwrap();

        let abandoned = CancellationToken::new();
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let cancel = abandoned.clone();
                tokio::spawn(async move { gate.acquire(&cancel).await })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(10)).await;
        abandoned.cancel();
        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), Err(SynthesisError::Cancelled));
        }

        gate.acquire(&CancellationToken::new()).await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(400), "{elapsed:?}");
    }

    #[tokio::test]
    async fn test_results_in_input_order() {
        let controller = ConcurrencyController::new(4);
        let cancel = CancellationToken::new();
        let slots = controller
            .run(10, &cancel, |index| async move {
                tokio::time::sleep(Duration::from_millis(((10 - index) * 3) as u64)).await;
                index * 10
            })
            .await;
        let values: Vec<usize> = slots.into_iter().map(Option::unwrap).collect();
        assert_eq!(values, (0..10).map(|i| i * 10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_in_flight_bounded() {
        let controller = ConcurrencyController::new(2);
        let cancel = CancellationToken::new();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        controller
            .run(8, &cancel, |_| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                }
            })
            .await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_cancel_before_dispatch() {
        let controller = ConcurrencyController::new(1);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let slots = controller.run(3, &cancel, |index| async move { index }).await;
        assert!(slots.iter().all(Option::is_none));
    }
}
