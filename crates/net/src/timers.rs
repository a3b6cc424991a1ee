//! The channel's three logical timers: heartbeat, idle timeout, and the
//! optional revival timer.
//!
//! All three share one shape: a background task sleeps until a deadline,
//! then fires a callback posted onto the strand. `reset` bumps a generation
//! counter so an in-flight sleep that wakes up stale just recomputes the
//! deadline and sleeps again instead of firing early.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

struct Shared {
    generation: AtomicU64,
    deadline: std::sync::Mutex<Instant>,
    period: Duration,
}

/// A cancellable, resettable deadline timer whose firing is driven by a
/// background task rather than polled by the caller.
pub struct Timer {
    shared: Arc<Shared>,
}

impl Timer {
    /// Arm a one-shot timer that invokes `on_fire` once, `period` from now,
    /// unless reset before then.
    pub fn one_shot<F>(period: Duration, on_fire: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let shared = Arc::new(Shared {
            generation: AtomicU64::new(0),
            deadline: std::sync::Mutex::new(Instant::now() + period),
            period,
        });
        spawn_loop(shared.clone(), false, on_fire);
        Self { shared }
    }

    /// Arm a periodic timer that invokes `on_fire` every `period`, forever,
    /// until the timer is dropped.
    pub fn periodic<F>(period: Duration, on_fire: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let shared = Arc::new(Shared {
            generation: AtomicU64::new(0),
            deadline: std::sync::Mutex::new(Instant::now() + period),
            period,
        });
        spawn_loop(shared.clone(), true, on_fire);
        Self { shared }
    }

    /// Push the deadline out by this timer's period, invalidating any sleep
    /// currently in flight.
    pub fn reset(&self) {
        *self.shared.deadline.lock().unwrap() = Instant::now() + self.shared.period;
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
    }
}

fn spawn_loop<F>(shared: Arc<Shared>, repeating: bool, on_fire: F)
where
    F: Fn() + Send + Sync + 'static,
{
    tokio::spawn(async move {
        loop {
            let generation = shared.generation.load(Ordering::SeqCst);
            let deadline = *shared.deadline.lock().unwrap();
            tokio::time::sleep_until(deadline).await;
            if shared.generation.load(Ordering::SeqCst) != generation {
                // Reset while we slept; recompute against the new deadline.
                continue;
            }
            on_fire();
            if !repeating {
                break;
            }
            *shared.deadline.lock().unwrap() = Instant::now() + shared.period;
        }
    });
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration as StdDuration;

    #[tokio::test(start_paused = true)]
    async fn one_shot_fires_after_its_period() {
        let fired = Arc::new(AtomicU32::new(0));
        let fired2 = fired.clone();
        let _timer = Timer::one_shot(StdDuration::from_millis(50), move || {
            fired2.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::advance(StdDuration::from_millis(60)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_postpones_firing() {
        let fired = Arc::new(AtomicU32::new(0));
        let fired2 = fired.clone();
        let timer = Timer::one_shot(StdDuration::from_millis(50), move || {
            fired2.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::advance(StdDuration::from_millis(30)).await;
        timer.reset();
        tokio::time::advance(StdDuration::from_millis(30)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        tokio::time::advance(StdDuration::from_millis(25)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
