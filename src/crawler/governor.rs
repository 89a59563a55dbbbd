//! Adaptive rate governor
//!
//! This module handles:
//! - Global concurrency limiting via a semaphore (the permit pool)
//! - Request pacing: consecutive requests are spaced by a floating delay target
//! - Adapting the target to throttling feedback (exponential growth, slow recovery)
//! - Jittering every pacing decision so workers do not burst in lockstep
//!
//! Pacing controls *rate*, the permit pool controls *concurrency*; a worker
//! needs both before it may issue a request.

use crate::config::RateLimitConfig;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Permission to issue one request
///
/// Holds a concurrency permit until dropped.
#[derive(Debug)]
pub struct Clearance {
    _permit: OwnedSemaphorePermit,
}

#[derive(Debug)]
struct PacingState {
    /// Current spacing between request slots, before jitter
    target: Duration,

    /// Earliest instant the next request may be sent
    next_slot: Option<Instant>,

    /// Throttle events still inside the cooldown window
    recent_throttles: VecDeque<Instant>,

    rng: fastrand::Rng,
}

/// Shared pacing and concurrency limiter
#[derive(Debug)]
pub struct RateGovernor {
    config: RateLimitConfig,
    permits: Arc<Semaphore>,
    pacing: Mutex<PacingState>,
}

impl RateGovernor {
    /// Creates a governor starting at the minimum delay
    ///
    /// # Arguments
    ///
    /// * `config` - Pacing bounds, cooldown, jitter and recovery settings
    /// * `max_in_flight` - Size of the permit pool
    pub fn new(config: RateLimitConfig, max_in_flight: usize) -> Self {
        Self::with_rng(config, max_in_flight, fastrand::Rng::new())
    }

    /// Creates a governor whose jitter sequence is reproducible
    pub fn with_seed(config: RateLimitConfig, max_in_flight: usize, seed: u64) -> Self {
        Self::with_rng(config, max_in_flight, fastrand::Rng::with_seed(seed))
    }

    fn with_rng(config: RateLimitConfig, max_in_flight: usize, rng: fastrand::Rng) -> Self {
        let pacing = PacingState {
            target: config.min_delay(),
            next_slot: None,
            recent_throttles: VecDeque::new(),
            rng,
        };

        Self {
            permits: Arc::new(Semaphore::new(max_in_flight)),
            pacing: Mutex::new(pacing),
            config,
        }
    }

    fn state(&self) -> MutexGuard<'_, PacingState> {
        self.pacing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits until a request may be issued
    ///
    /// This method:
    /// 1. Acquires a permit from the concurrency pool
    /// 2. Reserves the next pacing slot (spaced by the jittered target)
    /// 3. Sleeps until that slot
    ///
    /// # Returns
    ///
    /// * `Some(Clearance)` - The caller may issue one request while holding it
    /// * `None` - The permit pool was closed
    pub async fn throttle(&self) -> Option<Clearance> {
        let permit = self.permits.clone().acquire_owned().await.ok()?;

        let slot = {
            let mut state = self.state();
            let now = Instant::now();
            let slot = state.next_slot.map_or(now, |next| next.max(now));
            let spacing = jittered(&mut state, self.config.jitter);
            state.next_slot = Some(slot + spacing);
            tracing::trace!(
                "Pacing slot in {:?}, next spacing {:?}",
                slot.saturating_duration_since(now),
                spacing
            );
            slot
        };

        tokio::time::sleep_until(slot).await;
        Some(Clearance { _permit: permit })
    }

    /// Records a rate-limit signal and returns the backoff the caller should sleep
    ///
    /// The target at least doubles and is never below
    /// `min_delay * 2^(throttles within the cooldown window)`, capped at `max_delay`.
    pub fn record_throttled(&self, now: Instant) -> Duration {
        let mut state = self.state();
        prune(&mut state, now, self.config.cooldown());
        state.recent_throttles.push_back(now);

        let count = state.recent_throttles.len() as u32;
        let min_delay = self.config.min_delay();
        let max_delay = self.config.max_delay();
        let seeded = min_delay.saturating_mul(1u32 << count.min(31));
        let doubled = state.target.saturating_mul(2);
        state.target = doubled.max(seeded).min(max_delay);

        // Push the next slot out so every worker feels the slowdown
        let not_before = now + state.target;
        state.next_slot = Some(state.next_slot.map_or(not_before, |n| n.max(not_before)));

        tracing::debug!(
            "Throttled: pacing target now {:?} ({} throttles in cooldown window)",
            state.target,
            count
        );

        jittered(&mut state, self.config.jitter).min(max_delay)
    }

    /// Records a successful request
    ///
    /// Once no throttle event remains in the cooldown window, the target
    /// relaxes toward `min_delay` by the recovery factor.
    pub fn record_success(&self, now: Instant) {
        let mut state = self.state();
        prune(&mut state, now, self.config.cooldown());

        if state.recent_throttles.is_empty() {
            let relaxed = state.target.mul_f64(self.config.recovery_factor);
            state.target = relaxed.max(self.config.min_delay());
        }
    }

    /// Current pacing target, before jitter
    pub fn current_target(&self) -> Duration {
        self.state().target
    }

    /// Number of throttle events inside the cooldown window ending at `now`
    pub fn recent_throttles(&self, now: Instant) -> usize {
        let mut state = self.state();
        prune(&mut state, now, self.config.cooldown());
        state.recent_throttles.len()
    }

    /// Permits currently available in the concurrency pool
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

/// Drops throttle events older than the cooldown window
fn prune(state: &mut PacingState, now: Instant, cooldown: Duration) {
    while let Some(&oldest) = state.recent_throttles.front() {
        if now.saturating_duration_since(oldest) >= cooldown {
            state.recent_throttles.pop_front();
        } else {
            break;
        }
    }
}

/// Applies ±`jitter` relative noise to the current target
fn jittered(state: &mut PacingState, jitter: f64) -> Duration {
    if jitter <= 0.0 {
        return state.target;
    }
    let factor = 1.0 + jitter * (state.rng.f64() * 2.0 - 1.0);
    state.target.mul_f64(factor)
}
