//! Token-bucket rate limiting.
//!
//! ## How the bucket works
//!
//! 1. A bucket starts full with `capacity` tokens.
//! 2. One token is added every `fill_interval`, never beyond `capacity`.
//! 3. Each request takes one token; with none left, the request is rejected.
//!
//! Refill is computed lazily from the number of whole intervals elapsed since
//! the bucket was created, so there is no background timer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use http::StatusCode;
use parking_lot::Mutex;

use crate::context::Context;
use crate::handler::Handler;

#[derive(Debug)]
struct BucketState {
    available: u64,
    /// Fill intervals elapsed since `start` at the last adjustment.
    latest_tick: u64,
}

/// A token bucket shared by every request it guards.
///
/// All operations lock one internal mutex, so concurrent takers never
/// double-spend a token and the count never drops below zero.
#[derive(Debug)]
pub struct TokenBucket {
    start: Instant,
    fill_interval: Duration,
    capacity: u64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// # Panics
    ///
    /// Panics if `fill_interval` is zero or `capacity` is zero.
    pub fn new(fill_interval: Duration, capacity: u64) -> Self {
        assert!(!fill_interval.is_zero(), "fill interval must be greater than zero");
        assert!(capacity > 0, "capacity must be greater than zero");

        Self {
            start: Instant::now(),
            fill_interval,
            capacity,
            state: Mutex::new(BucketState { available: capacity, latest_tick: 0 }),
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn fill_interval(&self) -> Duration {
        self.fill_interval
    }

    /// Tokens available right now.
    pub fn available(&self) -> u64 {
        self.available_at(Instant::now())
    }

    /// Take up to `count` tokens without waiting. Returns how many were taken.
    pub fn take_available(&self, count: u64) -> u64 {
        self.take_available_at(Instant::now(), count)
    }

    fn available_at(&self, now: Instant) -> u64 {
        let mut state = self.state.lock();
        self.adjust(&mut state, now);
        state.available
    }

    fn take_available_at(&self, now: Instant, count: u64) -> u64 {
        if count == 0 {
            return 0;
        }
        let mut state = self.state.lock();
        self.adjust(&mut state, now);
        let taken = count.min(state.available);
        state.available -= taken;
        taken
    }

    fn adjust(&self, state: &mut BucketState, now: Instant) {
        let tick = self.tick(now);
        let elapsed = tick.saturating_sub(state.latest_tick);
        state.latest_tick = state.latest_tick.max(tick);
        if state.available < self.capacity {
            state.available = state.available.saturating_add(elapsed).min(self.capacity);
        }
    }

    fn tick(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.start).as_nanos();
        u64::try_from(elapsed / self.fill_interval.as_nanos()).unwrap_or(u64::MAX)
    }
}

/// Allow bursts of `capacity` requests, refilled one per `fill_interval`.
///
/// The bucket is created once, here, and shared by every request that goes
/// through the returned handler. A rejected request ends the chain with
/// `200 {"message": "rate limit..."}`; being throttled is not a server error.
pub fn rate_limit(fill_interval: Duration, capacity: u64) -> impl Handler {
    rate_limit_with(Arc::new(TokenBucket::new(fill_interval, capacity)))
}

/// Like [`rate_limit`], drawing from an existing bucket, e.g. one shared by
/// several routes.
pub fn rate_limit_with(bucket: Arc<TokenBucket>) -> impl Handler {
    move |c: &mut Context| {
        if bucket.take_available(1) < 1 {
            c.abort(StatusCode::OK, "rate limit...");
            return;
        }
        c.next();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Chain;
    use crate::request::Params;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn starts_full_and_drains() {
        let bucket = TokenBucket::new(Duration::from_secs(60), 3);
        assert_eq!(bucket.available(), 3);
        assert_eq!(bucket.take_available(2), 2);
        assert_eq!(bucket.take_available(5), 1);
        assert_eq!(bucket.take_available(1), 0);
        assert_eq!(bucket.take_available(0), 0);
    }

    #[test]
    fn refills_one_token_per_interval_up_to_capacity() {
        let bucket = TokenBucket::new(Duration::from_millis(10), 4);
        let t0 = bucket.start;
        assert_eq!(bucket.take_available_at(t0, 4), 4);

        assert_eq!(bucket.available_at(t0 + Duration::from_millis(9)), 0);
        assert_eq!(bucket.available_at(t0 + Duration::from_millis(25)), 2);
        assert_eq!(bucket.take_available_at(t0 + Duration::from_millis(25), 1), 1);
        assert_eq!(bucket.available_at(t0 + Duration::from_secs(10)), 4);
    }

    #[test]
    fn full_bucket_does_not_bank_idle_time() {
        let bucket = TokenBucket::new(Duration::from_millis(10), 2);
        let t0 = bucket.start;
        // Idle for a long time while full, then drain: no extra tokens appear.
        assert_eq!(bucket.take_available_at(t0 + Duration::from_secs(1), 5), 2);
        assert_eq!(bucket.available_at(t0 + Duration::from_millis(1005)), 0);
    }

    #[test]
    #[should_panic(expected = "capacity")]
    fn zero_capacity_is_rejected() {
        TokenBucket::new(Duration::from_secs(1), 0);
    }

    #[test]
    fn concurrent_takers_never_double_spend() {
        let bucket = Arc::new(TokenBucket::new(Duration::from_secs(3600), 50));
        let handles: Vec<_> = (0..200)
            .map(|_| {
                let bucket = Arc::clone(&bucket);
                thread::spawn(move || bucket.take_available(1))
            })
            .collect();
        let taken: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(taken, 50);
        assert_eq!(bucket.available(), 0);
    }

    #[test]
    fn request_past_capacity_is_rejected_with_200() {
        let reached = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reached);
        let chain = Chain::new()
            .then(rate_limit(Duration::from_secs(3600), 3))
            .then(move |c: &mut Context| {
                counter.fetch_add(1, Ordering::SeqCst);
                c.string(StatusCode::OK, "served");
            });

        let mut last = None;
        for _ in 0..4 {
            let mut c = Context::new(http::Request::get("/").body(()).unwrap(), Params::new(), chain.clone());
            c.next();
            last = Some(c);
        }

        assert_eq!(reached.load(Ordering::SeqCst), 3);
        let rejected = last.unwrap();
        assert_eq!(rejected.status_code(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(rejected.response().body()).unwrap();
        assert!(body["message"].as_str().unwrap().contains("rate limit"));
    }
}
