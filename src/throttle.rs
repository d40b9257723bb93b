//! Request pacing for the Slack Web API.
//!
//! Each endpoint gets its own token bucket sized from Slack's published
//! tier limits. Waiting goes through [`Clock`] so the pipeline can be driven
//! by a manual clock in tests.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{AppError, Result};

pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Slack methods the pipeline calls, each with its own budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    UsersList,
    UsersConversations,
    ConversationsHistory,
}

impl Endpoint {
    pub fn method(&self) -> &'static str {
        match self {
            Endpoint::UsersList => "users.list",
            Endpoint::UsersConversations => "users.conversations",
            Endpoint::ConversationsHistory => "conversations.history",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rate {
    pub per_minute: u32,
    pub burst: u32,
}

impl Rate {
    pub const fn new(per_minute: u32, burst: u32) -> Self {
        Self { per_minute, burst }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    pub users_list: Rate,
    pub users_conversations: Rate,
    pub conversations_history: Rate,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            // Tier 2
            users_list: Rate::new(20, 1),
            // Tier 3
            users_conversations: Rate::new(50, 1),
            conversations_history: Rate::new(50, 1),
        }
    }
}

impl RateLimits {
    pub fn validate(&self) -> Result<()> {
        for (endpoint, rate) in [
            (Endpoint::UsersList, self.users_list),
            (Endpoint::UsersConversations, self.users_conversations),
            (Endpoint::ConversationsHistory, self.conversations_history),
        ] {
            if rate.per_minute == 0 || rate.burst == 0 {
                return Err(AppError::InvalidConfig(format!(
                    "rate limit for {} must allow at least one request",
                    endpoint.method()
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Option<Instant>,
}

impl TokenBucket {
    pub fn new(rate: Rate) -> Self {
        let capacity = f64::from(rate.burst.max(1));
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec: f64::from(rate.per_minute.max(1)) / 60.0,
            last_refill: None,
        }
    }

    /// Takes one token, sleeping on `clock` until one is available.
    /// Returns how long the caller was held back.
    pub fn acquire(&mut self, clock: &dyn Clock) -> Duration {
        let now = clock.now();
        if let Some(last) = self.last_refill {
            let elapsed = now.saturating_duration_since(last).as_secs_f64();
            self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        }
        self.last_refill = Some(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return Duration::ZERO;
        }

        let wait = Duration::from_secs_f64((1.0 - self.tokens) / self.refill_per_sec);
        clock.sleep(wait);
        self.tokens = 0.0;
        self.last_refill = Some(clock.now());
        wait
    }
}

/// Per-endpoint buckets sharing one clock.
pub struct Throttle<'c> {
    clock: &'c dyn Clock,
    users_list: TokenBucket,
    users_conversations: TokenBucket,
    conversations_history: TokenBucket,
}

impl<'c> Throttle<'c> {
    pub fn new(limits: &RateLimits, clock: &'c dyn Clock) -> Self {
        Self {
            clock,
            users_list: TokenBucket::new(limits.users_list),
            users_conversations: TokenBucket::new(limits.users_conversations),
            conversations_history: TokenBucket::new(limits.conversations_history),
        }
    }

    pub fn wait(&mut self, endpoint: Endpoint) {
        let bucket = match endpoint {
            Endpoint::UsersList => &mut self.users_list,
            Endpoint::UsersConversations => &mut self.users_conversations,
            Endpoint::ConversationsHistory => &mut self.conversations_history,
        };
        let waited = bucket.acquire(self.clock);
        if !waited.is_zero() {
            debug!("throttled {} for {:?}", endpoint.method(), waited);
        }
    }

    pub fn cool_down(&self, duration: Duration) {
        self.clock.sleep(duration);
    }
}
