//! Server configuration.
//!
//! Every tunable has a default; the binary overrides a subset from command
//! line arguments and environment variables.

use std::time::Duration;

use crate::domain::{BucketPolicy, EventKind};

#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    pub game: GameConfig,
    pub presence: PresenceConfig,
    pub rate_limit: RateLimitConfig,
    pub store: StoreConfig,
}

/// Round and room rules.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub default_duration_secs: u64,
    pub min_duration_secs: u64,
    pub max_duration_secs: u64,
    /// Side length of randomly generated grids.
    pub default_grid_size: usize,
    pub min_word_len: usize,
    /// A valid word extends the combo only if it follows the previous one within this window.
    pub combo_window: Duration,
    pub max_players: usize,
    /// Interval between `time-remaining` broadcasts.
    pub tick_interval: Duration,
    /// A room left waiting this long after its last activity is closed.
    pub idle_timeout: Duration,
    pub oracle_timeout: Duration,
    /// Board-valid words missing from the dictionary are held for arbitration
    /// instead of being rejected outright.
    pub review_unknown_words: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            default_duration_secs: 60,
            min_duration_secs: 10,
            max_duration_secs: 600,
            default_grid_size: 4,
            min_word_len: 2,
            combo_window: Duration::from_secs(10),
            max_players: 8,
            tick_interval: Duration::from_secs(1),
            idle_timeout: Duration::from_secs(600),
            oracle_timeout: Duration::from_secs(10),
            review_unknown_words: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PresenceConfig {
    pub player_grace: Duration,
    pub owner_grace: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            player_grace: Duration::from_secs(30),
            owner_grace: Duration::from_secs(300),
        }
    }
}

impl PresenceConfig {
    pub fn grace_for(&self, is_owner: bool) -> Duration {
        if is_owner {
            self.owner_grace
        } else {
            self.player_grace
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub submit_word: BucketPolicy,
    /// Room control events: create, join, start, end, review, leave, close.
    pub control: BucketPolicy,
    pub chat: BucketPolicy,
    pub heartbeat: BucketPolicy,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            submit_word: BucketPolicy::new(4, 2.0),
            control: BucketPolicy::new(5, 1.0),
            chat: BucketPolicy::new(10, 3.0),
            heartbeat: BucketPolicy::new(20, 10.0),
        }
    }
}

impl RateLimitConfig {
    pub fn policy_for(&self, kind: EventKind) -> BucketPolicy {
        match kind {
            EventKind::SubmitWord => self.submit_word,
            EventKind::Chat => self.chat,
            EventKind::Heartbeat => self.heartbeat,
            EventKind::CreateRoom
            | EventKind::Join
            | EventKind::Start
            | EventKind::EndEarly
            | EventKind::ResolveReview
            | EventKind::Leave
            | EventKind::CloseRoom => self.control,
        }
    }
}

/// Shared store resilience settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    pub cooldown: Duration,
    pub call_timeout: Duration,
    pub lock_lease: Duration,
    pub lock_retry_backoff: Duration,
    /// Tags events this instance publishes so its relay can skip them.
    pub instance_id: String,
    /// How often the relay rescans the store for rooms hosted elsewhere.
    pub relay_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(10),
            call_timeout: Duration::from_secs(2),
            lock_lease: Duration::from_secs(5),
            lock_retry_backoff: Duration::from_millis(200),
            instance_id: uuid::Uuid::new_v4().to_string(),
            relay_interval: Duration::from_secs(5),
        }
    }
}
