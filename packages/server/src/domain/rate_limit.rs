//! トークンバケットによる流量制御

use tokio::time::Instant;

/// バケット 1 つ分のバースト量と毎秒の補充量
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketPolicy {
    pub burst: u32,
    pub refill_per_sec: f64,
}

impl BucketPolicy {
    pub const fn new(burst: u32, refill_per_sec: f64) -> Self {
        Self {
            burst,
            refill_per_sec,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenBucket {
    policy: BucketPolicy,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// 満タンの状態で作成
    pub fn new(policy: BucketPolicy, now: Instant) -> Self {
        Self {
            policy,
            tokens: f64::from(policy.burst),
            last_refill: now,
        }
    }

    /// トークンが残っていれば 1 つ消費する
    pub fn try_acquire_at(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    #[cfg(test)]
    pub fn available(&self) -> f64 {
        self.tokens
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens =
            (self.tokens + elapsed * self.policy.refill_per_sec).min(f64::from(self.policy.burst));
        self.last_refill = now;
    }
}
