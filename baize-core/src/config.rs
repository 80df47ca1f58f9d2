use std::time::Duration;

/// Money in the venue currency's smallest unit.
pub type Money = i64;

/// The configuration of the venue engine
#[derive(Debug, Clone)]
pub struct Config {
    /// How often running tables advance
    pub tick_interval: Duration,
    /// Remaining seconds at which the one-shot low time warning fires
    pub low_time_threshold_seconds: u64,
    /// Rate multiplier applied while a table is in VIP mode
    pub vip_multiplier: f64,
    /// How many times a save is attempted before the failure is surfaced
    pub save_attempts: u32,
    /// Delay before the first save retry, doubling per attempt
    pub save_backoff: Duration,
    /// How long closed shifts are kept
    pub history_retention: chrono::Duration,
    /// How long receipts are kept
    pub receipt_retention: chrono::Duration,
    /// How long journal entries are kept
    pub journal_retention: chrono::Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Wall-clock billing, one second granularity
            tick_interval: Duration::from_secs(1),
            low_time_threshold_seconds: 30,
            vip_multiplier: 1.5,
            save_attempts: 3,
            save_backoff: Duration::from_secs(1),
            history_retention: chrono::Duration::days(7),
            receipt_retention: chrono::Duration::days(7),
            journal_retention: chrono::Duration::days(30),
        }
    }
}
