//! Exponential backoff with jitter
//!
//! One [`BackoffController`] per remote-operation category. Failures grow the
//! delay as `base * 2^(failures - 1)` up to a cap; the value returned to the
//! caller carries up to 30% random jitter, while the [`BackoffController::should_attempt`]
//! gate uses the unjittered delay so it stays deterministic.
//!
//! Time is measured with [`tokio::time::Instant`], so tests running on a
//! paused runtime can advance it explicitly.

use rand::Rng;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Remote-operation categories with independent backoff state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackoffCategory {
    PlaybackSync,
    Prefetch,
    HomepageRefresh,
    Downloads,
}

impl BackoffCategory {
    pub const ALL: [Self; 4] = [
        Self::PlaybackSync,
        Self::Prefetch,
        Self::HomepageRefresh,
        Self::Downloads,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlaybackSync => "playback_sync",
            Self::Prefetch => "prefetch",
            Self::HomepageRefresh => "homepage_refresh",
            Self::Downloads => "downloads",
        }
    }

    /// Default base/max delays for the category
    pub fn default_config(&self) -> BackoffConfig {
        match self {
            Self::PlaybackSync => BackoffConfig::new(Duration::from_secs(5), Duration::from_secs(120)),
            Self::Prefetch => BackoffConfig::new(Duration::from_secs(5), Duration::from_secs(300)),
            Self::HomepageRefresh => {
                BackoffConfig::new(Duration::from_secs(2), Duration::from_secs(60))
            }
            Self::Downloads => BackoffConfig::new(Duration::from_secs(3), Duration::from_secs(90)),
        }
    }
}

impl std::fmt::Display for BackoffCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delay parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the random jitter, as a fraction of the delay
    pub jitter_ratio: f64,
}

impl BackoffConfig {
    pub const DEFAULT_JITTER_RATIO: f64 = 0.3;

    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            jitter_ratio: Self::DEFAULT_JITTER_RATIO,
        }
    }

    /// Same delays without jitter
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.jitter_ratio = 0.0;
        self
    }

    /// Unjittered delay after `failure_count` consecutive failures
    ///
    /// Zero failures means no delay. Saturates at `max_delay` instead of
    /// overflowing.
    pub fn delay_for(&self, failure_count: u32) -> Duration {
        if failure_count == 0 {
            return Duration::ZERO;
        }

        2u32.checked_pow(failure_count - 1)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

#[derive(Debug, Default)]
struct BackoffState {
    failure_count: u32,
    last_failure_at: Option<Instant>,
}

/// Backoff state machine for one category
///
/// Shared by reference (`Arc`); all methods take `&self`.
#[derive(Debug)]
pub struct BackoffController {
    category: BackoffCategory,
    config: BackoffConfig,
    state: Mutex<BackoffState>,
}

impl BackoffController {
    pub fn new(category: BackoffCategory, config: BackoffConfig) -> Self {
        Self {
            category,
            config,
            state: Mutex::new(BackoffState::default()),
        }
    }

    /// Controller with the category's default delays
    pub fn for_category(category: BackoffCategory) -> Self {
        Self::new(category, category.default_config())
    }

    pub fn category(&self) -> BackoffCategory {
        self.category
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Record a failed attempt and return the delay to wait before retrying
    pub fn record_failure(&self) -> Duration {
        let mut state = self.lock();
        state.failure_count = state.failure_count.saturating_add(1);
        state.last_failure_at = Some(Instant::now());

        let delay = self.config.delay_for(state.failure_count);
        let jitter = if self.config.jitter_ratio > 0.0 {
            delay.mul_f64(rand::thread_rng().gen_range(0.0..=self.config.jitter_ratio))
        } else {
            Duration::ZERO
        };
        let delay = delay + jitter;

        tracing::debug!(
            category = %self.category,
            failures = state.failure_count,
            delay_ms = delay.as_millis() as u64,
            "Backoff after failure"
        );
        delay
    }

    /// Record a successful attempt, clearing all failure state
    pub fn record_success(&self) {
        let mut state = self.lock();
        if state.failure_count > 0 {
            tracing::debug!(
                category = %self.category,
                failures = state.failure_count,
                "Backoff reset after success"
            );
        }
        *state = BackoffState::default();
    }

    /// Whether enough time has passed since the last failure
    pub fn should_attempt(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Time left until [`Self::should_attempt`] turns true
    pub fn remaining(&self) -> Duration {
        let state = self.lock();
        match state.last_failure_at {
            Some(at) if state.failure_count > 0 => {
                let threshold = self.config.delay_for(state.failure_count);
                threshold.saturating_sub(at.elapsed())
            }
            _ => Duration::ZERO,
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    /// Unjittered delay for the current failure count
    pub fn current_threshold(&self) -> Duration {
        self.config.delay_for(self.lock().failure_count)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BackoffState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// One controller per category
///
/// Constructed once by the composition root and shared with every service
/// that talks to the remote.
#[derive(Debug, Clone)]
pub struct BackoffRegistry {
    playback_sync: Arc<BackoffController>,
    prefetch: Arc<BackoffController>,
    homepage_refresh: Arc<BackoffController>,
    downloads: Arc<BackoffController>,
}

impl BackoffRegistry {
    /// Registry using every category's default delays
    pub fn new() -> Self {
        Self::with_configs(|category| category.default_config())
    }

    /// Registry with delays chosen per category
    pub fn with_configs(config_for: impl Fn(BackoffCategory) -> BackoffConfig) -> Self {
        let make = |category: BackoffCategory| {
            Arc::new(BackoffController::new(category, config_for(category)))
        };
        Self {
            playback_sync: make(BackoffCategory::PlaybackSync),
            prefetch: make(BackoffCategory::Prefetch),
            homepage_refresh: make(BackoffCategory::HomepageRefresh),
            downloads: make(BackoffCategory::Downloads),
        }
    }

    pub fn get(&self, category: BackoffCategory) -> Arc<BackoffController> {
        Arc::clone(match category {
            BackoffCategory::PlaybackSync => &self.playback_sync,
            BackoffCategory::Prefetch => &self.prefetch,
            BackoffCategory::HomepageRefresh => &self.homepage_refresh,
            BackoffCategory::Downloads => &self.downloads,
        })
    }

    /// Reset every category
    pub fn reset_all(&self) {
        for category in BackoffCategory::ALL {
            self.get(category).record_success();
        }
    }
}

impl Default for BackoffRegistry {
    fn default() -> Self {
        Self::new()
    }
}
