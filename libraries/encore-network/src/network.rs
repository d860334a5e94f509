//! Connectivity classification
//!
//! Raw connectivity signals (online flag, effective connection type, RTT,
//! downlink, data-saver) are reduced to a [`NetworkQuality`] from which
//! prefetch depth, polling cadence and batch sizes are derived.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::watch;

/// Coarse connectivity quality, worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkQuality {
    Offline,
    Poor,
    Moderate,
    Good,
    Excellent,
}

impl NetworkQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Poor => "poor",
            Self::Moderate => "moderate",
            Self::Good => "good",
            Self::Excellent => "excellent",
        }
    }

    /// How many upcoming tracks are worth fetching ahead
    pub fn prefetch_depth(&self) -> usize {
        match self {
            Self::Excellent => 3,
            Self::Good => 2,
            Self::Moderate => 1,
            Self::Poor | Self::Offline => 0,
        }
    }

    /// Factor applied to base polling intervals
    pub fn polling_multiplier(&self) -> f64 {
        match self {
            Self::Excellent => 1.0,
            Self::Good => 1.5,
            Self::Moderate => 2.0,
            Self::Poor => 4.0,
            Self::Offline => 10.0,
        }
    }

    /// Items per remote batch request
    pub fn batch_size(&self) -> usize {
        match self {
            Self::Excellent => 20,
            Self::Good => 15,
            Self::Moderate => 10,
            Self::Poor | Self::Offline => 5,
        }
    }
}

impl std::fmt::Display for NetworkQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recommended prefetch depth for `quality`
pub fn recommended_prefetch_depth(quality: NetworkQuality) -> usize {
    quality.prefetch_depth()
}

/// Polling interval multiplier for `quality`
pub fn polling_multiplier(quality: NetworkQuality) -> f64 {
    quality.polling_multiplier()
}

/// Recommended batch size for `quality`
pub fn recommended_batch_size(quality: NetworkQuality) -> usize {
    quality.batch_size()
}

/// Effective connection type as reported by the platform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectiveType {
    #[serde(rename = "slow-2g")]
    Slow2g,
    #[serde(rename = "2g")]
    TwoG,
    #[serde(rename = "3g")]
    ThreeG,
    #[serde(rename = "4g")]
    FourG,
    #[default]
    #[serde(other, rename = "unknown")]
    Unknown,
}

impl EffectiveType {
    /// Parse a platform string; anything unrecognized is `Unknown`
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "slow-2g" => Self::Slow2g,
            "2g" => Self::TwoG,
            "3g" => Self::ThreeG,
            "4g" => Self::FourG,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slow2g => "slow-2g",
            Self::TwoG => "2g",
            Self::ThreeG => "3g",
            Self::FourG => "4g",
            Self::Unknown => "unknown",
        }
    }
}

/// Raw connectivity signals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSignals {
    pub is_online: bool,
    #[serde(default)]
    pub effective_type: EffectiveType,
    #[serde(default)]
    pub downlink_mbps: Option<f64>,
    #[serde(default)]
    pub rtt_ms: Option<u32>,
    #[serde(default)]
    pub save_data: bool,
    #[serde(default)]
    pub is_cellular: bool,
}

impl Default for NetworkSignals {
    fn default() -> Self {
        Self {
            is_online: true,
            effective_type: EffectiveType::Unknown,
            downlink_mbps: None,
            rtt_ms: None,
            save_data: false,
            is_cellular: false,
        }
    }
}

impl NetworkSignals {
    /// Signals describing no connectivity at all
    pub fn offline() -> Self {
        Self {
            is_online: false,
            ..Self::default()
        }
    }
}

/// Classified connectivity snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub quality: NetworkQuality,
    pub effective_type: EffectiveType,
    pub is_online: bool,
    pub is_save_data: bool,
    pub is_cellular: bool,
    pub downlink_mbps: Option<f64>,
    pub rtt_ms: Option<u32>,
}

/// Classify raw signals
///
/// Offline wins over everything, then data-saver forces `Poor`. Otherwise
/// slow links are judged by effective type or RTT, and fast ones by downlink.
pub fn classify(signals: &NetworkSignals) -> NetworkInfo {
    let rtt = signals.rtt_ms.unwrap_or(0);

    let quality = if !signals.is_online {
        NetworkQuality::Offline
    } else if signals.save_data
        || matches!(
            signals.effective_type,
            EffectiveType::Slow2g | EffectiveType::TwoG
        )
        || rtt > 1000
    {
        NetworkQuality::Poor
    } else if signals.effective_type == EffectiveType::ThreeG || rtt > 500 {
        NetworkQuality::Moderate
    } else if signals.downlink_mbps.is_some_and(|d| d >= 10.0) {
        NetworkQuality::Excellent
    } else {
        NetworkQuality::Good
    };

    NetworkInfo {
        quality,
        effective_type: signals.effective_type,
        is_online: signals.is_online,
        is_save_data: signals.save_data,
        is_cellular: signals.is_cellular,
        downlink_mbps: signals.downlink_mbps,
        rtt_ms: signals.rtt_ms,
    }
}

/// Holds the latest classification and publishes changes
///
/// Consumers either read [`NetworkMonitor::current`] on demand or hold a
/// [`watch::Receiver`] from [`NetworkMonitor::subscribe`] to react to
/// connectivity transitions.
#[derive(Debug)]
pub struct NetworkMonitor {
    signals: Mutex<NetworkSignals>,
    tx: watch::Sender<NetworkInfo>,
}

impl NetworkMonitor {
    pub fn new(initial: NetworkSignals) -> Self {
        let (tx, _rx) = watch::channel(classify(&initial));
        Self {
            signals: Mutex::new(initial),
            tx,
        }
    }

    /// Replace the raw signals and reclassify
    ///
    /// Subscribers are only woken when the classification differs from the
    /// current one.
    pub fn update(&self, signals: NetworkSignals) -> NetworkInfo {
        let info = classify(&signals);
        *self.signals.lock().unwrap_or_else(|e| e.into_inner()) = signals;

        let mut previous = None;
        self.tx.send_if_modified(|current| {
            if *current == info {
                return false;
            }
            previous = Some(std::mem::replace(current, info.clone()));
            true
        });

        if let Some(previous) = previous.filter(|p| p.quality != info.quality) {
            tracing::info!(
                from = %previous.quality,
                to = %info.quality,
                "Network quality changed"
            );
        }
        info
    }

    /// Flip only the online flag, keeping the other signals
    pub fn set_online(&self, is_online: bool) -> NetworkInfo {
        let mut signals = self.signals();
        signals.is_online = is_online;
        self.update(signals)
    }

    /// Latest raw signals
    pub fn signals(&self) -> NetworkSignals {
        self.signals
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Latest classification
    pub fn current(&self) -> NetworkInfo {
        self.tx.borrow().clone()
    }

    pub fn quality(&self) -> NetworkQuality {
        self.tx.borrow().quality
    }

    pub fn is_online(&self) -> bool {
        self.tx.borrow().is_online
    }

    /// Receive every future classification
    pub fn subscribe(&self) -> watch::Receiver<NetworkInfo> {
        self.tx.subscribe()
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(NetworkSignals::default())
    }
}
