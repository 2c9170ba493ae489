//! Network liveness monitor.
//!
//! Tracks whether the remote store is reachable. State changes come from two
//! sources: platform connectivity signals and periodic liveness probes. Either
//! source alone is enough to confirm a transition, and each actual change
//! notifies listeners exactly once, in registration order.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::remote::LivenessProbe;

const EXCELLENT_BELOW_MS: u64 = 150;
const GOOD_BELOW_MS: u64 = 400;
const FAIR_BELOW_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkState {
    Online,
    Offline,
}

impl NetworkState {
    const fn from_online(online: bool) -> Self {
        if online {
            Self::Online
        } else {
            Self::Offline
        }
    }
}

impl fmt::Display for NetworkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => f.write_str("online"),
            Self::Offline => f.write_str("offline"),
        }
    }
}

/// Connectivity hint from the host platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformSignal {
    Online,
    Offline,
}

/// Advisory connection quality bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Excellent,
    Good,
    Fair,
    Poor,
    Unavailable,
}

impl QualityTier {
    #[must_use]
    pub const fn from_latency_ms(latency_ms: u64) -> Self {
        if latency_ms < EXCELLENT_BELOW_MS {
            Self::Excellent
        } else if latency_ms < GOOD_BELOW_MS {
            Self::Good
        } else if latency_ms < FAIR_BELOW_MS {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
            Self::Unavailable => "unavailable",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionQuality {
    /// Probe round trip; `None` when the probe failed
    pub latency_ms: Option<u64>,
    pub tier: QualityTier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
    /// Assumed state before the first observation
    pub initially_online: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            initially_online: false,
        }
    }
}

/// Handle returned by [`NetworkMonitor::on_change`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(NetworkState) + Send + Sync>;

/// Transitions waiting to be delivered, in the order they happened
#[derive(Default)]
struct Outbox {
    queue: VecDeque<NetworkState>,
    /// Some caller is already draining `queue`
    delivering: bool,
}

pub struct NetworkMonitor<P> {
    probe: Arc<P>,
    config: MonitorConfig,
    online: AtomicBool,
    /// Orders state changes; listeners are called after it is released
    outbox: Mutex<Outbox>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener: AtomicU64,
}

impl<P: LivenessProbe> NetworkMonitor<P> {
    pub fn new(probe: Arc<P>, config: MonitorConfig) -> Self {
        Self {
            probe,
            online: AtomicBool::new(config.initially_online),
            config,
            outbox: Mutex::new(Outbox::default()),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> NetworkState {
        NetworkState::from_online(self.is_online())
    }

    pub const fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Register a transition listener.
    ///
    /// Listeners run synchronously on the task that observed the change and
    /// must not block. A panicking listener is logged and skipped. A listener
    /// may itself report a state; that transition is delivered once every
    /// listener has seen the current one.
    pub fn on_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(NetworkState) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::SeqCst));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Record an observed connectivity state; returns whether it was a transition
    pub fn observe(&self, online: bool) -> bool {
        {
            let mut outbox = self.outbox.lock().unwrap_or_else(PoisonError::into_inner);
            if self.online.swap(online, Ordering::SeqCst) == online {
                return false;
            }

            let state = NetworkState::from_online(online);
            tracing::info!("Network is now {state}");
            outbox.queue.push_back(state);
            if outbox.delivering {
                return true;
            }
            outbox.delivering = true;
        }

        self.deliver();
        true
    }

    /// Drain queued transitions without holding any lock across a listener
    fn deliver(&self) {
        loop {
            let next = {
                let mut outbox = self.outbox.lock().unwrap_or_else(PoisonError::into_inner);
                let next = outbox.queue.pop_front();
                if next.is_none() {
                    outbox.delivering = false;
                }
                next
            };
            let Some(state) = next else {
                return;
            };

            let listeners: Vec<Listener> = self
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect();

            for (index, listener) in listeners.iter().enumerate() {
                if catch_unwind(AssertUnwindSafe(|| listener(state))).is_err() {
                    tracing::error!("Network listener #{index} panicked while handling {state}");
                }
            }
        }
    }

    /// Force an active liveness probe and record the result
    pub async fn check_now(&self) -> bool {
        let online = self.measure().await.is_some();
        self.observe(online);
        online
    }

    /// Probe once and bucket the round-trip time
    pub async fn test_quality(&self) -> ConnectionQuality {
        let measured = self.measure().await;
        self.observe(measured.is_some());

        measured.map_or(
            ConnectionQuality {
                latency_ms: None,
                tier: QualityTier::Unavailable,
            },
            |latency| {
                let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                ConnectionQuality {
                    latency_ms: Some(latency_ms),
                    tier: QualityTier::from_latency_ms(latency_ms),
                }
            },
        )
    }

    /// React to a platform connectivity event.
    ///
    /// "Offline" is trusted immediately; "online" is confirmed with a probe
    /// because platforms report link state, not reachability.
    pub async fn handle_platform_signal(&self, signal: PlatformSignal) -> bool {
        match signal {
            PlatformSignal::Offline => {
                self.observe(false);
                false
            }
            PlatformSignal::Online => self.check_now().await,
        }
    }

    async fn measure(&self) -> Option<Duration> {
        let started = Instant::now();
        match tokio::time::timeout(self.config.probe_timeout, self.probe.probe()).await {
            Ok(Ok(())) => Some(started.elapsed()),
            Ok(Err(error)) => {
                tracing::debug!("Liveness probe failed: {error}");
                None
            }
            Err(_) => {
                tracing::debug!(
                    "Liveness probe timed out after {:?}",
                    self.config.probe_timeout
                );
                None
            }
        }
    }
}

impl<P: LivenessProbe + 'static> NetworkMonitor<P> {
    /// Probe immediately and then every `probe_interval` until the handle is aborted
    pub fn spawn_probe_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(monitor.config.probe_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                monitor.check_now().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::MemoryRemoteStore;
    use pretty_assertions::assert_eq;

    fn monitor(remote: &Arc<MemoryRemoteStore>) -> NetworkMonitor<MemoryRemoteStore> {
        NetworkMonitor::new(Arc::clone(remote), MonitorConfig::default())
    }

    fn recorder(
        monitor: &NetworkMonitor<MemoryRemoteStore>,
        label: &'static str,
    ) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        monitor.on_change(move |state| sink.lock().unwrap().push(format!("{label}:{state}")));
        seen
    }

    #[test]
    fn quality_tiers_bucket_latency() {
        assert_eq!(QualityTier::from_latency_ms(20), QualityTier::Excellent);
        assert_eq!(QualityTier::from_latency_ms(150), QualityTier::Good);
        assert_eq!(QualityTier::from_latency_ms(999), QualityTier::Fair);
        assert_eq!(QualityTier::from_latency_ms(5_000), QualityTier::Poor);
    }

    #[test]
    fn notifies_once_per_transition_in_registration_order() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let monitor = monitor(&remote);
        let log = Arc::new(Mutex::new(Vec::new()));
        for label in ["first", "second"] {
            let sink = Arc::clone(&log);
            monitor.on_change(move |state| sink.lock().unwrap().push(format!("{label}:{state}")));
        }

        assert!(monitor.observe(true));
        assert!(!monitor.observe(true));
        assert!(monitor.observe(false));
        assert!(!monitor.observe(false));

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "first:online".to_string(),
                "second:online".to_string(),
                "first:offline".to_string(),
                "second:offline".to_string(),
            ]
        );
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let monitor = monitor(&remote);
        monitor.on_change(|_| panic!("listener failure"));
        let seen = recorder(&monitor, "after");

        assert!(monitor.observe(true));
        assert!(monitor.is_online());
        assert_eq!(*seen.lock().unwrap(), vec!["after:online".to_string()]);
    }

    #[test]
    fn listener_reporting_a_state_is_delivered_after_the_current_one() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let monitor = Arc::new(monitor(&remote));
        let log = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&log);
        let weak = Arc::downgrade(&monitor);
        monitor.on_change(move |state| {
            sink.lock().unwrap().push(format!("first:{state}"));
            if state == NetworkState::Online {
                if let Some(monitor) = weak.upgrade() {
                    assert!(monitor.observe(false));
                }
            }
        });
        let sink = Arc::clone(&log);
        monitor.on_change(move |state| sink.lock().unwrap().push(format!("second:{state}")));

        assert!(monitor.observe(true));

        assert!(!monitor.is_online());
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "first:online".to_string(),
                "second:online".to_string(),
                "first:offline".to_string(),
                "second:offline".to_string(),
            ]
        );
    }

    #[test]
    fn removed_listener_is_not_called() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let monitor = monitor(&remote);
        let seen = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&seen);
        let id = monitor.on_change(move |_| *sink.lock().unwrap() += 1);

        assert!(monitor.remove_listener(id));
        assert!(!monitor.remove_listener(id));
        monitor.observe(true);
        assert_eq!(*seen.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn check_now_follows_probe_result() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let monitor = monitor(&remote);
        assert!(!monitor.is_online());

        assert!(monitor.check_now().await);
        assert_eq!(monitor.state(), NetworkState::Online);

        remote.set_reachable(false);
        assert!(!monitor.check_now().await);
        assert_eq!(monitor.state(), NetworkState::Offline);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_probe_counts_as_offline() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let monitor = monitor(&remote);
        monitor.observe(true);

        remote.set_probe_latency(Some(Duration::from_secs(10)));
        assert!(!monitor.check_now().await);
        assert!(!monitor.is_online());

        let quality = monitor.test_quality().await;
        assert_eq!(quality.tier, QualityTier::Unavailable);
        assert_eq!(quality.latency_ms, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quality_reports_latency_tier() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let monitor = monitor(&remote);
        remote.set_probe_latency(Some(Duration::from_millis(250)));

        let quality = monitor.test_quality().await;
        assert_eq!(quality.tier, QualityTier::Good);
        assert!(quality.latency_ms.is_some_and(|ms| ms >= 250));
        assert!(monitor.is_online());
    }

    #[tokio::test]
    async fn platform_signals_drive_state() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let monitor = monitor(&remote);
        let seen = recorder(&monitor, "ui");

        assert!(monitor.handle_platform_signal(PlatformSignal::Online).await);
        assert!(!monitor.handle_platform_signal(PlatformSignal::Offline).await);

        // Link is up but the remote is not reachable: stay offline, no notification
        remote.set_reachable(false);
        assert!(!monitor.handle_platform_signal(PlatformSignal::Online).await);

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["ui:online".to_string(), "ui:offline".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn probe_loop_detects_outage() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let monitor = Arc::new(monitor(&remote));
        let handle = monitor.spawn_probe_loop();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(monitor.is_online());

        remote.set_reachable(false);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!monitor.is_online());

        handle.abort();
    }
}
