//! Client-side integration status poller.
//!
//! A `StatusProbe` keeps the last observed status and owns at most one
//! recurring timer. Failures never stop the timer; they are cached like any
//! other result.
use crate::metrics_defs::{PROBE_CHECKS, PROBE_CONNECTED};
use crate::source::{ProbeError, StatusSource};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{counter, gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval, timeout};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5_000);
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(60_000);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEnvelope {
    pub is_connected: bool,
    pub last_checked: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<Value>,
}

impl StatusEnvelope {
    fn from_body(body: Value) -> Self {
        StatusEnvelope {
            is_connected: body.get("isConnected") == Some(&Value::Bool(true)),
            last_checked: Utc::now(),
            error: body.get("error").and_then(Value::as_str).map(String::from),
            duration_ms: body.get("duration").and_then(Value::as_u64),
            raw_response: Some(body),
        }
    }

    fn failed(error: &ProbeError) -> Self {
        StatusEnvelope {
            is_connected: false,
            last_checked: Utc::now(),
            error: Some(error.to_string()),
            duration_ms: None,
            raw_response: None,
        }
    }
}

struct ProbeState {
    source: Arc<dyn StatusSource>,
    timeout: Duration,
    cache: RwLock<Option<StatusEnvelope>>,
}

impl ProbeState {
    async fn check(&self) -> StatusEnvelope {
        let started = Instant::now();
        let result = match timeout(self.timeout, self.source.fetch()).await {
            Ok(result) => result,
            Err(_elapsed) => Err(ProbeError::Timeout(self.timeout.as_millis() as u64)),
        };

        let envelope = match result {
            Ok(body) => StatusEnvelope::from_body(body),
            Err(e) => {
                tracing::warn!(error = %e, "status check failed");
                StatusEnvelope::failed(&e)
            }
        };

        let outcome = if envelope.is_connected {
            "connected"
        } else {
            "disconnected"
        };
        counter!(PROBE_CHECKS, "outcome" => outcome).increment(1);
        gauge!(PROBE_CONNECTED).set(if envelope.is_connected { 1.0 } else { 0.0 });
        tracing::debug!(
            connected = envelope.is_connected,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "status checked"
        );

        *self.cache.write() = Some(envelope.clone());
        envelope
    }
}

pub struct StatusProbe {
    state: Arc<ProbeState>,
    period: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl StatusProbe {
    pub fn new(source: Arc<dyn StatusSource>) -> Self {
        Self {
            state: Arc::new(ProbeState {
                source,
                timeout: DEFAULT_TIMEOUT,
                cache: RwLock::new(None),
            }),
            period: DEFAULT_INTERVAL,
            timer: Mutex::new(None),
        }
    }

    /// Overrides the polling period and the per-check timeout.
    pub fn with_schedule(source: Arc<dyn StatusSource>, period: Duration, timeout: Duration) -> Self {
        Self {
            state: Arc::new(ProbeState {
                source,
                timeout,
                cache: RwLock::new(None),
            }),
            period,
            timer: Mutex::new(None),
        }
    }

    /// Runs one check and caches its result.
    pub async fn check_once(&self) -> StatusEnvelope {
        self.state.check().await
    }

    /// Last cached result, `None` until the first check completes.
    pub fn get_cached(&self) -> Option<StatusEnvelope> {
        self.state.cache.read().clone()
    }

    /// Checks now and then once per period, calling `on_update` with every
    /// result. Replaces any timer started earlier.
    pub fn start_monitoring<F>(&self, on_update: F)
    where
        F: Fn(StatusEnvelope) + Send + Sync + 'static,
    {
        let mut timer = self.timer.lock();
        if let Some(previous) = timer.take() {
            previous.abort();
        }

        let state = self.state.clone();
        let period = self.period;
        *timer = Some(tokio::spawn(async move {
            // The first tick completes immediately.
            let mut ticks = interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                on_update(state.check().await);
            }
        }));
    }

    /// Cancels the timer. Safe to call when nothing is running.
    pub fn stop_monitoring(&self) {
        if let Some(handle) = self.timer.lock().take() {
            handle.abort();
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.timer
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for StatusProbe {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}
