//! Retrying delivery of confirmed gestures to the remote consumer.
//!
//! Each event gets its own delivery attempt budget. Attempts go through a
//! `Transport`; a failed attempt is retried after `RetryPolicy::delay` until
//! the budget is spent, then the event is dropped. There is no queue and
//! nothing is persisted.
//!
//! `Dispatcher::spawn` runs a delivery on a detached thread so the ingestion
//! loop never waits on the network. Deliveries may overlap.

use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::RelayError;
use crate::event::GestureEvent;
use crate::shutdown::{Interrupt, ShutdownSignal};

mod mqtt;
mod websocket;

pub use mqtt::{parse_mqtt_endpoint, MqttEndpoint, MqttTransport};
pub use websocket::WebSocketTransport;

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// One way of getting a payload to the consumer.
pub trait Transport: Send + Sync {
    /// Where payloads go, for log lines.
    fn endpoint(&self) -> &str;

    /// Deliver one payload. An error means this attempt failed.
    fn send(&self, payload: &str) -> Result<()>;
}

/// Pick a transport from the consumer URL scheme.
///
/// - `ws://`, `wss://`: `WebSocketTransport`
/// - `mqtt://`, `mqtts://`: `MqttTransport` (topic from the URL path)
pub fn transport_for_url(url: &str) -> Result<Arc<dyn Transport>> {
    let scheme = url
        .split_once("://")
        .map(|(scheme, _)| scheme)
        .ok_or_else(|| anyhow!("consumer url {} has no scheme", url))?;
    match scheme {
        "ws" | "wss" => Ok(Arc::new(WebSocketTransport::new(url)?)),
        "mqtt" | "mqtts" => Ok(Arc::new(MqttTransport::new(url)?)),
        other => Err(anyhow!("unsupported consumer scheme: {}", other)),
    }
}

/// Attempt budget for one delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least 1.
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.attempts == 0 {
            return Err(anyhow!("retry attempts must be at least 1"));
        }
        Ok(())
    }

    /// Fresh budget for a single operation.
    pub fn arm(&self) -> RetryState {
        RetryState {
            remaining: self.attempts,
            used: 0,
            delay: self.delay,
        }
    }
}

/// Budget for one operation. Never shared between operations.
#[derive(Debug)]
pub struct RetryState {
    remaining: u32,
    used: u32,
    delay: Duration,
}

impl RetryState {
    /// Consume one attempt. Returns false once the budget is spent.
    pub fn begin_attempt(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        self.used += 1;
        true
    }

    pub fn attempts_used(&self) -> u32 {
        self.used
    }

    pub fn has_remaining(&self) -> bool {
        self.remaining > 0
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered { attempts: u32 },
    /// Every attempt failed; the event was dropped.
    Exhausted { attempts: u32 },
    /// Shutdown arrived while waiting to retry; the event was dropped.
    Abandoned { attempts: u32 },
}

impl DispatchOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            DispatchOutcome::Delivered { attempts }
            | DispatchOutcome::Exhausted { attempts }
            | DispatchOutcome::Abandoned { attempts } => *attempts,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered { .. })
    }
}

/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    shutdown: ShutdownSignal,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, retry: RetryPolicy) -> Self {
        Self {
            transport,
            retry,
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Cut retry delays short when `shutdown` is requested.
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }

    /// Deliver `event`, retrying on failure. Blocks for the whole attempt budget.
    pub fn dispatch(&self, event: &GestureEvent) -> DispatchOutcome {
        let payload = match event.to_json() {
            Ok(payload) => payload,
            Err(err) => {
                log::error!("dropping gesture '{}': {:#}", event.label(), err);
                return DispatchOutcome::Exhausted { attempts: 0 };
            }
        };

        let mut retry = self.retry.arm();
        while retry.begin_attempt() {
            let attempt = retry.attempts_used();
            match self.transport.send(&payload) {
                Ok(()) => {
                    log::info!(
                        "gesture '{}' delivered to {} (attempt {}/{})",
                        event.label(),
                        self.endpoint(),
                        attempt,
                        self.retry.attempts
                    );
                    return DispatchOutcome::Delivered { attempts: attempt };
                }
                Err(err) => {
                    let failure = RelayError::dispatch(self.endpoint(), &err);
                    log::warn!("{} (attempt {}/{})", failure, attempt, self.retry.attempts);
                }
            }
            if retry.has_remaining() && !self.shutdown.wait(retry.delay()) {
                log::warn!(
                    "gesture '{}' abandoned after {} attempt(s): shutting down",
                    event.label(),
                    attempt
                );
                return DispatchOutcome::Abandoned { attempts: attempt };
            }
        }

        log::error!(
            "gesture '{}' dropped after {} failed attempt(s) to {}",
            event.label(),
            retry.attempts_used(),
            self.endpoint()
        );
        DispatchOutcome::Exhausted {
            attempts: retry.attempts_used(),
        }
    }

    /// Deliver `event` on a detached thread. The caller may drop the handle.
    pub fn spawn(&self, event: GestureEvent) -> Result<JoinHandle<DispatchOutcome>> {
        let dispatcher = self.clone();
        std::thread::Builder::new()
            .name(format!("dispatch-{}", event.label()))
            .spawn(move || dispatcher.dispatch(&event))
            .map_err(|err| anyhow!("spawn dispatch thread: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Fails the first `failures` sends, then succeeds.
    struct FlakyTransport {
        failures: u32,
        calls: Mutex<Vec<String>>,
    }

    impl FlakyTransport {
        fn new(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Transport for FlakyTransport {
        fn endpoint(&self) -> &str {
            "flaky://test"
        }

        fn send(&self, payload: &str) -> Result<()> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(payload.to_string());
            if calls.len() as u32 <= self.failures {
                return Err(anyhow!("connection refused"));
            }
            Ok(())
        }
    }

    fn fast_retry(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn delivers_on_attempt_after_transient_failures() {
        let transport = FlakyTransport::new(2);
        let dispatcher = Dispatcher::new(transport.clone(), fast_retry(3));
        let outcome = dispatcher.dispatch(&GestureEvent::gesture("fist"));
        assert_eq!(outcome, DispatchOutcome::Delivered { attempts: 3 });
        assert_eq!(transport.calls().len(), 3);
        assert!(transport
            .calls()
            .iter()
            .all(|payload| payload == r#"{"type":"gesture","data":"fist"}"#));
    }

    #[test]
    fn first_attempt_success_uses_one_attempt() {
        let transport = FlakyTransport::new(0);
        let dispatcher = Dispatcher::new(transport.clone(), fast_retry(3));
        assert_eq!(
            dispatcher.dispatch(&GestureEvent::gesture("ok")),
            DispatchOutcome::Delivered { attempts: 1 }
        );
    }

    #[test]
    fn exhausts_after_exactly_bound_attempts() {
        let transport = FlakyTransport::new(10);
        let dispatcher = Dispatcher::new(transport.clone(), fast_retry(3));
        let outcome = dispatcher.dispatch(&GestureEvent::gesture("five"));
        assert_eq!(outcome, DispatchOutcome::Exhausted { attempts: 3 });
        assert_eq!(transport.calls().len(), 3);
    }

    #[test]
    fn each_dispatch_gets_a_fresh_budget() {
        let transport = FlakyTransport::new(3);
        let dispatcher = Dispatcher::new(transport.clone(), fast_retry(3));
        assert!(!dispatcher.dispatch(&GestureEvent::gesture("one")).is_delivered());
        assert_eq!(
            dispatcher.dispatch(&GestureEvent::gesture("one")),
            DispatchOutcome::Delivered { attempts: 1 }
        );
    }

    #[test]
    fn shutdown_abandons_pending_retry() {
        let transport = FlakyTransport::new(10);
        let shutdown = ShutdownSignal::new();
        shutdown.request();
        let dispatcher = Dispatcher::new(
            transport.clone(),
            RetryPolicy {
                attempts: 3,
                delay: Duration::from_secs(30),
            },
        )
        .with_shutdown(shutdown);
        let outcome = dispatcher.dispatch(&GestureEvent::gesture("six"));
        assert_eq!(outcome, DispatchOutcome::Abandoned { attempts: 1 });
        assert_eq!(transport.calls().len(), 1);
    }

    #[test]
    fn spawn_runs_off_thread() -> Result<()> {
        let transport = FlakyTransport::new(1);
        let dispatcher = Dispatcher::new(transport.clone(), fast_retry(3));
        let handle = dispatcher.spawn(GestureEvent::gesture("gun"))?;
        let outcome = handle.join().map_err(|_| anyhow!("dispatch thread panicked"))?;
        assert_eq!(outcome, DispatchOutcome::Delivered { attempts: 2 });
        Ok(())
    }

    #[test]
    fn retry_state_counts_down() {
        let mut state = fast_retry(2).arm();
        assert!(state.begin_attempt());
        assert!(state.has_remaining());
        assert!(state.begin_attempt());
        assert!(!state.begin_attempt());
        assert_eq!(state.attempts_used(), 2);
    }

    #[test]
    fn zero_attempts_rejected() {
        assert!(fast_retry(0).validate().is_err());
    }

    #[test]
    fn transport_chosen_by_scheme() -> Result<()> {
        assert_eq!(
            transport_for_url("ws://127.0.0.1:3000")?.endpoint(),
            "ws://127.0.0.1:3000"
        );
        assert_eq!(
            transport_for_url("mqtt://127.0.0.1:1883/gestures")?.endpoint(),
            "mqtt://127.0.0.1:1883/gestures"
        );
        assert!(transport_for_url("http://127.0.0.1:3000").is_err());
        assert!(transport_for_url("127.0.0.1:3000").is_err());
        Ok(())
    }
}
