//! Exponential-backoff reconnection for subscriber connections.
//!
//! [`Reconnector`] is an explicit state machine:
//!
//! ```text
//! Disconnected --start_attempt--> Connecting --connected--> Connected
//!      ^                              |                         |
//!      +------ attempt_failed --------+                         |
//!      +------------------------- disconnected -----------------+
//!
//! Connecting --attempt_failed (budget spent)--> GaveUp
//! ```
//!
//! It knows nothing about sockets. [`reconnect_loop`] drives it against
//! any [`Connector`] until a connection succeeds, the attempt budget runs
//! out, or the [`CancellationToken`] fires.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
    /// Consecutive failed attempts allowed before giving up. `None` retries
    /// forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_attempts: Some(10),
        }
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// An attempt is in flight. `attempt` counts from 1 and resets after a
    /// successful connection.
    Connecting { attempt: u32 },
    Connected,
    /// The attempt budget is spent. Only [`Reconnector::reset`] leaves this.
    GaveUp,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting { attempt } => write!(f, "connecting (attempt {attempt})"),
            Self::Connected => f.write_str("connected"),
            Self::GaveUp => f.write_str("gave up"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconnectError {
    /// The requested event is not valid in the current state.
    #[error("Cannot {event} while {state}")]
    InvalidTransition {
        state: ConnectionState,
        event: &'static str,
    },

    #[error("Gave up after {attempts} failed attempts")]
    GaveUp { attempts: u32 },

    #[error("Reconnect cancelled")]
    Cancelled,
}

/// Connection lifecycle with bounded retries and exponential delay.
#[derive(Debug)]
pub struct Reconnector {
    config: ReconnectConfig,
    state: ConnectionState,
    /// Delay to wait after the next failure.
    delay: Duration,
    /// Consecutive failed attempts since the last successful connection.
    failures: u32,
}

impl Reconnector {
    pub fn new(config: ReconnectConfig) -> Self {
        let delay = config.initial_delay;
        Self {
            config,
            state: ConnectionState::Disconnected,
            delay,
            failures: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// `Disconnected -> Connecting`. Returns the attempt number.
    pub fn start_attempt(&mut self) -> Result<u32, ReconnectError> {
        match self.state {
            ConnectionState::Disconnected => {
                let attempt = self.failures + 1;
                self.state = ConnectionState::Connecting { attempt };
                Ok(attempt)
            }
            ConnectionState::GaveUp => Err(ReconnectError::GaveUp {
                attempts: self.failures,
            }),
            state => Err(ReconnectError::InvalidTransition {
                state,
                event: "start an attempt",
            }),
        }
    }

    /// `Connecting -> Connected`. Resets the failure count and the delay.
    pub fn connected(&mut self) -> Result<(), ReconnectError> {
        self.expect_connecting("complete a connection")?;
        self.state = ConnectionState::Connected;
        self.failures = 0;
        self.delay = self.config.initial_delay;
        Ok(())
    }

    /// `Connecting -> Disconnected` or `Connecting -> GaveUp`.
    ///
    /// Returns how long to wait before the next attempt, or `None` once the
    /// attempt budget is spent.
    pub fn attempt_failed(&mut self) -> Result<Option<Duration>, ReconnectError> {
        self.expect_connecting("fail an attempt")?;
        self.failures += 1;

        if self
            .config
            .max_attempts
            .is_some_and(|max| self.failures >= max)
        {
            self.state = ConnectionState::GaveUp;
            return Ok(None);
        }

        let wait = self.delay;
        self.delay = next_delay(self.delay, &self.config);
        self.state = ConnectionState::Disconnected;
        Ok(Some(wait))
    }

    /// `Connecting -> Disconnected` without counting a failure. Used when an
    /// in-flight attempt is abandoned.
    pub fn abort_attempt(&mut self) -> Result<(), ReconnectError> {
        self.expect_connecting("abort an attempt")?;
        self.state = ConnectionState::Disconnected;
        Ok(())
    }

    /// `Connected -> Disconnected`.
    pub fn disconnected(&mut self) -> Result<(), ReconnectError> {
        match self.state {
            ConnectionState::Connected => {
                self.state = ConnectionState::Disconnected;
                Ok(())
            }
            state => Err(ReconnectError::InvalidTransition {
                state,
                event: "drop a connection",
            }),
        }
    }

    /// Back to a fresh `Disconnected` state with a full attempt budget.
    pub fn reset(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.failures = 0;
        self.delay = self.config.initial_delay;
    }

    fn expect_connecting(&self, event: &'static str) -> Result<(), ReconnectError> {
        match self.state {
            ConnectionState::Connecting { .. } => Ok(()),
            state => Err(ReconnectError::InvalidTransition { state, event }),
        }
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Something that can open a connection.
#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: Send;
    type Error: fmt::Display + Send;

    /// Human-readable target for logs.
    fn target(&self) -> &str;

    async fn connect(&self) -> Result<Self::Connection, Self::Error>;
}

/// Connect with exponential backoff.
///
/// The first attempt is made immediately. Returns the connection once one
/// succeeds, [`ReconnectError::GaveUp`] when the budget is spent, or
/// [`ReconnectError::Cancelled`] if `cancel` fires first. `reconnector`
/// must be `Disconnected` on entry.
pub async fn reconnect_loop<C: Connector>(
    connector: &C,
    reconnector: &mut Reconnector,
    cancel: &CancellationToken,
) -> Result<C::Connection, ReconnectError> {
    loop {
        let attempt = reconnector.start_attempt()?;
        tracing::info!(target_url = connector.target(), attempt, "Connecting to notification hub");

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                reconnector.abort_attempt()?;
                tracing::info!(target_url = connector.target(), "Reconnect cancelled");
                return Err(ReconnectError::Cancelled);
            }
            result = connector.connect() => result,
        };

        match result {
            Ok(conn) => {
                reconnector.connected()?;
                tracing::info!(target_url = connector.target(), attempt, "Connected to notification hub");
                return Ok(conn);
            }
            Err(e) => {
                tracing::warn!(
                    target_url = connector.target(),
                    error = %e,
                    "Connection attempt {attempt} failed",
                );
            }
        }

        let Some(delay) = reconnector.attempt_failed()? else {
            tracing::error!(
                target_url = connector.target(),
                attempts = reconnector.failures(),
                "Giving up on notification hub",
            );
            return Err(ReconnectError::GaveUp {
                attempts: reconnector.failures(),
            });
        };

        // Wait before the next attempt, respecting cancellation.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ReconnectError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use assert_matches::assert_matches;

    use super::*;

    // -- backoff --

    #[test]
    fn next_delay_doubles() {
        let config = ReconnectConfig::default();
        assert_eq!(next_delay(Duration::from_secs(1), &config), Duration::from_secs(2));
    }

    #[test]
    fn next_delay_clamps_at_max() {
        let config = ReconnectConfig {
            max_delay: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(next_delay(Duration::from_secs(8), &config), Duration::from_secs(10));
    }

    #[test]
    fn custom_multiplier() {
        let config = ReconnectConfig {
            multiplier: 3.0,
            max_delay: Duration::from_secs(60),
            ..Default::default()
        };
        assert_eq!(next_delay(Duration::from_secs(2), &config), Duration::from_secs(6));
    }

    #[test]
    fn failure_delays_follow_backoff_sequence() {
        let mut reconnector = Reconnector::new(ReconnectConfig {
            max_attempts: None,
            ..Default::default()
        });
        let expected = [1, 2, 4, 8, 16, 30, 30, 30];

        for &expected_secs in &expected {
            reconnector.start_attempt().unwrap();
            let delay = reconnector.attempt_failed().unwrap().unwrap();
            assert_eq!(delay.as_secs(), expected_secs);
        }
    }

    // -- state machine --

    #[test]
    fn connect_disconnect_cycle() {
        let mut r = Reconnector::new(ReconnectConfig::default());
        assert_eq!(r.state(), ConnectionState::Disconnected);

        assert_eq!(r.start_attempt(), Ok(1));
        assert_eq!(r.state(), ConnectionState::Connecting { attempt: 1 });

        r.connected().unwrap();
        assert_eq!(r.state(), ConnectionState::Connected);

        r.disconnected().unwrap();
        assert_eq!(r.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn success_resets_attempts_and_delay() {
        let mut r = Reconnector::new(ReconnectConfig::default());
        for _ in 0..3 {
            r.start_attempt().unwrap();
            r.attempt_failed().unwrap();
        }
        assert_eq!(r.start_attempt(), Ok(4));
        r.connected().unwrap();
        r.disconnected().unwrap();

        assert_eq!(r.start_attempt(), Ok(1));
        assert_eq!(r.attempt_failed(), Ok(Some(Duration::from_secs(1))));
    }

    #[test]
    fn gives_up_after_budget() {
        let mut r = Reconnector::new(ReconnectConfig {
            max_attempts: Some(2),
            ..Default::default()
        });

        r.start_attempt().unwrap();
        assert!(r.attempt_failed().unwrap().is_some());
        r.start_attempt().unwrap();
        assert_eq!(r.attempt_failed(), Ok(None));
        assert_eq!(r.state(), ConnectionState::GaveUp);

        assert_eq!(r.start_attempt(), Err(ReconnectError::GaveUp { attempts: 2 }));

        r.reset();
        assert_eq!(r.start_attempt(), Ok(1));
    }

    #[test]
    fn rejects_out_of_order_events() {
        let mut r = Reconnector::new(ReconnectConfig::default());

        assert_matches!(
            r.connected(),
            Err(ReconnectError::InvalidTransition { state: ConnectionState::Disconnected, .. })
        );
        assert_matches!(r.disconnected(), Err(ReconnectError::InvalidTransition { .. }));

        r.start_attempt().unwrap();
        assert_matches!(
            r.start_attempt(),
            Err(ReconnectError::InvalidTransition { state: ConnectionState::Connecting { attempt: 1 }, .. })
        );
    }

    // -- driver --

    /// Fails the first `failures` attempts, then succeeds.
    struct FlakyConnector {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyConnector {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Connector for FlakyConnector {
        type Connection = u32;
        type Error = String;

        fn target(&self) -> &str {
            "flaky"
        }

        async fn connect(&self) -> Result<u32, String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(format!("refused ({call})"))
            } else {
                Ok(call)
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn loop_backs_off_until_success() {
        let connector = FlakyConnector::new(3);
        let mut r = Reconnector::new(ReconnectConfig::default());
        let started = tokio::time::Instant::now();

        let conn = reconnect_loop(&connector, &mut r, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(conn, 4);
        assert_eq!(r.state(), ConnectionState::Connected);
        // 1s + 2s + 4s of backoff.
        assert_eq!(started.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn loop_gives_up_when_budget_spent() {
        let connector = FlakyConnector::new(u32::MAX);
        let mut r = Reconnector::new(ReconnectConfig {
            max_attempts: Some(3),
            ..Default::default()
        });

        let err = reconnect_loop(&connector, &mut r, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err, ReconnectError::GaveUp { attempts: 3 });
        assert_eq!(connector.calls.load(Ordering::SeqCst), 3);
        assert_eq!(r.state(), ConnectionState::GaveUp);
    }

    #[tokio::test]
    async fn cancellation_token_stops_reconnect() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let connector = FlakyConnector::new(u32::MAX);
        let mut r = Reconnector::new(ReconnectConfig::default());

        let err = reconnect_loop(&connector, &mut r, &cancel).await.unwrap_err();
        assert_eq!(err, ReconnectError::Cancelled);
        assert_eq!(r.state(), ConnectionState::Disconnected);
    }
}
