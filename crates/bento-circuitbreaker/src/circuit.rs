use crate::classifier::CallOutcome;
use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Represents the state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    /// Calls pass and their outcomes are recorded.
    Closed = 0,
    /// Calls are rejected until the reset timeout elapses.
    Open = 1,
    /// One trial call decides whether to close or reopen.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    /// Lowercase label used in logs, metrics and health output.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Point-in-time view of a breaker.
///
/// Counters cover the rolling window only and are cleared on every state
/// transition.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitStats {
    /// Breaker name.
    pub name: String,
    /// Current state.
    pub state: CircuitState,
    /// Successful calls in the window.
    pub successes: usize,
    /// Failed calls in the window, timeouts excluded.
    pub failures: usize,
    /// Timed out calls in the window.
    pub timeouts: usize,
    /// Rejected calls in the window.
    pub rejects: usize,
    /// `(failures + timeouts) / volume` as a percentage.
    pub failure_rate: f64,
    /// Time since the last state transition.
    pub time_since_state_change: Duration,
}

impl CircuitStats {
    /// Calls that reached the inner service.
    pub fn volume(&self) -> usize {
        self.successes + self.failures + self.timeouts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordKind {
    Success,
    Failure,
    Timeout,
    Reject,
}

#[derive(Debug, Clone)]
struct CallRecord {
    timestamp: Instant,
    kind: RecordKind,
}

/// Result of asking the circuit for permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Rejected,
    Permitted { trial: bool },
}

pub(crate) struct Circuit {
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    last_state_change: Instant,
    records: VecDeque<CallRecord>,
    trial_in_flight: bool,
}

impl Circuit {
    pub(crate) fn new(state_atomic: Arc<AtomicU8>) -> Self {
        state_atomic.store(CircuitState::Closed as u8, Ordering::Release);
        Self {
            state: CircuitState::Closed,
            state_atomic,
            last_state_change: Instant::now(),
            records: VecDeque::new(),
            trial_in_flight: false,
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    pub(crate) fn try_acquire(&mut self, config: &CircuitBreakerConfig) -> Admission {
        let admission = match self.state {
            CircuitState::Closed => Admission::Permitted { trial: false },
            CircuitState::Open => {
                if self.last_state_change.elapsed() >= config.reset_timeout {
                    self.transition_to(CircuitState::HalfOpen, config);
                    self.trial_in_flight = true;
                    Admission::Permitted { trial: true }
                } else {
                    Admission::Rejected
                }
            }
            CircuitState::HalfOpen => {
                if self.trial_in_flight {
                    Admission::Rejected
                } else {
                    self.trial_in_flight = true;
                    Admission::Permitted { trial: true }
                }
            }
        };

        match admission {
            Admission::Permitted { .. } => {
                config.event_listeners.emit(&CircuitBreakerEvent::CallPermitted {
                    pattern_name: config.name.clone(),
                    timestamp: Instant::now(),
                    state: self.state,
                });

                #[cfg(feature = "metrics")]
                counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "permitted").increment(1);
            }
            Admission::Rejected => {
                self.push(RecordKind::Reject, config);
                config.event_listeners.emit(&CircuitBreakerEvent::CallRejected {
                    pattern_name: config.name.clone(),
                    timestamp: Instant::now(),
                });

                #[cfg(feature = "metrics")]
                counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "rejected").increment(1);
            }
        }

        admission
    }

    pub(crate) fn record(&mut self, outcome: CallOutcome, trial: bool, config: &CircuitBreakerConfig) {
        let deciding_trial = trial && self.state == CircuitState::HalfOpen && self.trial_in_flight;
        // Calls admitted before the last transition no longer count.
        if !deciding_trial && !(self.state == CircuitState::Closed && !trial) {
            return;
        }

        let kind = match outcome {
            CallOutcome::Success => RecordKind::Success,
            CallOutcome::Failure => RecordKind::Failure,
            CallOutcome::Timeout => RecordKind::Timeout,
        };
        self.push(kind, config);

        if outcome.is_failure() {
            config.event_listeners.emit(&CircuitBreakerEvent::FailureRecorded {
                pattern_name: config.name.clone(),
                timestamp: Instant::now(),
                state: self.state,
                timeout: outcome == CallOutcome::Timeout,
            });

            #[cfg(feature = "metrics")]
            counter!("circuitbreaker_failures_total", "circuitbreaker" => config.name.clone()).increment(1);
        } else {
            config.event_listeners.emit(&CircuitBreakerEvent::SuccessRecorded {
                pattern_name: config.name.clone(),
                timestamp: Instant::now(),
                state: self.state,
            });

            #[cfg(feature = "metrics")]
            counter!("circuitbreaker_successes_total", "circuitbreaker" => config.name.clone()).increment(1);
        }

        if deciding_trial {
            self.trial_in_flight = false;
            if outcome.is_failure() {
                self.transition_to(CircuitState::Open, config);
            } else {
                self.transition_to(CircuitState::Closed, config);
            }
        } else {
            self.evaluate_window(config);
        }
    }

    /// Frees the half-open slot when a trial call was dropped before it
    /// produced a result.
    pub(crate) fn release_trial(&mut self) {
        if self.state == CircuitState::HalfOpen {
            self.trial_in_flight = false;
        }
    }

    pub(crate) fn force_open(&mut self, config: &CircuitBreakerConfig) {
        self.transition_to(CircuitState::Open, config);
    }

    pub(crate) fn force_closed(&mut self, config: &CircuitBreakerConfig) {
        self.transition_to(CircuitState::Closed, config);
    }

    pub(crate) fn reset(&mut self) {
        self.state = CircuitState::Closed;
        self.state_atomic
            .store(CircuitState::Closed as u8, Ordering::Release);
        self.last_state_change = Instant::now();
        self.records.clear();
        self.trial_in_flight = false;
    }

    pub(crate) fn stats(&mut self, config: &CircuitBreakerConfig) -> CircuitStats {
        self.cleanup_old_records(config.rolling_window);

        let mut stats = CircuitStats {
            name: config.name.clone(),
            state: self.state,
            successes: 0,
            failures: 0,
            timeouts: 0,
            rejects: 0,
            failure_rate: 0.0,
            time_since_state_change: self.last_state_change.elapsed(),
        };
        for record in &self.records {
            match record.kind {
                RecordKind::Success => stats.successes += 1,
                RecordKind::Failure => stats.failures += 1,
                RecordKind::Timeout => stats.timeouts += 1,
                RecordKind::Reject => stats.rejects += 1,
            }
        }
        let volume = stats.volume();
        if volume > 0 {
            stats.failure_rate = (stats.failures + stats.timeouts) as f64 * 100.0 / volume as f64;
        }
        stats
    }

    fn push(&mut self, kind: RecordKind, config: &CircuitBreakerConfig) {
        self.cleanup_old_records(config.rolling_window);
        self.records.push_back(CallRecord {
            timestamp: Instant::now(),
            kind,
        });
    }

    fn cleanup_old_records(&mut self, window: Duration) {
        let now = Instant::now();
        while let Some(record) = self.records.front() {
            if now.duration_since(record.timestamp) > window {
                self.records.pop_front();
            } else {
                break;
            }
        }
    }

    fn evaluate_window(&mut self, config: &CircuitBreakerConfig) {
        let stats = self.stats(config);
        let volume = stats.volume();
        if volume == 0 || volume < config.volume_threshold {
            return;
        }

        if stats.failure_rate >= config.error_threshold_percentage {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                breaker = %config.name,
                failure_rate = stats.failure_rate,
                volume,
                "failure threshold reached, opening circuit"
            );

            self.transition_to(CircuitState::Open, config);
        }
    }

    fn transition_to(&mut self, state: CircuitState, config: &CircuitBreakerConfig) {
        let from_state = self.state;
        self.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
        self.last_state_change = Instant::now();
        self.records.clear();
        if state != CircuitState::HalfOpen {
            self.trial_in_flight = false;
        }

        if from_state == state {
            return;
        }

        config.event_listeners.emit(&CircuitBreakerEvent::StateTransition {
            pattern_name: config.name.clone(),
            timestamp: Instant::now(),
            from_state,
            to_state: state,
        });

        #[cfg(feature = "tracing")]
        tracing::info!(
            breaker = %config.name,
            from = from_state.as_str(),
            to = state.as_str(),
            "circuit state transition"
        );

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "circuitbreaker" => config.name.clone(),
                "from" => from_state.as_str(),
                "to" => state.as_str()
            )
            .increment(1);
            gauge!("circuitbreaker_state", "circuitbreaker" => config.name.clone())
                .set(state as u8 as f64);
        }
    }
}
