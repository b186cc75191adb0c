//! Orchestrator state machine
//!
//! ```text
//! Idle            --Start-->           ProxyAttempt(0) | DirectAttempt(0)
//! ProxyAttempt(n) --Failure-->         DirectAttempt(n)
//! DirectAttempt(n)--Failure-->         Retry(n+1) while n < max_retries, else Fallback
//! Retry(n)        --BackoffElapsed-->  ProxyAttempt(n) | DirectAttempt(n)
//! *Attempt(n)     --Success-->         Done
//! Fallback        --Synthesized-->     Done
//! ```
//!
//! [`transition`] is pure: the async driver in
//! [`orchestrator`](super::orchestrator) performs the side effects and feeds
//! events back in.

/// Where one `analyze` call currently is. The number is the pass index
/// (0 for the first pass, 1 for the first retry, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    ProxyAttempt(u32),
    DirectAttempt(u32),
    Retry(u32),
    Fallback,
    Done,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Start,
    Success,
    Failure,
    BackoffElapsed,
    Synthesized,
}

/// Static facts the transition function needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Proxy tier is attempted at the start of each pass.
    pub proxy_enabled: bool,
    /// A direct provider credential exists.
    pub direct_available: bool,
    /// Additional passes after the first.
    pub max_retries: u32,
}

impl RetryPolicy {
    /// At least one tier could answer. Without one, retrying only waits.
    pub fn has_live_tier(&self) -> bool {
        self.proxy_enabled || self.direct_available
    }

    fn first_attempt(&self, pass: u32) -> OrchestratorState {
        if self.proxy_enabled {
            OrchestratorState::ProxyAttempt(pass)
        } else {
            OrchestratorState::DirectAttempt(pass)
        }
    }
}

/// Next state for `(state, event)`. Events that do not apply to a state
/// leave it unchanged.
pub fn transition(state: OrchestratorState, event: Event, policy: &RetryPolicy) -> OrchestratorState {
    use OrchestratorState as S;

    match (state, event) {
        (S::Idle, Event::Start) => policy.first_attempt(0),

        (S::ProxyAttempt(_), Event::Success) | (S::DirectAttempt(_), Event::Success) => S::Done,

        // The direct tier is always tried after the proxy, even when it is
        // absent; its attempt then fails immediately.
        (S::ProxyAttempt(n), Event::Failure) => S::DirectAttempt(n),

        (S::DirectAttempt(n), Event::Failure) => {
            if n < policy.max_retries && policy.has_live_tier() {
                S::Retry(n + 1)
            } else {
                S::Fallback
            }
        }

        (S::Retry(n), Event::BackoffElapsed) => policy.first_attempt(n),

        (S::Fallback, Event::Synthesized) => S::Done,

        (state, _) => state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrchestratorState as S;

    const FULL: RetryPolicy = RetryPolicy {
        proxy_enabled: true,
        direct_available: true,
        max_retries: 1,
    };

    /// Drive the machine with every attempt failing.
    fn run_all_failures(policy: &RetryPolicy) -> Vec<OrchestratorState> {
        let mut trace = vec![S::Idle];
        let mut state = transition(S::Idle, Event::Start, policy);
        while state != S::Done {
            trace.push(state);
            let event = match state {
                S::ProxyAttempt(_) | S::DirectAttempt(_) => Event::Failure,
                S::Retry(_) => Event::BackoffElapsed,
                S::Fallback => Event::Synthesized,
                S::Idle => Event::Start,
                S::Done => unreachable!(),
            };
            state = transition(state, event, policy);
        }
        trace.push(S::Done);
        trace
    }

    #[test]
    fn test_full_failure_path() {
        assert_eq!(
            run_all_failures(&FULL),
            vec![
                S::Idle,
                S::ProxyAttempt(0),
                S::DirectAttempt(0),
                S::Retry(1),
                S::ProxyAttempt(1),
                S::DirectAttempt(1),
                S::Fallback,
                S::Done,
            ]
        );
    }

    #[test]
    fn test_attempts_bounded_by_max_retries() {
        for max_retries in 0..4 {
            let policy = RetryPolicy { max_retries, ..FULL };
            let trace = run_all_failures(&policy);
            let proxy = trace.iter().filter(|s| matches!(s, S::ProxyAttempt(_))).count();
            let direct = trace.iter().filter(|s| matches!(s, S::DirectAttempt(_))).count();
            assert_eq!(proxy as u32, max_retries + 1);
            assert_eq!(direct as u32, max_retries + 1);
        }
    }

    #[test]
    fn test_proxy_disabled_starts_direct() {
        let policy = RetryPolicy {
            proxy_enabled: false,
            ..FULL
        };
        assert_eq!(transition(S::Idle, Event::Start, &policy), S::DirectAttempt(0));
        assert_eq!(
            transition(S::Retry(1), Event::BackoffElapsed, &policy),
            S::DirectAttempt(1)
        );
    }

    #[test]
    fn test_no_live_tier_skips_retry() {
        let policy = RetryPolicy {
            proxy_enabled: false,
            direct_available: false,
            max_retries: 1,
        };
        assert_eq!(
            run_all_failures(&policy),
            vec![S::Idle, S::DirectAttempt(0), S::Fallback, S::Done]
        );
    }

    #[test]
    fn test_success_ends_immediately() {
        assert_eq!(transition(S::ProxyAttempt(0), Event::Success, &FULL), S::Done);
        assert_eq!(transition(S::DirectAttempt(1), Event::Success, &FULL), S::Done);
    }

    #[test]
    fn test_irrelevant_events_are_ignored() {
        assert_eq!(transition(S::Done, Event::Start, &FULL), S::Done);
        assert_eq!(transition(S::Retry(1), Event::Success, &FULL), S::Retry(1));
        assert_eq!(transition(S::Idle, Event::Failure, &FULL), S::Idle);
    }
}
