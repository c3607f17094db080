//! Per-connection admission control.
//!
//! Every connection gets a challenge when it is accepted. After that, each
//! request bumps a resend counter; once the counter passes `max_resend` a
//! fresh challenge is issued and the counter restarts. Challenges are
//! advisory: the server keeps serving requests whether or not the client
//! solves them.

use crate::{Challenge, Difficulty, Environment, PuzzleError};

/// Admission control parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionConfig {
    /// Puzzle difficulty in bits.
    pub difficulty: u32,
    /// Requests allowed before a fresh challenge is issued.
    pub max_resend: u32,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self { difficulty: 16, max_resend: 3 }
    }
}

/// Tracks the challenge and request count for one connection.
pub struct AdmissionController<E>
where
    E: Environment,
{
    env: E,
    difficulty: Difficulty,
    max_resend: u32,
    resend: u32,
    current: Option<Challenge>,
}

impl<E> AdmissionController<E>
where
    E: Environment,
{
    /// Create a controller. No challenge is outstanding until [`issue`] is
    /// called.
    ///
    /// [`issue`]: Self::issue
    ///
    /// # Errors
    ///
    /// Returns `PuzzleError::InvalidDifficulty` if the configured difficulty
    /// is out of range.
    pub fn new(config: AdmissionConfig, env: E) -> Result<Self, PuzzleError> {
        Ok(Self {
            env,
            difficulty: Difficulty::new(config.difficulty)?,
            max_resend: config.max_resend,
            resend: 0,
            current: None,
        })
    }

    /// Generate a fresh challenge, replacing any outstanding one, and reset
    /// the counter.
    pub fn issue(&mut self) -> Challenge {
        let challenge = Challenge::generate(self.difficulty, &self.env);
        self.resend = 0;
        self.current = Some(challenge.clone());
        tracing::debug!(digest = %challenge.target_hex(), "issued challenge");
        challenge
    }

    /// Count one request. Returns a fresh challenge when the count exceeds
    /// `max_resend`; the caller transmits it after the request's reply.
    pub fn record_request(&mut self) -> Option<Challenge> {
        self.resend = self.resend.saturating_add(1);
        if self.resend > self.max_resend { Some(self.issue()) } else { None }
    }

    /// Check an answer against the outstanding challenge.
    pub fn verify(&self, candidate: u64) -> bool {
        self.current.as_ref().is_some_and(|challenge| challenge.verify(candidate))
    }

    /// Requests counted since the last challenge.
    pub fn resend_count(&self) -> u32 {
        self.resend
    }

    /// Outstanding challenge, if any.
    pub fn current(&self) -> Option<&Challenge> {
        self.current.as_ref()
    }
}

impl<E> std::fmt::Debug for AdmissionController<E>
where
    E: Environment,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionController")
            .field("difficulty", &self.difficulty.bits())
            .field("max_resend", &self.max_resend)
            .field("resend", &self.resend)
            .field("current", &self.current)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    };

    use super::*;

    /// Counter-based environment: every draw yields the next integer.
    #[derive(Clone, Default)]
    struct CountingEnv(Arc<AtomicU64>);

    impl Environment for CountingEnv {
        fn random_bytes(&self, buffer: &mut [u8]) {
            let value = self.0.fetch_add(1, Ordering::Relaxed).to_be_bytes();
            for (dst, src) in buffer.iter_mut().zip(value.iter().cycle()) {
                *dst = *src;
            }
        }
    }

    fn controller(max_resend: u32) -> AdmissionController<CountingEnv> {
        let config = AdmissionConfig { difficulty: 8, max_resend };
        AdmissionController::new(config, CountingEnv::default()).unwrap()
    }

    #[test]
    fn rejects_invalid_difficulty() {
        let result = AdmissionController::new(
            AdmissionConfig { difficulty: 0, max_resend: 3 },
            CountingEnv::default(),
        );
        assert!(matches!(result, Err(PuzzleError::InvalidDifficulty { .. })));
    }

    #[test]
    fn no_challenge_until_issued() {
        let controller = controller(3);
        assert!(controller.current().is_none());
        assert!(!controller.verify(0));
    }

    #[test]
    fn reissues_after_threshold() {
        let mut controller = controller(3);
        controller.issue();

        assert!(controller.record_request().is_none());
        assert!(controller.record_request().is_none());
        assert!(controller.record_request().is_none());
        assert_eq!(controller.resend_count(), 3);

        // Fourth request exceeds MAX_RESEND = 3
        let fresh = controller.record_request().expect("threshold crossed");
        assert_eq!(controller.resend_count(), 0);
        assert_eq!(controller.current(), Some(&fresh));

        // Counter restarted from zero
        assert!(controller.record_request().is_none());
        assert_eq!(controller.resend_count(), 1);
    }

    #[test]
    fn zero_threshold_reissues_every_request() {
        let mut controller = controller(0);
        assert!(controller.record_request().is_some());
        assert!(controller.record_request().is_some());
    }

    #[test]
    fn verify_uses_latest_challenge() {
        let mut controller = controller(0);
        let first = controller.issue();
        let first_answer = first.solve().unwrap();
        assert!(controller.verify(first_answer));

        let second = controller.record_request().unwrap();
        let second_answer = second.solve().unwrap();
        assert!(controller.verify(second_answer));
        assert_ne!(first, second);
    }
}
