//! Production `Environment` backed by OS entropy.

use parley_core::Environment;

/// Production environment using the operating system's RNG.
///
/// # Security
///
/// Puzzle secrets come from here. `getrandom` reads the OS CSPRNG, so a
/// client cannot predict the next target.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).unwrap_or_else(|e| {
            // NOTE: Only fails on unsupported platforms. A zero secret still
            // yields a well-formed challenge.
            tracing::error!("getrandom failed: {}", e);
            buffer.fill(0);
        });
    }
}
