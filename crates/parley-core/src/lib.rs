//! Sans-IO protocol logic for the Parley chat service.
//!
//! Nothing in this crate touches a socket. The registry returns routing
//! actions that the server executes, and the admission controller hands back
//! challenges for the server to transmit.
//!
//! ## Architecture
//!
//! ```text
//! parley-core
//!   ├─ Environment          (randomness source, seedable in tests)
//!   ├─ Registry             (accounts, offline queues, connection bindings)
//!   ├─ Pattern              (glob matching for list_account)
//!   ├─ Challenge            (proof-of-work puzzle)
//!   └─ AdmissionController  (per-connection resend counter)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod admission;
pub mod env;
pub mod error;
pub mod glob;
pub mod puzzle;
pub mod registry;

pub use admission::{AdmissionConfig, AdmissionController};
pub use env::Environment;
pub use error::{PuzzleError, RegistryError};
pub use glob::Pattern;
pub use puzzle::{Challenge, Difficulty};
pub use registry::{ConnectionId, LoginOutcome, Registry, Route};
