//! Serverless functions for account management and request echoing.
//!
//! * [`account`] deletes a Firebase Authentication account after revoking
//!   its sessions, speaking the callable function protocol from [`callable`].
//! * [`echo`] answers plain HTTP GET and POST requests.
//!
//! Each function has a binary under `src/bin` that serves it on the
//! invocation runtime.
pub mod account;
pub mod callable;
pub mod config;
pub mod credentials;
pub mod echo;
pub mod identity;
pub mod telemetry;
