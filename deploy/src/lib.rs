//! Reliable publication of a large, immutable program image to a ledger that
//! only accepts small fixed-size writes and whose reads lag behind writes.
//!
//! The pipeline stages a payload into a dedicated buffer account through
//! many concurrent chunk writes, verifies convergence by reading the buffer
//! back and comparing bytes (never by trusting write acknowledgements), and
//! only then performs the single install-or-upgrade request, retried with
//! backoff and classified by failure code. [`deploy::process_deploy`] runs
//! the whole pipeline; each stage is also usable on its own.

pub mod buffer;
pub mod chunk;
pub mod config;
pub mod deploy;
pub mod error;
pub mod events;
pub mod finalize;
pub mod pool;
pub mod upload;
pub mod verify;
