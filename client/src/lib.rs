//! Client-side abstraction over the ledger that hosts program and staging
//! buffer accounts.
//!
//! The deployment pipeline in the `loader-deploy` crate only ever talks to
//! the ledger through the [`ledger_client::LedgerClient`] trait defined here.
//! Production embeddings implement the trait on top of their RPC transport
//! and signing machinery; tests use [`mock_ledger::MockLedger`].

pub mod address;
pub mod ledger_client;
pub mod mock_ledger;
pub mod request;
pub mod transport;
