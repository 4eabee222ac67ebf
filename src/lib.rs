//! Client for the XWorld `profile` contract.
//!
//! The crate is layered leaf-first:
//!
//! * [`identity`] — Ed25519 signing identities and account addresses.
//! * [`gateway`] — one connection to one ledger network: build, sign and
//!   submit, await finality, view, read resource, fund.
//! * [`profile`] — the action-list transaction and query clients.
//! * [`balance`] — coin balances that read as zero instead of failing.
//! * [`driver`] — the end-to-end run the CLI's `demo` command performs.

pub mod balance;
pub mod config;
pub mod driver;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod profile;

pub use error::{GatewayError, GatewayResult, QueryFailure};
