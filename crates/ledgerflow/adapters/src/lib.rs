//! Ledgerflow Adapters
//!
//! Concrete collaborators for the engine: an HTTP JSON-RPC [`LedgerClient`]
//! and identities that let the server sign from a family seed.
//!
//! [`LedgerClient`]: ledgerflow_engine::LedgerClient

#![deny(unsafe_code)]

pub mod endpoint;
pub mod identity;
pub mod jsonrpc;

pub use endpoint::{Endpoint, DEVNET_URL, TESTNET_URL};
pub use identity::SeedIdentity;
pub use jsonrpc::{parse_submission, JsonRpcLedgerClient};
