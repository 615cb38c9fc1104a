//! Ledgerflow data model.
//!
//! Plain data shared by the lifecycle engine and its adapters: account and
//! transaction references, the derived identifiers a ledger assigns as a side
//! effect of confirmation, typed transaction descriptors, amounts, and the
//! closed engine-result vocabulary with its classification.
//!
//! Nothing in this crate performs I/O.

#![deny(unsafe_code)]

pub mod amount;
pub mod descriptor;
pub mod error;
pub mod escrow;
pub mod ids;
pub mod mpt;
pub mod outcome;
pub mod result;

pub use amount::{xrp_to_drops, Amount, Asset, Currency, DROPS_PER_XRP};
pub use descriptor::{EscrowCreateParams, TransactionDescriptor, TxKind};
pub use error::TypesError;
pub use escrow::{from_ripple_time, to_ripple_time, CryptoCondition, RIPPLE_EPOCH_OFFSET};
pub use ids::{AccountRef, DerivedIdentifier, TxRef};
pub use mpt::{MptFlags, MptIssuanceParams, TokenMetadata, MAX_TRANSFER_FEE};
pub use outcome::{ConfirmationOutcome, SubmissionResult, Verdict};
pub use result::{EngineResult, ResultClass, ResultFamily, TER_QUEUED, TES_SUCCESS};
