//! Account references, transaction references and derived identifiers.

use crate::error::TypesError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Base58 alphabet used by classic ledger addresses.
const ADDRESS_ALPHABET: &str = "rpshnaf39wBUDNEGHJKLM4PQRST7VWXYZ2bcdeCg65jkm8oFqi1tuvAxyz";

// ── Account Reference ────────────────────────────────────────────────

/// A classic (`r`-prefixed) ledger account address.
///
/// Only the textual shape is checked here. Whether the account exists and is
/// funded is a ledger question, answered by the readiness preflight.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountRef(String);

impl AccountRef {
    pub fn parse(address: impl Into<String>) -> Result<Self, TypesError> {
        let address = address.into();
        let well_formed = address.starts_with('r')
            && (25..=35).contains(&address.len())
            && address.chars().all(|c| ADDRESS_ALPHABET.contains(c));
        if !well_formed {
            return Err(TypesError::InvalidAccount(address));
        }
        Ok(Self(address))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Transaction Reference ────────────────────────────────────────────

/// Handle used to look up a submitted transaction (its 256-bit hash, hex).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxRef(String);

impl TxRef {
    pub fn parse(hash: impl Into<String>) -> Result<Self, TypesError> {
        let hash = hash.into();
        if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypesError::InvalidTxRef(hash));
        }
        Ok(Self(hash.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Derived Identifier ───────────────────────────────────────────────

/// Opaque identifier the ledger assigns as a side effect of a successful
/// creation-type transaction (an MPT issuance id, an escrow's sequence).
///
/// Inside the engine these are only created by the identifier resolver,
/// from the metadata of a confirmed transaction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DerivedIdentifier(String);

impl DerivedIdentifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DerivedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
