//! Engine-result vocabulary.
//!
//! Result codes are grouped by the network into six families identified by a
//! three letter prefix. Parsing is closed: a code outside those families, or a
//! success-family code other than `tesSUCCESS`, is refused rather than guessed
//! at, so a new code needs an explicit mapping here before the engine will act
//! on it.

use crate::error::TypesError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const TES_SUCCESS: &str = "tesSUCCESS";
pub const TER_QUEUED: &str = "terQUEUED";

/// Result code family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultFamily {
    /// `tes`: applied.
    Success,
    /// `tec`: included in a ledger, fee claimed, operation not performed.
    ClaimedFailure,
    /// `tef`: failed, cannot succeed in its current form.
    Failure,
    /// `tel`: local server error, may succeed elsewhere or later.
    Local,
    /// `tem`: malformed.
    Malformed,
    /// `ter`: retry once some prior state changes.
    Retry,
}

impl ResultFamily {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Success => "tes",
            Self::ClaimedFailure => "tec",
            Self::Failure => "tef",
            Self::Local => "tel",
            Self::Malformed => "tem",
            Self::Retry => "ter",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "tes" => Some(Self::Success),
            "tec" => Some(Self::ClaimedFailure),
            "tef" => Some(Self::Failure),
            "tel" => Some(Self::Local),
            "tem" => Some(Self::Malformed),
            "ter" => Some(Self::Retry),
            _ => None,
        }
    }
}

/// How the engine must treat a result code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultClass {
    /// Unconditional success.
    Success,
    /// Relayed but not yet applied (`terQUEUED`); await it, never resubmit.
    Pending,
    /// Retry with a fresh submission, within the resubmission bound.
    Temporary,
    /// Terminal; propagate immediately.
    Permanent,
}

/// A parsed engine result code.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EngineResult {
    family: ResultFamily,
    code: String,
}

impl EngineResult {
    pub fn parse(code: &str) -> Result<Self, TypesError> {
        let unknown = || TypesError::UnknownResultCode(code.to_string());

        let family = code
            .get(..3)
            .and_then(ResultFamily::from_prefix)
            .ok_or_else(unknown)?;
        let suffix = &code[3..];
        let well_formed = !suffix.is_empty()
            && suffix
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
        if !well_formed {
            return Err(unknown());
        }
        if family == ResultFamily::Success && code != TES_SUCCESS {
            return Err(unknown());
        }

        Ok(Self {
            family,
            code: code.to_string(),
        })
    }

    pub fn success() -> Self {
        Self {
            family: ResultFamily::Success,
            code: TES_SUCCESS.to_string(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn family(&self) -> ResultFamily {
        self.family
    }

    pub fn classify(&self) -> ResultClass {
        match self.family {
            ResultFamily::Success => ResultClass::Success,
            ResultFamily::ClaimedFailure | ResultFamily::Failure | ResultFamily::Malformed => {
                ResultClass::Permanent
            }
            ResultFamily::Retry if self.code == TER_QUEUED => ResultClass::Pending,
            ResultFamily::Local | ResultFamily::Retry => ResultClass::Temporary,
        }
    }

    pub fn is_success(&self) -> bool {
        self.classify() == ResultClass::Success
    }

    /// True when a preliminary result means the network took the transaction
    /// for relay: it will reach a validated ledger or expire, and must be
    /// awaited rather than resubmitted.
    pub fn is_relayed(&self) -> bool {
        matches!(self.classify(), ResultClass::Success | ResultClass::Pending)
            || self.family == ResultFamily::ClaimedFailure
    }
}

impl TryFrom<String> for EngineResult {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EngineResult> for String {
    fn from(value: EngineResult) -> Self {
        value.code
    }
}

impl fmt::Display for EngineResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}
