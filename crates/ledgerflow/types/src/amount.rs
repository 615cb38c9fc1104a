//! Ledger amounts: native drops, issued currencies and MPT units.

use crate::error::TypesError;
use crate::ids::{AccountRef, DerivedIdentifier};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const DROPS_PER_XRP: u64 = 1_000_000;

/// Convert a decimal XRP string into drops without going through floats.
pub fn xrp_to_drops(xrp: &str) -> Result<u64, TypesError> {
    let invalid = || TypesError::InvalidAmount(format!("'{xrp}' is not an XRP quantity"));

    let (whole, fraction) = match xrp.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (xrp, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }
    if fraction.len() > 6 {
        return Err(TypesError::InvalidAmount(format!(
            "'{xrp}' has more than six decimal places"
        )));
    }

    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let padded = format!("{fraction:0<6}");
    let fraction: u64 = padded.parse().map_err(|_| invalid())?;

    whole
        .checked_mul(DROPS_PER_XRP)
        .and_then(|drops| drops.checked_add(fraction))
        .ok_or_else(invalid)
}

// ── Currency ─────────────────────────────────────────────────────────

/// Issued-currency code in wire form: a three letter standard code, or a
/// 160-bit nonstandard code as 40 upper-case hex characters.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    /// Accepts `USD`, a 40-hex code, or a longer ticker such as `RLUSD`, which
    /// is hex encoded and right-padded with zero bytes.
    pub fn new(code: &str) -> Result<Self, TypesError> {
        let invalid = || TypesError::InvalidCurrency(code.to_string());

        if code.eq_ignore_ascii_case("XRP") {
            return Err(invalid());
        }
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Ok(Self(code.to_string()));
        }
        if code.len() == 40 && code.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(Self(code.to_ascii_uppercase()));
        }
        if (4..=20).contains(&code.len()) && code.chars().all(|c| c.is_ascii_graphic()) {
            let mut bytes = code.as_bytes().to_vec();
            bytes.resize(20, 0);
            return Ok(Self(hex::encode_upper(bytes)));
        }
        Err(invalid())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ── Amount ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Amount {
    /// Native amount in drops.
    Drops(u64),
    /// Issued currency held on a trust line.
    Issued {
        currency: Currency,
        issuer: AccountRef,
        value: String,
    },
    /// Multi-purpose token units of a given issuance.
    Mpt {
        issuance_id: DerivedIdentifier,
        value: String,
    },
}

impl Amount {
    pub fn issued(
        currency: Currency,
        issuer: AccountRef,
        value: impl Into<String>,
    ) -> Result<Self, TypesError> {
        let value = value.into();
        let parsed: f64 = value
            .parse()
            .map_err(|_| TypesError::InvalidAmount(format!("'{value}' is not a decimal value")))?;
        if !parsed.is_finite() || parsed <= 0.0 {
            return Err(TypesError::InvalidAmount(format!(
                "'{value}' must be positive"
            )));
        }
        Ok(Self::Issued {
            currency,
            issuer,
            value,
        })
    }

    /// MPT amounts are whole units of the issuance's smallest denomination.
    pub fn mpt(issuance_id: &DerivedIdentifier, units: u64) -> Self {
        Self::Mpt {
            issuance_id: issuance_id.clone(),
            value: units.to_string(),
        }
    }

    /// Wire representation: a string for drops, an object otherwise.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Drops(drops) => Value::String(drops.to_string()),
            Self::Issued {
                currency,
                issuer,
                value,
            } => json!({
                "currency": currency.as_str(),
                "issuer": issuer.as_str(),
                "value": value,
            }),
            Self::Mpt { issuance_id, value } => json!({
                "mpt_issuance_id": issuance_id.as_str(),
                "value": value,
            }),
        }
    }
}

/// Asset designator without a quantity (AMM pool sides).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Asset {
    Xrp,
    Issued {
        currency: Currency,
        issuer: AccountRef,
    },
}

impl Asset {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Xrp => json!({ "currency": "XRP" }),
            Self::Issued { currency, issuer } => json!({
                "currency": currency.as_str(),
                "issuer": issuer.as_str(),
            }),
        }
    }
}
