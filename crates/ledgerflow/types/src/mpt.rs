//! Multi-purpose token issuance parameters.

use crate::error::TypesError;
use serde::{Deserialize, Serialize};
use std::ops::BitOr;

/// Highest transfer fee accepted by the ledger, in tenths of a basis point (50%).
pub const MAX_TRANSFER_FEE: u16 = 50_000;

/// Largest `MaximumAmount` the ledger accepts (63-bit).
const MAX_ISSUANCE_AMOUNT: u64 = 0x7FFF_FFFF_FFFF_FFFF;

/// Upper bound on the encoded metadata blob, in bytes.
const MAX_METADATA_BYTES: usize = 1024;

/// Issuance capability flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MptFlags(u32);

impl MptFlags {
    pub const CAN_LOCK: Self = Self(0x0002);
    pub const REQUIRE_AUTH: Self = Self(0x0004);
    pub const CAN_ESCROW: Self = Self(0x0008);
    pub const CAN_TRADE: Self = Self(0x0010);
    pub const CAN_TRANSFER: Self = Self(0x0020);
    pub const CAN_CLAWBACK: Self = Self(0x0040);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for MptFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Descriptive token metadata, carried on-ledger as hex-encoded compact JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub ticker: String,
    pub description: String,
    pub decimals: u8,
    pub total_supply: String,
    pub asset_class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_case: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_name: Option<String>,
}

impl TokenMetadata {
    pub fn new(name: impl Into<String>, ticker: impl Into<String>, decimals: u8) -> Self {
        Self {
            name: name.into(),
            ticker: ticker.into(),
            description: String::new(),
            decimals,
            total_supply: "0".to_string(),
            asset_class: "other".to_string(),
            icon: None,
            use_case: None,
            issuer_name: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_total_supply(mut self, total_supply: u64) -> Self {
        self.total_supply = total_supply.to_string();
        self
    }

    pub fn with_use_case(mut self, use_case: impl Into<String>) -> Self {
        self.use_case = Some(use_case.into());
        self
    }

    pub fn with_issuer_name(mut self, issuer_name: impl Into<String>) -> Self {
        self.issuer_name = Some(issuer_name.into());
        self
    }

    /// Compact JSON, upper-case hex.
    pub fn to_hex(&self) -> Result<String, TypesError> {
        let bytes =
            serde_json::to_vec(self).map_err(|e| TypesError::Serialization(e.to_string()))?;
        Ok(hex::encode_upper(bytes))
    }
}

/// Parameters of an `MPTokenIssuanceCreate`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MptIssuanceParams {
    /// Decimal places between a whole token and its smallest unit.
    pub asset_scale: u8,
    /// Cap on outstanding units; `None` leaves the ledger default.
    pub maximum_amount: Option<u64>,
    /// Fee charged on holder-to-holder transfers, 0..=50000.
    pub transfer_fee: u16,
    pub flags: MptFlags,
    pub metadata: Option<TokenMetadata>,
}

impl MptIssuanceParams {
    pub fn validate(&self) -> Result<(), TypesError> {
        if self.transfer_fee > MAX_TRANSFER_FEE {
            return Err(TypesError::InvalidIssuance(format!(
                "transfer fee {} exceeds {}",
                self.transfer_fee, MAX_TRANSFER_FEE
            )));
        }
        if self.transfer_fee > 0 && !self.flags.contains(MptFlags::CAN_TRANSFER) {
            return Err(TypesError::InvalidIssuance(
                "a transfer fee requires the can-transfer flag".to_string(),
            ));
        }
        if let Some(maximum) = self.maximum_amount {
            if maximum == 0 || maximum > MAX_ISSUANCE_AMOUNT {
                return Err(TypesError::InvalidIssuance(format!(
                    "maximum amount {maximum} is out of range"
                )));
            }
        }
        if let Some(metadata) = &self.metadata {
            let encoded = metadata.to_hex()?;
            if encoded.len() / 2 > MAX_METADATA_BYTES {
                return Err(TypesError::InvalidIssuance(format!(
                    "metadata is {} bytes, limit is {}",
                    encoded.len() / 2,
                    MAX_METADATA_BYTES
                )));
            }
        }
        Ok(())
    }
}

impl Default for MptIssuanceParams {
    /// A two-decimal demonstration token, transferable, tradable, escrowable
    /// and claw-back capable, with a 1% transfer fee.
    fn default() -> Self {
        Self {
            asset_scale: 2,
            maximum_amount: Some(100_000_000),
            transfer_fee: 1_000,
            flags: MptFlags::CAN_ESCROW
                | MptFlags::CAN_TRADE
                | MptFlags::CAN_TRANSFER
                | MptFlags::CAN_CLAWBACK,
            metadata: Some(
                TokenMetadata::new("DevNet Demo Token", "DDT", 2)
                    .with_description("A demonstration Multi-Purpose Token for devnet testing")
                    .with_total_supply(100_000_000)
                    .with_use_case("Educational demonstration"),
            ),
        }
    }
}
