//! Escrow support: ledger epoch time and PREIMAGE-SHA-256 crypto-conditions.

use crate::error::TypesError;
use chrono::{DateTime, TimeZone, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;

/// Seconds between the Unix epoch and the ledger epoch (2000-01-01T00:00:00Z).
pub const RIPPLE_EPOCH_OFFSET: i64 = 946_684_800;

pub fn to_ripple_time(at: DateTime<Utc>) -> Result<u32, TypesError> {
    let seconds = at.timestamp() - RIPPLE_EPOCH_OFFSET;
    u32::try_from(seconds).map_err(|_| TypesError::TimeOutOfRange(at.to_rfc3339()))
}

pub fn from_ripple_time(seconds: u32) -> DateTime<Utc> {
    Utc.timestamp_opt(RIPPLE_EPOCH_OFFSET + i64::from(seconds), 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// A condition/fulfillment pair.
///
/// The condition is published with `EscrowCreate`; the fulfillment reveals the
/// preimage and is only handed to `EscrowFinish`.
#[derive(Clone, PartialEq, Eq)]
pub struct CryptoCondition {
    condition: String,
    fulfillment: String,
}

impl CryptoCondition {
    pub fn generate() -> Self {
        let mut preimage = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut preimage);
        Self::from_preimage(&preimage)
    }

    pub fn from_preimage(preimage: &[u8; 32]) -> Self {
        let digest = Sha256::digest(preimage);

        // type 0 (preimage-sha-256), fingerprint, cost = 32
        let mut condition = vec![0xA0, 0x25, 0x80, 0x20];
        condition.extend_from_slice(&digest);
        condition.extend_from_slice(&[0x81, 0x01, 0x20]);

        let mut fulfillment = vec![0xA0, 0x22, 0x80, 0x20];
        fulfillment.extend_from_slice(preimage);

        Self {
            condition: hex::encode_upper(condition),
            fulfillment: hex::encode_upper(fulfillment),
        }
    }

    pub fn condition(&self) -> &str {
        &self.condition
    }

    pub fn fulfillment(&self) -> &str {
        &self.fulfillment
    }
}

impl fmt::Debug for CryptoCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoCondition")
            .field("condition", &self.condition)
            .field("fulfillment", &"<redacted>")
            .finish()
    }
}
