//! Typed transaction descriptors.
//!
//! A descriptor is the unsigned request for one ledger operation. Fields are
//! fixed at construction; there are no mutators, so the value handed to the
//! submission gateway is the value recorded in the workflow journal.

use crate::amount::{Amount, Asset};
use crate::error::TypesError;
use crate::ids::{AccountRef, DerivedIdentifier};
use crate::mpt::MptIssuanceParams;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// AMM deposit of a single pool asset.
const TF_SINGLE_ASSET: u32 = 0x0008_0000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TxKind {
    MpTokenIssuanceCreate,
    MpTokenAuthorize,
    Payment,
    EscrowCreate,
    EscrowFinish,
    EscrowCancel,
    AmmDeposit,
}

impl TxKind {
    pub fn transaction_type(self) -> &'static str {
        match self {
            Self::MpTokenIssuanceCreate => "MPTokenIssuanceCreate",
            Self::MpTokenAuthorize => "MPTokenAuthorize",
            Self::Payment => "Payment",
            Self::EscrowCreate => "EscrowCreate",
            Self::EscrowFinish => "EscrowFinish",
            Self::EscrowCancel => "EscrowCancel",
            Self::AmmDeposit => "AMMDeposit",
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.transaction_type())
    }
}

/// Parameters of an `EscrowCreate`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowCreateParams {
    pub destination: AccountRef,
    pub amount_drops: u64,
    /// Ledger-epoch seconds after which the escrow may be finished.
    pub finish_after: Option<u32>,
    /// Ledger-epoch seconds after which the escrow may be cancelled.
    pub cancel_after: Option<u32>,
    /// Hex crypto-condition the finisher must fulfil.
    pub condition: Option<String>,
}

impl EscrowCreateParams {
    pub fn validate(&self) -> Result<(), TypesError> {
        if self.amount_drops == 0 {
            return Err(TypesError::InvalidEscrow("amount must be positive".into()));
        }
        if self.finish_after.is_none() && self.condition.is_none() {
            return Err(TypesError::InvalidEscrow(
                "either a finish time or a condition is required".into(),
            ));
        }
        if let (Some(finish), Some(cancel)) = (self.finish_after, self.cancel_after) {
            if cancel <= finish {
                return Err(TypesError::InvalidEscrow(
                    "cancel time must be after finish time".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Request for one ledger operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionDescriptor {
    kind: TxKind,
    sender: AccountRef,
    fields: BTreeMap<String, Value>,
}

impl TransactionDescriptor {
    fn new(kind: TxKind, sender: AccountRef) -> Self {
        Self {
            kind,
            sender,
            fields: BTreeMap::new(),
        }
    }

    fn with(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    // ── Constructors ─────────────────────────────────────────────────

    pub fn mpt_issuance_create(
        issuer: AccountRef,
        params: &MptIssuanceParams,
    ) -> Result<Self, TypesError> {
        params.validate()?;

        let mut descriptor = Self::new(TxKind::MpTokenIssuanceCreate, issuer)
            .with("AssetScale", json!(params.asset_scale))
            .with("Flags", json!(params.flags.bits()));
        if params.transfer_fee > 0 {
            descriptor = descriptor.with("TransferFee", json!(params.transfer_fee));
        }
        if let Some(maximum) = params.maximum_amount {
            descriptor = descriptor.with("MaximumAmount", json!(maximum.to_string()));
        }
        if let Some(metadata) = &params.metadata {
            descriptor = descriptor.with("MPTokenMetadata", json!(metadata.to_hex()?));
        }
        Ok(descriptor)
    }

    /// Holder opts in to receiving units of an issuance.
    pub fn mpt_authorize(holder: AccountRef, issuance_id: &DerivedIdentifier) -> Self {
        Self::new(TxKind::MpTokenAuthorize, holder)
            .with("MPTokenIssuanceID", json!(issuance_id.as_str()))
    }

    pub fn payment(sender: AccountRef, destination: &AccountRef, amount: &Amount) -> Self {
        Self::new(TxKind::Payment, sender)
            .with("Destination", json!(destination.as_str()))
            .with("Amount", amount.to_json())
    }

    pub fn escrow_create(
        creator: AccountRef,
        params: &EscrowCreateParams,
    ) -> Result<Self, TypesError> {
        params.validate()?;

        let mut descriptor = Self::new(TxKind::EscrowCreate, creator)
            .with("Destination", json!(params.destination.as_str()))
            .with("Amount", Amount::Drops(params.amount_drops).to_json());
        if let Some(finish_after) = params.finish_after {
            descriptor = descriptor.with("FinishAfter", json!(finish_after));
        }
        if let Some(cancel_after) = params.cancel_after {
            descriptor = descriptor.with("CancelAfter", json!(cancel_after));
        }
        if let Some(condition) = &params.condition {
            descriptor = descriptor.with("Condition", json!(condition));
        }
        Ok(descriptor)
    }

    /// `offer_sequence` is the sequence of the owner's `EscrowCreate`.
    pub fn escrow_finish(
        finisher: AccountRef,
        owner: &AccountRef,
        offer_sequence: u32,
        condition: Option<(&str, &str)>,
    ) -> Self {
        let mut descriptor = Self::new(TxKind::EscrowFinish, finisher)
            .with("Owner", json!(owner.as_str()))
            .with("OfferSequence", json!(offer_sequence));
        if let Some((condition, fulfillment)) = condition {
            descriptor = descriptor
                .with("Condition", json!(condition))
                .with("Fulfillment", json!(fulfillment));
        }
        descriptor
    }

    pub fn escrow_cancel(account: AccountRef, owner: &AccountRef, offer_sequence: u32) -> Self {
        Self::new(TxKind::EscrowCancel, account)
            .with("Owner", json!(owner.as_str()))
            .with("OfferSequence", json!(offer_sequence))
    }

    /// Single-asset deposit into an existing AMM pool.
    pub fn amm_deposit_single(
        account: AccountRef,
        amount: &Amount,
        asset: &Asset,
        asset2: &Asset,
    ) -> Self {
        Self::new(TxKind::AmmDeposit, account)
            .with("Amount", amount.to_json())
            .with("Asset", asset.to_json())
            .with("Asset2", asset2.to_json())
            .with("Flags", json!(TF_SINGLE_ASSET))
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn kind(&self) -> TxKind {
        self.kind
    }

    pub fn sender(&self) -> &AccountRef {
        &self.sender
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// The issuance this descriptor refers to, whether as `MPTokenIssuanceID`
    /// or inside an MPT `Amount`.
    pub fn mpt_issuance_id(&self) -> Option<&str> {
        self.field("MPTokenIssuanceID")
            .or_else(|| self.field("Amount").and_then(|a| a.get("mpt_issuance_id")))
            .and_then(Value::as_str)
    }

    /// Unsigned transaction JSON, leaving fee/sequence to be autofilled.
    pub fn to_tx_json(&self) -> Value {
        let mut object = Map::new();
        object.insert("TransactionType".into(), json!(self.kind.transaction_type()));
        object.insert("Account".into(), json!(self.sender.as_str()));
        for (name, value) in &self.fields {
            object.insert(name.clone(), value.clone());
        }
        Value::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escrow::CryptoCondition;

    fn issuer() -> AccountRef {
        AccountRef::parse("rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe").unwrap()
    }

    fn holder() -> AccountRef {
        AccountRef::parse("rNB4HFHi7Cqoz9Uv8x6JzBrn4xLBKeQLTt").unwrap()
    }

    #[test]
    fn issuance_create_carries_demo_fields() {
        let descriptor =
            TransactionDescriptor::mpt_issuance_create(issuer(), &MptIssuanceParams::default())
                .unwrap();
        let tx = descriptor.to_tx_json();
        assert_eq!(tx["TransactionType"], "MPTokenIssuanceCreate");
        assert_eq!(tx["Account"], issuer().as_str());
        assert_eq!(tx["AssetScale"], 2);
        assert_eq!(tx["MaximumAmount"], "100000000");
        assert_eq!(tx["TransferFee"], 1000);
        assert_eq!(tx["Flags"], 0x78);
        assert!(tx["MPTokenMetadata"].as_str().unwrap().len() > 10);
    }

    #[test]
    fn authorize_and_payment_reference_the_issuance() {
        let id = DerivedIdentifier::new("ABCD1234");
        let authorize = TransactionDescriptor::mpt_authorize(holder(), &id);
        assert_eq!(authorize.mpt_issuance_id(), Some("ABCD1234"));
        assert_eq!(authorize.sender(), &holder());

        let payment =
            TransactionDescriptor::payment(issuer(), &holder(), &Amount::mpt(&id, 1000));
        assert_eq!(payment.mpt_issuance_id(), Some("ABCD1234"));
        assert_eq!(payment.to_tx_json()["Amount"]["value"], "1000");
        assert_eq!(payment.to_tx_json()["Destination"], holder().as_str());
    }

    #[test]
    fn escrow_descriptors() {
        let cc = CryptoCondition::from_preimage(&[3u8; 32]);
        let params = EscrowCreateParams {
            destination: holder(),
            amount_drops: 1_000_000,
            finish_after: Some(800_000_000),
            cancel_after: None,
            condition: Some(cc.condition().to_string()),
        };
        let create = TransactionDescriptor::escrow_create(issuer(), &params).unwrap();
        assert_eq!(create.to_tx_json()["Amount"], "1000000");
        assert_eq!(create.to_tx_json()["Condition"], cc.condition());

        let finish = TransactionDescriptor::escrow_finish(
            holder(),
            &issuer(),
            7,
            Some((cc.condition(), cc.fulfillment())),
        );
        assert_eq!(finish.to_tx_json()["OfferSequence"], 7);
        assert_eq!(finish.to_tx_json()["Owner"], issuer().as_str());

        let unconditioned = EscrowCreateParams {
            finish_after: None,
            condition: None,
            ..params
        };
        assert!(TransactionDescriptor::escrow_create(issuer(), &unconditioned).is_err());
    }

    #[test]
    fn amm_deposit_single_asset_flag() {
        let deposit = TransactionDescriptor::amm_deposit_single(
            issuer(),
            &Amount::Drops(10),
            &Asset::Xrp,
            &Asset::Xrp,
        );
        assert_eq!(deposit.to_tx_json()["Flags"], 0x0008_0000_u32);
        assert_eq!(deposit.kind().to_string(), "AMMDeposit");
    }
}
