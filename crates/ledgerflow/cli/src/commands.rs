//! Subcommand arguments and what they build.

use clap::Args;
use ledgerflow_adapters::SeedIdentity;
use ledgerflow_engine::{EngineConfig, EscrowPlan, FlowError, MptPlan, RetryPolicy, SigningIdentity};
use ledgerflow_types::{
    xrp_to_drops, AccountRef, Amount, Asset, Currency, MptIssuanceParams, TokenMetadata,
    TransactionDescriptor,
};
use std::sync::Arc;
use std::time::Duration;

/// Retry-bound overrides layered over the engine configuration.
#[derive(Debug, Clone, Default, Args)]
pub struct RetryOverrides {
    /// Submissions allowed for temporary-class results
    #[arg(long, global = true)]
    pub submit_attempts: Option<u32>,

    /// Validation checks per submission
    #[arg(long, global = true)]
    pub confirm_attempts: Option<u32>,

    /// Lookups for a derived identifier
    #[arg(long, global = true)]
    pub identifier_attempts: Option<u32>,

    /// Skip the account existence check before submitting
    #[arg(long, global = true)]
    pub no_preflight: bool,
}

impl RetryOverrides {
    pub fn apply(&self, config: &mut EngineConfig) {
        fn bound(policy: &mut RetryPolicy, attempts: Option<u32>) {
            if let Some(attempts) = attempts {
                policy.max_attempts = attempts;
            }
        }
        bound(&mut config.submission, self.submit_attempts);
        bound(&mut config.confirmation, self.confirm_attempts);
        bound(&mut config.identifier, self.identifier_attempts);
        if self.no_preflight {
            config.preflight_accounts = false;
        }
    }
}

fn identity(address: &str, seed: &str) -> Result<Arc<dyn SigningIdentity>, FlowError> {
    let account = AccountRef::parse(address)?;
    Ok(Arc::new(SeedIdentity::new(account, seed)?))
}

// ── mpt ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Args)]
pub struct MptArgs {
    /// Issuer account address
    #[arg(long, env = "LEDGERFLOW_ISSUER_ADDRESS")]
    pub issuer_address: String,

    /// Issuer family seed
    #[arg(long, env = "LEDGERFLOW_ISSUER_SEED", hide_env_values = true)]
    pub issuer_seed: String,

    /// Holder account address
    #[arg(long, env = "LEDGERFLOW_HOLDER_ADDRESS")]
    pub holder_address: String,

    /// Holder family seed
    #[arg(long, env = "LEDGERFLOW_HOLDER_SEED", hide_env_values = true)]
    pub holder_seed: String,

    /// Units sent to the holder
    #[arg(long, default_value_t = 1000)]
    pub transfer_units: u64,

    /// Decimal places of the token
    #[arg(long)]
    pub asset_scale: Option<u8>,

    /// Cap on outstanding units
    #[arg(long)]
    pub maximum_amount: Option<u64>,

    /// Transfer fee in tenths of a basis point (0-50000)
    #[arg(long)]
    pub transfer_fee: Option<u16>,

    /// Token name for the issuance metadata
    #[arg(long)]
    pub name: Option<String>,

    /// Token ticker for the issuance metadata
    #[arg(long)]
    pub ticker: Option<String>,
}

impl MptArgs {
    pub fn plan(&self) -> Result<MptPlan, FlowError> {
        let mut params = MptIssuanceParams::default();
        if let Some(scale) = self.asset_scale {
            params.asset_scale = scale;
        }
        if let Some(maximum) = self.maximum_amount {
            params.maximum_amount = Some(maximum);
        }
        if let Some(fee) = self.transfer_fee {
            params.transfer_fee = fee;
        }
        if self.name.is_some() || self.ticker.is_some() {
            let name = self.name.clone().unwrap_or_else(|| "Ledgerflow Token".to_string());
            let ticker = self.ticker.clone().unwrap_or_else(|| "LFT".to_string());
            params.metadata = Some(TokenMetadata::new(name, ticker, params.asset_scale));
        }
        params.validate()?;

        Ok(MptPlan::new(
            identity(&self.issuer_address, &self.issuer_seed)?,
            identity(&self.holder_address, &self.holder_seed)?,
        )
        .with_params(params)
        .with_transfer_units(self.transfer_units))
    }
}

// ── escrow ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Args)]
pub struct EscrowArgs {
    /// Account locking the funds
    #[arg(long, env = "LEDGERFLOW_CREATOR_ADDRESS")]
    pub creator_address: String,

    #[arg(long, env = "LEDGERFLOW_CREATOR_SEED", hide_env_values = true)]
    pub creator_seed: String,

    /// Account receiving the funds; it submits the release
    #[arg(long, env = "LEDGERFLOW_DESTINATION_ADDRESS")]
    pub destination_address: String,

    #[arg(long, env = "LEDGERFLOW_DESTINATION_SEED", hide_env_values = true)]
    pub destination_seed: String,

    /// Amount in XRP
    #[arg(long, default_value = "1")]
    pub amount_xrp: String,

    /// Seconds until the escrow can be finished
    #[arg(long, default_value_t = 15)]
    pub finish_after_secs: u64,

    /// Seconds until the escrow can be cancelled
    #[arg(long)]
    pub cancel_after_secs: Option<u64>,
}

impl EscrowArgs {
    pub fn plan(&self) -> Result<EscrowPlan, FlowError> {
        let mut plan = EscrowPlan::new(
            identity(&self.creator_address, &self.creator_seed)?,
            identity(&self.destination_address, &self.destination_seed)?,
            xrp_to_drops(&self.amount_xrp)?,
        )
        .with_finish_delay(Duration::from_secs(self.finish_after_secs));
        if let Some(cancel) = self.cancel_after_secs {
            if cancel <= self.finish_after_secs {
                return Err(FlowError::Configuration(
                    "--cancel-after-secs must exceed --finish-after-secs".to_string(),
                ));
            }
            plan = plan.with_cancel_delay(Duration::from_secs(cancel));
        }
        Ok(plan)
    }
}

// ── pay ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Args)]
pub struct PayArgs {
    #[arg(long, env = "LEDGERFLOW_SENDER_ADDRESS")]
    pub sender_address: String,

    #[arg(long, env = "LEDGERFLOW_SENDER_SEED", hide_env_values = true)]
    pub sender_seed: String,

    /// Receiving account
    #[arg(long)]
    pub destination: String,

    /// XRP amount, or the issued-currency value with --currency
    #[arg(long)]
    pub amount: String,

    /// Issued currency code (e.g. USD or RLUSD)
    #[arg(long, requires = "issuer")]
    pub currency: Option<String>,

    /// Issuer of --currency
    #[arg(long)]
    pub issuer: Option<String>,
}

impl PayArgs {
    pub fn payment(&self) -> Result<(TransactionDescriptor, Arc<dyn SigningIdentity>), FlowError> {
        let sender = identity(&self.sender_address, &self.sender_seed)?;
        let destination = AccountRef::parse(&self.destination)?;
        let amount = match (&self.currency, &self.issuer) {
            (Some(code), Some(issuer)) => Amount::issued(
                Currency::new(code)?,
                AccountRef::parse(issuer)?,
                self.amount.clone(),
            )?,
            (Some(_), None) => {
                return Err(FlowError::Configuration(
                    "--currency requires --issuer".to_string(),
                ))
            }
            _ => Amount::Drops(xrp_to_drops(&self.amount)?),
        };
        let descriptor =
            TransactionDescriptor::payment(sender.account().clone(), &destination, &amount);
        Ok((descriptor, sender))
    }
}

// ── amm ────────────────────────────────────────────────────────────────

/// Single-asset deposit of an issued token into its pool against XRP.
#[derive(Debug, Clone, Args)]
pub struct AmmArgs {
    #[arg(long, env = "LEDGERFLOW_DEPOSITOR_ADDRESS")]
    pub depositor_address: String,

    #[arg(long, env = "LEDGERFLOW_DEPOSITOR_SEED", hide_env_values = true)]
    pub depositor_seed: String,

    /// Pool token currency code
    #[arg(long, default_value = "RLUSD")]
    pub currency: String,

    /// Issuer of the pool token
    #[arg(long)]
    pub issuer: String,

    /// Token value to deposit
    #[arg(long, default_value = "0.5")]
    pub amount: String,
}

impl AmmArgs {
    pub fn deposit(&self) -> Result<(TransactionDescriptor, Arc<dyn SigningIdentity>), FlowError> {
        let depositor = identity(&self.depositor_address, &self.depositor_seed)?;
        let currency = Currency::new(&self.currency)?;
        let issuer = AccountRef::parse(&self.issuer)?;
        let amount = Amount::issued(currency.clone(), issuer.clone(), self.amount.clone())?;
        let descriptor = TransactionDescriptor::amm_deposit_single(
            depositor.account().clone(),
            &amount,
            &Asset::Issued { currency, issuer },
            &Asset::Xrp,
        );
        Ok((descriptor, depositor))
    }
}
