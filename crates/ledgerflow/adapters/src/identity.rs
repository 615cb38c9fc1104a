//! Seed-backed signing identities.

use ledgerflow_engine::{FlowError, SigningIdentity, SubmitAuthorization};
use ledgerflow_types::AccountRef;
use serde_json::Value;
use std::fmt;

/// An account whose submissions the server signs from a family seed.
///
/// The seed never appears in `Debug` output or logs.
#[derive(Clone)]
pub struct SeedIdentity {
    account: AccountRef,
    seed: String,
}

impl SeedIdentity {
    pub fn new(account: AccountRef, seed: impl Into<String>) -> Result<Self, FlowError> {
        let seed = seed.into();
        let seed = seed.trim();
        if !seed.starts_with('s') || seed.len() < 20 || !seed.chars().all(char::is_alphanumeric) {
            return Err(FlowError::Configuration(format!(
                "seed for {account} is not a base58 family seed"
            )));
        }
        Ok(Self {
            account,
            seed: seed.to_string(),
        })
    }
}

impl fmt::Debug for SeedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedIdentity")
            .field("account", &self.account)
            .field("seed", &"<redacted>")
            .finish()
    }
}

impl SigningIdentity for SeedIdentity {
    fn account(&self) -> &AccountRef {
        &self.account
    }

    fn authorize(&self, tx_json: &Value) -> Result<SubmitAuthorization, FlowError> {
        let sender = tx_json.get("Account").and_then(Value::as_str);
        if sender != Some(self.account.as_str()) {
            return Err(FlowError::Precondition(format!(
                "{} cannot sign for {}",
                self.account,
                sender.unwrap_or("<no account>")
            )));
        }
        Ok(SubmitAuthorization::ServerSign {
            secret: self.seed.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ACCOUNT: &str = "rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe";
    const SEED: &str = "sEdTM1uX8pu2do5XvTnutH6HsouMaM2";

    #[test]
    fn debug_output_hides_the_seed() {
        let identity = SeedIdentity::new(AccountRef::parse(ACCOUNT).unwrap(), SEED).unwrap();
        let printed = format!("{identity:?}");
        assert!(printed.contains(ACCOUNT));
        assert!(!printed.contains(SEED));
    }

    #[test]
    fn rejects_values_that_are_not_seeds() {
        let account = AccountRef::parse(ACCOUNT).unwrap();
        assert!(SeedIdentity::new(account.clone(), "not-a-seed").is_err());
        assert!(SeedIdentity::new(account, ACCOUNT).is_err());
    }

    #[test]
    fn only_signs_its_own_transactions() {
        let identity = SeedIdentity::new(AccountRef::parse(ACCOUNT).unwrap(), SEED).unwrap();
        let own = identity
            .authorize(&json!({ "TransactionType": "Payment", "Account": ACCOUNT }))
            .unwrap();
        assert_eq!(
            own,
            SubmitAuthorization::ServerSign {
                secret: SEED.to_string()
            }
        );
        let foreign = identity.authorize(&json!({
            "TransactionType": "Payment",
            "Account": "rNB4HFHi7Cqoz9Uv8x6JzBrn4xLBKeQLTt"
        }));
        assert!(foreign.is_err());
    }
}
