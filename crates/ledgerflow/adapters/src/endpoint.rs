//! Network endpoint presets.

use ledgerflow_engine::FlowError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEVNET_URL: &str = "https://s.devnet.rippletest.net:51234";
pub const TESTNET_URL: &str = "https://s.altnet.rippletest.net:51234";

/// JSON-RPC endpoint of a ledger network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Devnet,
    Testnet,
    Custom(String),
}

impl Endpoint {
    pub fn url(&self) -> &str {
        match self {
            Self::Devnet => DEVNET_URL,
            Self::Testnet => TESTNET_URL,
            Self::Custom(url) => url,
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::Devnet
    }
}

impl FromStr for Endpoint {
    type Err = FlowError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "devnet" => Ok(Self::Devnet),
            "testnet" | "altnet" => Ok(Self::Testnet),
            _ => {
                let url = value.trim();
                if url.starts_with("http://") || url.starts_with("https://") {
                    Ok(Self::Custom(url.trim_end_matches('/').to_string()))
                } else {
                    Err(FlowError::Configuration(format!(
                        "endpoint '{value}' is neither a preset (devnet, testnet) nor an http(s) URL"
                    )))
                }
            }
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url())
    }
}
