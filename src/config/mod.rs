use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

use crate::identity::Address;

/// Where the XWorld `profile` module is published.
pub const DEFAULT_MODULE_ADDRESS: &str =
    "0xcb6060b12c954f3b580b1533d014590507643469bbb212c50dfbdf7bac1c69a9";

pub const DEFAULT_MAX_GAS_AMOUNT: u64 = 200_000;
pub const DEFAULT_GAS_UNIT_PRICE: u64 = 100;
pub const DEFAULT_EXPIRATION_SECS: u64 = 20;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_FINALITY_TIMEOUT: Duration = Duration::from_secs(60);

/// Ledger environment a gateway connects to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    Devnet,
    Testnet,
    Mainnet,
    /// A node started with `aptos node run-local-testnet`.
    Local,
    /// In-process ledger, no node required.
    LocalSim,
}

impl Network {
    pub fn node_url(&self) -> Option<&'static str> {
        match self {
            Network::Devnet => Some("https://api.devnet.aptoslabs.com/v1"),
            Network::Testnet => Some("https://api.testnet.aptoslabs.com/v1"),
            Network::Mainnet => Some("https://api.mainnet.aptoslabs.com/v1"),
            Network::Local => Some("http://127.0.0.1:8080/v1"),
            Network::LocalSim => None,
        }
    }

    pub fn faucet_url(&self) -> Option<&'static str> {
        match self {
            Network::Devnet => Some("https://faucet.devnet.aptoslabs.com"),
            Network::Testnet => Some("https://faucet.testnet.aptoslabs.com"),
            Network::Local => Some("http://127.0.0.1:8081"),
            Network::Mainnet | Network::LocalSim => None,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Devnet => "devnet",
            Network::Testnet => "testnet",
            Network::Mainnet => "mainnet",
            Network::Local => "local",
            Network::LocalSim => "local-sim",
        };
        f.write_str(name)
    }
}

/// Everything a gateway needs to reach one network. Overrides win over the
/// per-network defaults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayConfig {
    pub network: Network,
    pub node_url: Option<String>,
    pub faucet_url: Option<String>,
    pub max_gas_amount: u64,
    pub gas_unit_price: u64,
    pub expiration_secs: u64,
    pub poll_interval: Duration,
    pub finality_timeout: Duration,
}

impl GatewayConfig {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            node_url: None,
            faucet_url: None,
            max_gas_amount: DEFAULT_MAX_GAS_AMOUNT,
            gas_unit_price: DEFAULT_GAS_UNIT_PRICE,
            expiration_secs: DEFAULT_EXPIRATION_SECS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            finality_timeout: DEFAULT_FINALITY_TIMEOUT,
        }
    }

    pub fn with_node_url(mut self, url: impl Into<String>) -> Self {
        self.node_url = Some(url.into());
        self
    }

    pub fn with_faucet_url(mut self, url: impl Into<String>) -> Self {
        self.faucet_url = Some(url.into());
        self
    }

    pub fn with_finality_timeout(mut self, timeout: Duration) -> Self {
        self.finality_timeout = timeout;
        self
    }

    /// Node REST root without a trailing slash.
    pub fn resolved_node_url(&self) -> Option<String> {
        self.node_url
            .as_deref()
            .or(self.network.node_url())
            .map(|url| url.trim_end_matches('/').to_string())
    }

    pub fn resolved_faucet_url(&self) -> Option<String> {
        self.faucet_url
            .as_deref()
            .or(self.network.faucet_url())
            .map(|url| url.trim_end_matches('/').to_string())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new(Network::Devnet)
    }
}

/// Gateway settings plus the address the `profile` module lives at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub gateway: GatewayConfig,
    pub module_address: Address,
}

impl ClientConfig {
    pub fn new(gateway: GatewayConfig, module_address: Address) -> Self {
        Self {
            gateway,
            module_address,
        }
    }
}
