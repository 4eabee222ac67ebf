use tracing::{info, warn};

use crate::{
    error::GatewayResult,
    gateway::{coin_store_type, LedgerGateway, APTOS_COIN},
    identity::Address,
    profile::decode_u64,
};

pub type Balance = u64;

/// Coin balances. Reads never fail: anything but a readable coin store is zero.
pub struct BalanceService<'a> {
    gateway: &'a dyn LedgerGateway,
    coin_type: String,
}

impl<'a> BalanceService<'a> {
    pub fn new(gateway: &'a dyn LedgerGateway) -> Self {
        Self::for_coin(gateway, APTOS_COIN)
    }

    pub fn for_coin(gateway: &'a dyn LedgerGateway, coin_type: &str) -> Self {
        Self {
            gateway,
            coin_type: coin_type.to_string(),
        }
    }

    pub async fn get_balance(&self, address: Address) -> Balance {
        let resource_type = coin_store_type(&self.coin_type);
        let balance = match self.gateway.read_resource(address, &resource_type).await {
            Ok(Some(resource)) => match resource.data.pointer("/coin/value").and_then(decode_u64)
            {
                Some(value) => value,
                None => {
                    warn!(%address, data = %resource.data, "coin store without a readable value");
                    0
                }
            },
            Ok(None) => 0,
            Err(e) => {
                warn!(%address, error = %e, "balance read failed");
                0
            }
        };
        info!(%address, balance, "balance");
        balance
    }

    /// Faucet credit. Only meaningful on networks that run a faucet.
    pub async fn fund(&self, address: Address, amount: u64) -> GatewayResult<Balance> {
        let before = self.get_balance(address).await;
        self.gateway.fund(address, amount).await?;
        let after = self.get_balance(address).await;
        info!(%address, amount, before, after, "account funded");
        Ok(after)
    }
}
