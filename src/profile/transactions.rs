use tracing::{info, warn};

use super::{ActionListIndex, ProfileModule, ACTION, CREATE_ACTION_LIST};
use crate::{
    error::GatewayResult,
    gateway::{submit_and_confirm, FunctionCall, LedgerGateway, TransactionReceipt},
    identity::SigningIdentity,
};

/// State-changing calls into the `profile` module. Each returns only after
/// the transaction is final.
pub struct ActionTransactionClient<'a> {
    gateway: &'a dyn LedgerGateway,
    module: ProfileModule,
}

impl<'a> ActionTransactionClient<'a> {
    pub fn new(gateway: &'a dyn LedgerGateway, module: ProfileModule) -> Self {
        Self { gateway, module }
    }

    /// The contract allocates the next list index; calling twice is allowed.
    pub async fn create_action_list(
        &self,
        identity: &SigningIdentity,
    ) -> GatewayResult<TransactionReceipt> {
        let payload = FunctionCall::new(self.module.function(CREATE_ACTION_LIST), vec![]);
        self.submit(identity, payload).await
    }

    pub async fn record_action(
        &self,
        list_index: ActionListIndex,
        kind: u64,
        message: &str,
        identity: &SigningIdentity,
    ) -> GatewayResult<TransactionReceipt> {
        let payload = FunctionCall::new(
            self.module.function(ACTION),
            vec![list_index.into(), kind.into(), message.into()],
        );
        self.submit(identity, payload).await
    }

    async fn submit(
        &self,
        identity: &SigningIdentity,
        payload: FunctionCall,
    ) -> GatewayResult<TransactionReceipt> {
        let name = payload.function.name.clone();
        match submit_and_confirm(self.gateway, identity, payload).await {
            Ok(receipt) => {
                info!(
                    function = %name,
                    hash = %receipt.hash,
                    sender = %identity.address(),
                    "transaction hash"
                );
                Ok(receipt)
            }
            Err(e) => {
                warn!(
                    function = %name,
                    sender = %identity.address(),
                    error = %e,
                    "transaction failed"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::GatewayError, gateway::MemoryGateway, identity::Address};

    fn setup() -> (MemoryGateway, ProfileModule) {
        let module_address: Address = "0xcafe".parse().unwrap();
        (
            MemoryGateway::new(module_address),
            ProfileModule::new(module_address),
        )
    }

    #[tokio::test]
    async fn receipts_carry_hash_and_function() {
        let (gw, module) = setup();
        let client = ActionTransactionClient::new(&gw, module);
        let alice = SigningIdentity::generate();
        let first = client.create_action_list(&alice).await.unwrap();
        let second = client.create_action_list(&alice).await.unwrap();
        assert!(first.hash.starts_with("0x"));
        assert_ne!(first.hash, second.hash);
        assert!(second.version > first.version);
        assert!(first.function.ends_with("::profile::create_action_list"));
    }

    #[tokio::test]
    async fn out_of_range_list_is_an_execution_error() {
        let (gw, module) = setup();
        let client = ActionTransactionClient::new(&gw, module);
        let alice = SigningIdentity::generate();
        client.create_action_list(&alice).await.unwrap();
        let err = client
            .record_action(5, 1, "download xworld APP", &alice)
            .await
            .unwrap_err();
        match err {
            GatewayError::Execution {
                function,
                vm_status,
                ..
            } => {
                assert!(function.ends_with("::profile::action"));
                assert!(vm_status.contains("EACTION_LIST_NOT_FOUND"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
