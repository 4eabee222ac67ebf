//! The illustrative run: two identities, an optional new list, one appended
//! action, then the reads that show it landed.

use serde::Serialize;
use tracing::{info, warn};

use crate::{
    balance::{Balance, BalanceService},
    error::GatewayResult,
    gateway::{LedgerGateway, TransactionReceipt},
    identity::{Address, SigningIdentity},
    profile::{
        Action, ActionListIndex, ActionQueryClient, ActionTransactionClient, ProfileModule,
        QueryResult,
    },
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DemoPlan {
    pub create_list: bool,
    pub list_index: ActionListIndex,
    pub kind: u64,
    pub message: String,
    /// Faucet credit for both identities before anything else.
    pub fund_amount: Option<u64>,
}

impl Default for DemoPlan {
    fn default() -> Self {
        Self {
            create_list: true,
            list_index: 0,
            kind: 1,
            message: "download xworld APP".into(),
            fund_amount: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AccountReport {
    pub address: Address,
    pub balance: Balance,
}

#[derive(Debug)]
pub struct DemoReport {
    pub alice: AccountReport,
    pub bob: AccountReport,
    pub created: Option<TransactionReceipt>,
    pub recorded: TransactionReceipt,
    pub counter: QueryResult<u64>,
    /// Read back at the index the new action was appended to; `None` when the
    /// list's length could not be read before recording.
    pub action: Option<QueryResult<Action>>,
}

/// Transactional failures end the run; query failures are part of the report.
pub async fn run_demo(
    gateway: &dyn LedgerGateway,
    module: ProfileModule,
    alice: &SigningIdentity,
    bob: &SigningIdentity,
    plan: &DemoPlan,
) -> GatewayResult<DemoReport> {
    info!(
        alice = %alice.address(),
        bob = %bob.address(),
        network = %gateway.network(),
        "demo run"
    );
    let balances = BalanceService::new(gateway);
    let txs = ActionTransactionClient::new(gateway, module);
    let queries = ActionQueryClient::new(gateway, module);

    if let Some(amount) = plan.fund_amount {
        balances.fund(alice.address(), amount).await?;
        balances.fund(bob.address(), amount).await?;
    }

    let created = if plan.create_list {
        Some(txs.create_action_list(alice).await?)
    } else {
        None
    };

    let action_index = match queries
        .get_action_list(alice.address(), plan.list_index)
        .await
    {
        QueryResult::Found(list) => list.action_count(),
        // recording will abort on a missing list anyway
        QueryResult::NotFound(_) => Some(0),
        QueryResult::Failed(_) => None,
    };
    if action_index.is_none() {
        warn!(
            list_index = plan.list_index,
            "action count unknown, the new action will not be read back"
        );
    }
    let recorded = txs
        .record_action(plan.list_index, plan.kind, &plan.message, alice)
        .await?;

    let counter = queries.get_action_list_counter(alice.address()).await;
    let action = match action_index {
        Some(index) => Some(
            queries
                .get_action(alice.address(), plan.list_index, index as u64)
                .await,
        ),
        None => None,
    };

    Ok(DemoReport {
        alice: AccountReport {
            address: alice.address(),
            balance: balances.get_balance(alice.address()).await,
        },
        bob: AccountReport {
            address: bob.address(),
            balance: balances.get_balance(bob.address()).await,
        },
        created,
        recorded,
        counter,
        action,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use crate::{
        config::Network,
        error::GatewayError,
        gateway::{
            EntryFunction, ExecutedTransaction, MemoryGateway, PendingTransaction, Resource,
            UnsignedTransaction, ViewRequest,
        },
        profile::GET_ACTION_LIST,
    };

    /// Answers `get_action_list` with a payload that has no `actions` array.
    struct OpaqueLists(MemoryGateway);

    #[async_trait]
    impl LedgerGateway for OpaqueLists {
        fn network(&self) -> Network {
            self.0.network()
        }

        async fn build_transaction(
            &self,
            sender: Address,
            payload: EntryFunction,
        ) -> GatewayResult<UnsignedTransaction> {
            self.0.build_transaction(sender, payload).await
        }

        async fn sign_and_submit(
            &self,
            identity: &SigningIdentity,
            txn: UnsignedTransaction,
        ) -> GatewayResult<PendingTransaction> {
            self.0.sign_and_submit(identity, txn).await
        }

        async fn await_finality(&self, hash: &str) -> GatewayResult<ExecutedTransaction> {
            self.0.await_finality(hash).await
        }

        async fn view(&self, request: &ViewRequest) -> GatewayResult<Vec<Value>> {
            if request.function.name == GET_ACTION_LIST {
                return Ok(vec![json!({"owner": "0x1"})]);
            }
            self.0.view(request).await
        }

        async fn read_resource(
            &self,
            address: Address,
            resource_type: &str,
        ) -> GatewayResult<Option<Resource>> {
            self.0.read_resource(address, resource_type).await
        }

        async fn fund(&self, address: Address, amount: u64) -> GatewayResult<()> {
            self.0.fund(address, amount).await
        }
    }

    fn setup() -> (MemoryGateway, ProfileModule) {
        let address: Address = "0xcafe".parse().unwrap();
        (MemoryGateway::new(address), ProfileModule::new(address))
    }

    #[tokio::test]
    async fn default_plan_creates_records_and_reads_back() {
        let (gw, module) = setup();
        let alice = SigningIdentity::generate();
        let bob = SigningIdentity::generate();
        let plan = DemoPlan {
            fund_amount: Some(1_000),
            ..DemoPlan::default()
        };
        let report = run_demo(&gw, module, &alice, &bob, &plan).await.unwrap();
        assert!(report.created.is_some());
        assert_eq!(report.counter, QueryResult::Found(1));
        let action = report.action.unwrap().found().unwrap();
        assert_eq!(action.kind, 1);
        assert_eq!(action.message, "download xworld APP");
        assert_eq!(report.alice.balance, 1_000);
        assert_eq!(report.bob.balance, 1_000);
    }

    #[tokio::test]
    async fn second_run_appends_at_the_next_index() {
        let (gw, module) = setup();
        let alice = SigningIdentity::generate();
        let bob = SigningIdentity::generate();
        run_demo(&gw, module, &alice, &bob, &DemoPlan::default())
            .await
            .unwrap();
        let plan = DemoPlan {
            create_list: false,
            kind: 2,
            message: "share".into(),
            ..DemoPlan::default()
        };
        let report = run_demo(&gw, module, &alice, &bob, &plan).await.unwrap();
        assert!(report.created.is_none());
        let action = report.action.unwrap().found().unwrap();
        assert_eq!((action.kind, action.message.as_str()), (2, "share"));
    }

    #[tokio::test]
    async fn unknown_action_count_skips_the_read_back() {
        let (inner, module) = setup();
        let alice = SigningIdentity::generate();
        let bob = SigningIdentity::generate();
        run_demo(&inner, module, &alice, &bob, &DemoPlan::default())
            .await
            .unwrap();

        let gw = OpaqueLists(inner);
        let plan = DemoPlan {
            create_list: false,
            kind: 9,
            message: "second".into(),
            ..DemoPlan::default()
        };
        let report = run_demo(&gw, module, &alice, &bob, &plan).await.unwrap();
        assert!(report.action.is_none());

        // the action still landed, at index 1 rather than 0
        let stored = ActionQueryClient::new(&gw, module)
            .get_action(alice.address(), 0, 1)
            .await
            .found()
            .unwrap();
        assert_eq!((stored.kind, stored.message.as_str()), (9, "second"));
    }

    #[tokio::test]
    async fn missing_list_stops_the_run() {
        let (gw, module) = setup();
        let alice = SigningIdentity::generate();
        let bob = SigningIdentity::generate();
        let plan = DemoPlan {
            create_list: false,
            ..DemoPlan::default()
        };
        let err = run_demo(&gw, module, &alice, &bob, &plan)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Execution { .. }));
    }
}
