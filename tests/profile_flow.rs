use xworld::{
    balance::BalanceService,
    error::{GatewayError, QueryFailure},
    gateway::{LedgerGateway, MemoryGateway},
    identity::{Address, SigningIdentity},
    profile::{ActionQueryClient, ActionTransactionClient, ProfileModule, QueryResult},
};

const MODULE: &str = "0xcb6060b12c954f3b580b1533d014590507643469bbb212c50dfbdf7bac1c69a9";

fn ledger() -> (MemoryGateway, ProfileModule) {
    let address: Address = MODULE.parse().unwrap();
    (MemoryGateway::new(address), ProfileModule::new(address))
}

fn counter_or_zero(result: QueryResult<u64>) -> u64 {
    match result {
        QueryResult::Found(n) => n,
        QueryResult::NotFound(_) => 0,
        QueryResult::Failed(diag) => panic!("counter query failed: {diag}"),
    }
}

#[tokio::test]
async fn counter_grows_by_one_per_created_list() {
    let (gw, module) = ledger();
    let txs = ActionTransactionClient::new(&gw, module);
    let queries = ActionQueryClient::new(&gw, module);
    let alice = SigningIdentity::generate();

    let mut previous = counter_or_zero(queries.get_action_list_counter(alice.address()).await);
    assert_eq!(previous, 0);
    for _ in 0..3 {
        txs.create_action_list(&alice).await.unwrap();
        let now = counter_or_zero(queries.get_action_list_counter(alice.address()).await);
        assert_eq!(now, previous + 1);
        previous = now;
    }
}

#[tokio::test]
async fn recorded_action_is_readable_at_previous_count() {
    let (gw, module) = ledger();
    let txs = ActionTransactionClient::new(&gw, module);
    let queries = ActionQueryClient::new(&gw, module);
    let alice = SigningIdentity::generate();

    txs.create_action_list(&alice).await.unwrap();
    txs.create_action_list(&alice).await.unwrap();
    for (kind, msg) in [(1, "first"), (7, "second")] {
        let before = queries
            .get_action_list(alice.address(), 1)
            .await
            .found()
            .and_then(|list| list.action_count())
            .unwrap() as u64;
        txs.record_action(1, kind, msg, &alice).await.unwrap();

        let read = queries.get_action(alice.address(), 1, before).await;
        let again = queries.get_action(alice.address(), 1, before).await;
        assert_eq!(read, again);
        let action = read.found().unwrap();
        assert_eq!(action.list_index, 1);
        assert_eq!(action.kind, kind);
        assert_eq!(action.message, msg);
    }
    // list 0 untouched
    let list0 = queries.get_action_list(alice.address(), 0).await.found().unwrap();
    assert_eq!(list0.action_count(), Some(0));
}

#[tokio::test]
async fn create_then_record_scenario() {
    let (gw, module) = ledger();
    let txs = ActionTransactionClient::new(&gw, module);
    let queries = ActionQueryClient::new(&gw, module);
    let alice = SigningIdentity::generate();

    let h1 = txs.create_action_list(&alice).await.unwrap();
    assert_eq!(
        queries.get_action_list_counter(alice.address()).await,
        QueryResult::Found(1)
    );
    let h2 = txs
        .record_action(0, 1, "download xworld APP", &alice)
        .await
        .unwrap();
    assert_ne!(h1.hash, h2.hash);

    let action = queries
        .get_action(alice.address(), 0, 0)
        .await
        .found()
        .unwrap();
    assert_eq!(action.kind, 1);
    assert_eq!(action.message, "download xworld APP");
}

#[tokio::test]
async fn address_without_profile_reports_no_data() {
    let (gw, module) = ledger();
    let queries = ActionQueryClient::new(&gw, module);
    let stranger = SigningIdentity::generate();

    match queries.get_action(stranger.address(), 0, 0).await {
        QueryResult::NotFound(diag) => {
            assert_eq!(diag.failure, QueryFailure::NoData);
            assert!(diag.function.ends_with("get_action"));
            assert!(diag.message.contains("EPROFILE_NOT_FOUND"));
        }
        other => panic!("expected no data, got {other:?}"),
    }
}

#[tokio::test]
async fn out_of_range_indices_are_not_found() {
    let (gw, module) = ledger();
    let txs = ActionTransactionClient::new(&gw, module);
    let queries = ActionQueryClient::new(&gw, module);
    let alice = SigningIdentity::generate();
    txs.create_action_list(&alice).await.unwrap();
    txs.record_action(0, 1, "only", &alice).await.unwrap();

    for result in [
        queries.get_action(alice.address(), 0, 1).await,
        queries.get_action(alice.address(), 0, u64::MAX).await,
        queries.get_action(alice.address(), 3, 0).await,
    ] {
        assert!(
            matches!(result, QueryResult::NotFound(ref d) if d.failure == QueryFailure::NoData),
            "unexpected {result:?}"
        );
    }
    assert!(matches!(
        queries.get_action_list(alice.address(), 9).await,
        QueryResult::NotFound(_)
    ));
}

#[tokio::test]
async fn identities_do_not_share_lists() {
    let (gw, module) = ledger();
    let txs = ActionTransactionClient::new(&gw, module);
    let queries = ActionQueryClient::new(&gw, module);
    let alice = SigningIdentity::generate();
    let bob = SigningIdentity::generate();
    txs.create_action_list(&alice).await.unwrap();

    let err = txs.record_action(0, 1, "not mine", &bob).await.unwrap_err();
    assert!(err.is_transactional());
    assert!(matches!(err, GatewayError::Execution { .. }));
    assert!(!queries
        .get_action_list_counter(bob.address())
        .await
        .is_found());
}

#[tokio::test]
async fn balances_default_to_zero_and_never_drop_after_funding() {
    let (gw, _) = ledger();
    let balances = BalanceService::new(&gw);
    let bob = SigningIdentity::generate();
    assert_eq!(balances.get_balance(bob.address()).await, 0);

    let before = balances.get_balance(bob.address()).await;
    gw.fund(bob.address(), 100_000_000).await.unwrap();
    assert!(balances.get_balance(bob.address()).await >= before);
    assert_eq!(gw.network().to_string(), "local-sim");
}

#[tokio::test]
async fn gateways_are_independent() {
    let (first, module) = ledger();
    let (second, _) = ledger();
    let alice = SigningIdentity::generate();
    ActionTransactionClient::new(&first, module)
        .create_action_list(&alice)
        .await
        .unwrap();
    assert!(ActionQueryClient::new(&first, module)
        .get_action_list_counter(alice.address())
        .await
        .is_found());
    assert!(!ActionQueryClient::new(&second, module)
        .get_action_list_counter(alice.address())
        .await
        .is_found());
}
