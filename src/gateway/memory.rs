//! In-process ledger running the `profile` contract and a coin store.
//!
//! Mirrors the node's admission and execution split: signature, sequence number,
//! expiry and function resolution are checked at submission; contract aborts
//! are committed as failed transactions and only show up at finality.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
    time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use ed25519_dalek::{Signature, VerifyingKey};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use sha3::Sha3_256;
use tracing::debug;

use super::{
    coin_store_type, EntryFunction, ExecutedTransaction, FunctionCall, LedgerGateway, MoveValue,
    PendingTransaction, Resource, UnsignedTransaction, ViewRequest, APTOS_COIN,
};
use crate::{
    config::Network,
    error::{GatewayError, GatewayResult, NodeError, VM_STATUS_ABORTED},
    identity::{Address, SigningIdentity},
    profile::{
        ACTION, CREATE_ACTION_LIST, GET_ACTION, GET_ACTION_LIST, GET_ACTION_LIST_COUNTER,
        PROFILE_MODULE,
    },
};

pub const MEMORY_CHAIN_ID: u8 = 4;
const GAS_PER_CALL: u64 = 10;

/// Abort codes raised by the simulated `profile` module.
pub const EPROFILE_NOT_FOUND: u64 = 1;
pub const EACTION_LIST_NOT_FOUND: u64 = 2;
pub const EACTION_NOT_FOUND: u64 = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
struct StoredAction {
    kind: u64,
    message: String,
}

#[derive(Default)]
struct AccountState {
    sequence_number: u64,
    coin: Option<u64>,
    action_lists: Option<Vec<Vec<StoredAction>>>,
}

enum Outcome {
    Success,
    Abort { vm_status: String },
}

struct CommittedTransaction {
    function: String,
    version: u64,
    outcome: Outcome,
}

#[derive(Default)]
struct LedgerState {
    version: u64,
    accounts: BTreeMap<Address, AccountState>,
    transactions: BTreeMap<String, CommittedTransaction>,
}

impl LedgerState {
    fn account(&mut self, address: Address) -> &mut AccountState {
        self.accounts.entry(address).or_default()
    }

    fn credit_account(&mut self, address: Address, amount: u64) {
        let account = self.account(address);
        let balance = account.coin.get_or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    fn commit(&mut self, hash: String, function: String, outcome: Outcome) {
        self.version += 1;
        let version = self.version;
        self.transactions.insert(
            hash,
            CommittedTransaction {
                function,
                version,
                outcome,
            },
        );
    }
}

/// Bytes an identity signs for `txn` on this ledger.
fn signing_message(txn: &UnsignedTransaction) -> Vec<u8> {
    let mut message = Sha3_256::digest(b"APTOS::RawTransaction").to_vec();
    let mut body = txn.to_request_json();
    body["chain_id"] = json!(txn.chain_id);
    message.extend(body.to_string().into_bytes());
    message
}

fn transaction_hash(message: &[u8], signature: &Signature) -> String {
    let mut hasher = Sha256::new();
    hasher.update(message);
    hasher.update(signature.to_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn rejection(function: &str, code: &str, message: impl Into<String>) -> GatewayError {
    GatewayError::Submission {
        function: function.to_string(),
        detail: NodeError::new(message).with_code(code),
    }
}

/// In-process [`LedgerGateway`] hosting the `profile` module at one address.
pub struct MemoryGateway {
    module_address: Address,
    state: Mutex<LedgerState>,
}

impl MemoryGateway {
    pub fn new(module_address: Address) -> Self {
        Self {
            module_address,
            state: Mutex::new(LedgerState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        // a panic while holding the lock cannot leave the maps half-written
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Admission of a transaction signed elsewhere: auth key, signature, chain,
    /// expiry, function and sequence number, in that order.
    fn submit_signed(
        &self,
        txn: UnsignedTransaction,
        public_key: &VerifyingKey,
        signature: &Signature,
    ) -> GatewayResult<PendingTransaction> {
        let function = txn.payload.function.to_string();
        let signer = Address::from_ed25519_public_key(public_key);
        if signer != txn.sender {
            return Err(rejection(
                &function,
                "INVALID_AUTH_KEY",
                format!("{signer} cannot sign for {}", txn.sender),
            ));
        }
        let message = signing_message(&txn);
        public_key
            .verify_strict(&message, signature)
            .map_err(|_| rejection(&function, "INVALID_SIGNATURE", "signature check failed"))?;
        if txn.chain_id != MEMORY_CHAIN_ID {
            return Err(rejection(&function, "BAD_CHAIN_ID", "wrong chain id"));
        }
        if txn.expiration_timestamp_secs <= unix_now() {
            return Err(rejection(
                &function,
                "TRANSACTION_EXPIRED",
                "transaction expired",
            ));
        }
        self.check_entry(&txn.payload)
            .map_err(|(code, message)| rejection(&function, code, message))?;

        let mut state = self.state();
        let expected = state.account(txn.sender).sequence_number;
        if txn.sequence_number != expected {
            let code = if txn.sequence_number < expected {
                "SEQUENCE_NUMBER_TOO_OLD"
            } else {
                "SEQUENCE_NUMBER_TOO_NEW"
            };
            return Err(rejection(
                &function,
                code,
                format!(
                    "sequence number {} does not match account sequence {}",
                    txn.sequence_number, expected
                ),
            ));
        }

        let hash = transaction_hash(&message, signature);
        state.account(txn.sender).sequence_number += 1;
        let outcome = self.execute(&mut state, txn.sender, &txn.payload);
        debug!(%function, %hash, "committed in memory");
        state.commit(hash.clone(), function, outcome);
        Ok(PendingTransaction {
            hash,
            function: txn.payload.function,
        })
    }

    fn abort_status(&self, name: &str, code: u64) -> String {
        format!(
            "Move abort in {}::{}: {}(0x{:x})",
            self.module_address,
            PROFILE_MODULE,
            name,
            0x60000 + code
        )
    }

    fn abort_message(&self, code: u64) -> String {
        match code {
            EPROFILE_NOT_FOUND => self.abort_status("EPROFILE_NOT_FOUND", code),
            EACTION_LIST_NOT_FOUND => self.abort_status("EACTION_LIST_NOT_FOUND", code),
            _ => self.abort_status("EACTION_NOT_FOUND", code),
        }
    }

    fn is_profile(&self, call: &FunctionCall) -> bool {
        call.function.module_address == self.module_address && call.function.module == PROFILE_MODULE
    }

    /// Function resolution and argument shape, checked before anything runs.
    fn check_entry(&self, call: &EntryFunction) -> Result<(), (&'static str, String)> {
        if !self.is_profile(call) {
            return Err((
                "FUNCTION_RESOLUTION_FAILURE",
                format!("function {} is not published", call.function),
            ));
        }
        let arity_ok = match call.function.name.as_str() {
            CREATE_ACTION_LIST => call.arguments.is_empty(),
            ACTION => matches!(
                call.arguments.as_slice(),
                [MoveValue::U64(_), MoveValue::U64(_), MoveValue::String(_)]
            ),
            _ => {
                return Err((
                    "FUNCTION_RESOLUTION_FAILURE",
                    format!("{} is not an entry function", call.function),
                ))
            }
        };
        if arity_ok {
            Ok(())
        } else {
            Err((
                "NUMBER_OF_ARGUMENTS_MISMATCH",
                format!("bad arguments for {}", call.function),
            ))
        }
    }

    fn execute(&self, state: &mut LedgerState, sender: Address, call: &EntryFunction) -> Outcome {
        let account = state.account(sender);
        match (call.function.name.as_str(), call.arguments.as_slice()) {
            (CREATE_ACTION_LIST, []) => {
                account.action_lists.get_or_insert_with(Vec::new).push(Vec::new());
                Outcome::Success
            }
            (
                ACTION,
                [MoveValue::U64(list), MoveValue::U64(kind), MoveValue::String(message)],
            ) => {
                let Some(lists) = account.action_lists.as_mut() else {
                    return Outcome::Abort {
                        vm_status: self.abort_message(EPROFILE_NOT_FOUND),
                    };
                };
                let Some(list) = usize::try_from(*list).ok().and_then(|i| lists.get_mut(i)) else {
                    return Outcome::Abort {
                        vm_status: self.abort_message(EACTION_LIST_NOT_FOUND),
                    };
                };
                list.push(StoredAction {
                    kind: *kind,
                    message: message.clone(),
                });
                Outcome::Success
            }
            _ => Outcome::Abort {
                vm_status: "FUNCTION_RESOLUTION_FAILURE".into(),
            },
        }
    }

    fn view_abort(&self, function: &str, code: u64) -> GatewayError {
        let detail = NodeError {
            message: format!("Invalid input: {}", self.abort_message(code)),
            error_code: Some("invalid_input".into()),
            vm_error_code: Some(VM_STATUS_ABORTED),
        };
        GatewayError::Query {
            function: function.to_string(),
            failure: detail.classify(400),
            detail,
        }
    }

    fn run_view(&self, state: &LedgerState, request: &ViewRequest) -> GatewayResult<Vec<Value>> {
        let function = request.function.to_string();
        let malformed = |message: String| {
            let detail = NodeError::new(message).with_code("invalid_input");
            GatewayError::Query {
                function: function.clone(),
                failure: detail.classify(400),
                detail,
            }
        };
        if !self.is_profile(request) {
            let detail = NodeError::new(format!("Module not found: {function}"))
                .with_code("module_not_found");
            return Err(GatewayError::Query {
                function: function.clone(),
                failure: detail.classify(404),
                detail,
            });
        }
        let (owner, indices) = match request.arguments.split_first() {
            Some((MoveValue::Address(owner), rest)) => (*owner, rest),
            _ => return Err(malformed(format!("{function} expects an address first"))),
        };
        let mut index_values = Vec::with_capacity(indices.len());
        for arg in indices {
            match arg {
                MoveValue::U64(i) => index_values.push(*i),
                _ => return Err(malformed(format!("{function} expects u64 indices"))),
            }
        }
        let expected = match request.function.name.as_str() {
            GET_ACTION_LIST_COUNTER => 0,
            GET_ACTION_LIST => 1,
            GET_ACTION => 2,
            _ => return Err(malformed(format!("{function} is not a view function"))),
        };
        if index_values.len() != expected {
            return Err(malformed(format!(
                "{function} takes {} arguments, got {}",
                expected + 1,
                request.arguments.len()
            )));
        }

        let lists = state
            .accounts
            .get(&owner)
            .and_then(|a| a.action_lists.as_ref())
            .ok_or_else(|| self.view_abort(&function, EPROFILE_NOT_FOUND))?;
        let list = |idx: u64| {
            usize::try_from(idx)
                .ok()
                .and_then(|i| lists.get(i))
                .ok_or_else(|| self.view_abort(&function, EACTION_LIST_NOT_FOUND))
        };
        let action_json = |a: &StoredAction| json!({"act": a.kind.to_string(), "message": a.message});

        match index_values.as_slice() {
            [] => Ok(vec![json!(lists.len().to_string())]),
            [list_idx] => {
                let actions: Vec<Value> = list(*list_idx)?.iter().map(action_json).collect();
                Ok(vec![json!({ "actions": actions })])
            }
            [list_idx, action_idx] => {
                let action = usize::try_from(*action_idx)
                    .ok()
                    .and_then(|i| list(*list_idx).ok()?.get(i).cloned());
                match (list(*list_idx), action) {
                    (Err(e), _) => Err(e),
                    (Ok(_), None) => Err(self.view_abort(&function, EACTION_NOT_FOUND)),
                    (Ok(_), Some(a)) => Ok(vec![action_json(&a)]),
                }
            }
            _ => Err(malformed(format!("{function}: too many arguments"))),
        }
    }
}

#[async_trait]
impl LedgerGateway for MemoryGateway {
    fn network(&self) -> Network {
        Network::LocalSim
    }

    async fn build_transaction(
        &self,
        sender: Address,
        payload: EntryFunction,
    ) -> GatewayResult<UnsignedTransaction> {
        let sequence_number = self
            .state()
            .accounts
            .get(&sender)
            .map(|a| a.sequence_number)
            .unwrap_or(0);
        Ok(UnsignedTransaction {
            sender,
            sequence_number,
            max_gas_amount: crate::config::DEFAULT_MAX_GAS_AMOUNT,
            gas_unit_price: crate::config::DEFAULT_GAS_UNIT_PRICE,
            expiration_timestamp_secs: unix_now() + crate::config::DEFAULT_EXPIRATION_SECS,
            chain_id: MEMORY_CHAIN_ID,
            payload,
        })
    }

    async fn sign_and_submit(
        &self,
        identity: &SigningIdentity,
        txn: UnsignedTransaction,
    ) -> GatewayResult<PendingTransaction> {
        let signature = identity.sign(&signing_message(&txn));
        self.submit_signed(txn, &identity.public_key(), &signature)
    }

    async fn await_finality(&self, hash: &str) -> GatewayResult<ExecutedTransaction> {
        let state = self.state();
        let committed = state.transactions.get(hash).ok_or_else(|| {
            GatewayError::transport(
                format!("waiting for {hash}"),
                "transaction not found on the local ledger",
            )
        })?;
        match &committed.outcome {
            Outcome::Success => Ok(ExecutedTransaction {
                hash: hash.to_string(),
                function: committed.function.clone(),
                version: committed.version,
                vm_status: "Executed successfully".into(),
                gas_used: GAS_PER_CALL,
            }),
            Outcome::Abort { vm_status } => Err(GatewayError::Execution {
                function: committed.function.clone(),
                hash: hash.to_string(),
                vm_status: vm_status.clone(),
            }),
        }
    }

    async fn view(&self, request: &ViewRequest) -> GatewayResult<Vec<Value>> {
        let state = self.state();
        self.run_view(&state, request)
    }

    async fn read_resource(
        &self,
        address: Address,
        resource_type: &str,
    ) -> GatewayResult<Option<Resource>> {
        if resource_type != coin_store_type(APTOS_COIN) {
            return Ok(None);
        }
        let state = self.state();
        let coin = state.accounts.get(&address).and_then(|a| a.coin);
        Ok(coin.map(|value| Resource {
            resource_type: resource_type.to_string(),
            data: json!({
                "coin": { "value": value.to_string() },
                "frozen": false,
            }),
        }))
    }

    async fn fund(&self, address: Address, amount: u64) -> GatewayResult<()> {
        let mut state = self.state();
        state.credit_account(address, amount);
        let seed = format!("fund:{address}:{}", state.version);
        let hash = format!("0x{}", hex::encode(Sha256::digest(seed.as_bytes())));
        state.commit(hash, "0x1::aptos_account::transfer".into(), Outcome::Success);
        Ok(())
    }
}
