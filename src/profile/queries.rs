use std::fmt;

use serde_json::Value;
use tracing::{debug, warn};

use super::{
    decode_u64, Action, ActionListIndex, ActionListSummary, ProfileModule, GET_ACTION,
    GET_ACTION_LIST, GET_ACTION_LIST_COUNTER,
};
use crate::{
    error::{GatewayError, QueryFailure},
    gateway::{FunctionCall, LedgerGateway, MoveValue},
    identity::Address,
};

/// Outcome of a read-only call. Reads never fail past this boundary.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryResult<T> {
    Found(T),
    /// The contract has nothing at this address/index (never created or out of range).
    NotFound(QueryDiagnostic),
    /// The node could not answer or the request/response was malformed.
    Failed(QueryDiagnostic),
}

impl<T> QueryResult<T> {
    pub fn found(self) -> Option<T> {
        match self {
            QueryResult::Found(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, QueryResult::Found(_))
    }

    pub fn diagnostic(&self) -> Option<&QueryDiagnostic> {
        match self {
            QueryResult::Found(_) => None,
            QueryResult::NotFound(d) | QueryResult::Failed(d) => Some(d),
        }
    }

    fn from_failure(diagnostic: QueryDiagnostic) -> Self {
        match diagnostic.failure {
            QueryFailure::NoData => QueryResult::NotFound(diagnostic),
            QueryFailure::Malformed | QueryFailure::Transport => QueryResult::Failed(diagnostic),
        }
    }
}

/// Enough detail to tell "no data" from "bad request" from "node unreachable".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryDiagnostic {
    pub function: String,
    pub failure: QueryFailure,
    pub error_code: Option<String>,
    pub vm_error_code: Option<u64>,
    pub message: String,
}

impl QueryDiagnostic {
    pub fn from_error(function: &str, error: &GatewayError) -> Self {
        match error {
            GatewayError::Query {
                function,
                failure,
                detail,
            } => Self {
                function: function.clone(),
                failure: *failure,
                error_code: detail.error_code.clone(),
                vm_error_code: detail.vm_error_code,
                message: detail.message.clone(),
            },
            GatewayError::Decode { .. } => Self::local(function, QueryFailure::Malformed, error),
            other => Self::local(function, QueryFailure::Transport, other),
        }
    }

    fn local(function: &str, failure: QueryFailure, error: &GatewayError) -> Self {
        Self {
            function: function.to_string(),
            failure,
            error_code: None,
            vm_error_code: None,
            message: error.to_string(),
        }
    }

    fn undecodable(function: &str, reason: String) -> Self {
        Self {
            function: function.to_string(),
            failure: QueryFailure::Malformed,
            error_code: None,
            vm_error_code: None,
            message: reason,
        }
    }
}

impl fmt::Display for QueryDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.function, self.failure, self.message)?;
        if let Some(code) = &self.error_code {
            write!(f, " [{code}]")?;
        }
        Ok(())
    }
}

/// Read-only accessors over the `profile` views.
pub struct ActionQueryClient<'a> {
    gateway: &'a dyn LedgerGateway,
    module: ProfileModule,
}

impl<'a> ActionQueryClient<'a> {
    pub fn new(gateway: &'a dyn LedgerGateway, module: ProfileModule) -> Self {
        Self { gateway, module }
    }

    /// How many action lists `address` owns.
    pub async fn get_action_list_counter(&self, address: Address) -> QueryResult<u64> {
        self.query(GET_ACTION_LIST_COUNTER, vec![address.into()], |values| {
            values
                .first()
                .and_then(decode_u64)
                .ok_or_else(|| format!("expected a u64 counter, got {values:?}"))
        })
        .await
    }

    pub async fn get_action_list(
        &self,
        address: Address,
        list_index: ActionListIndex,
    ) -> QueryResult<ActionListSummary> {
        self.query(
            GET_ACTION_LIST,
            vec![address.into(), list_index.into()],
            |values| ActionListSummary::decode_view(list_index, values),
        )
        .await
    }

    pub async fn get_action(
        &self,
        address: Address,
        list_index: ActionListIndex,
        action_index: u64,
    ) -> QueryResult<Action> {
        self.query(
            GET_ACTION,
            vec![address.into(), list_index.into(), action_index.into()],
            |values| Action::decode_view(list_index, values),
        )
        .await
    }

    async fn query<T: fmt::Debug>(
        &self,
        name: &str,
        arguments: Vec<MoveValue>,
        decode: impl FnOnce(&[Value]) -> Result<T, String>,
    ) -> QueryResult<T> {
        let request = FunctionCall::new(self.module.function(name), arguments);
        let function = request.function.to_string();
        let values = match self.gateway.view(&request).await {
            Ok(values) => values,
            Err(e) => {
                let diagnostic = QueryDiagnostic::from_error(&function, &e);
                warn!(
                    %function,
                    failure = %diagnostic.failure,
                    error_code = diagnostic.error_code.as_deref().unwrap_or("-"),
                    error = %e,
                    "view call failed"
                );
                return QueryResult::from_failure(diagnostic);
            }
        };
        match decode(&values) {
            Ok(decoded) => {
                debug!(%function, result = ?decoded, "view call");
                QueryResult::Found(decoded)
            }
            Err(reason) => {
                warn!(%function, %reason, "view returned an undecodable payload");
                QueryResult::Failed(QueryDiagnostic::undecodable(&function, reason))
            }
        }
    }
}
