use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

use crate::config::Network;

/// Vm status code the node reports for a Move abort.
pub const VM_STATUS_ABORTED: u64 = 4016;

/// Error body returned by the node REST API.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub vm_error_code: Option<u64>,
}

impl NodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    /// How a failed read should be reported, given the HTTP status it came with.
    pub fn classify(&self, status: u16) -> QueryFailure {
        if status >= 500 {
            return QueryFailure::Transport;
        }
        match self.error_code.as_deref() {
            Some("module_not_found") | Some("struct_field_not_found") => {
                return QueryFailure::Malformed
            }
            Some("account_not_found")
            | Some("resource_not_found")
            | Some("table_item_not_found") => return QueryFailure::NoData,
            _ => {}
        }
        if self.vm_error_code == Some(VM_STATUS_ABORTED)
            || self.message.to_ascii_lowercase().contains("abort")
        {
            return QueryFailure::NoData;
        }
        if status == 404 {
            QueryFailure::NoData
        } else {
            QueryFailure::Malformed
        }
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(code) = &self.error_code {
            write!(f, " [{code}]")?;
        }
        if let Some(vm) = self.vm_error_code {
            write!(f, " (vm {vm})")?;
        }
        Ok(())
    }
}

/// Why a read-only call produced nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryFailure {
    /// The contract aborted or the account/resource does not exist.
    NoData,
    /// The node refused the request or returned something undecodable.
    Malformed,
    /// The node could not be reached or failed internally.
    Transport,
}

impl fmt::Display for QueryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueryFailure::NoData => "no data",
            QueryFailure::Malformed => "malformed request",
            QueryFailure::Transport => "transport failure",
        };
        f.write_str(s)
    }
}

/// Failure surfaced by a [`crate::gateway::LedgerGateway`].
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The node refused to admit the transaction.
    #[error("submission of {function} rejected: {detail}")]
    Submission { function: String, detail: NodeError },

    /// The transaction was committed but the contract aborted.
    #[error("transaction {hash} ({function}) aborted: {vm_status}")]
    Execution {
        function: String,
        hash: String,
        vm_status: String,
    },

    /// A view call or resource read failed.
    #[error("query {function} failed ({failure}): {detail}")]
    Query {
        function: String,
        failure: QueryFailure,
        detail: NodeError,
    },

    /// Finality was not observed in time; the transaction may still land.
    #[error("transaction {hash} not final after {waited:?}")]
    Timeout { hash: String, waited: Duration },

    #[error("transport error while {context}: {reason}")]
    Transport { context: String, reason: String },

    #[error("unexpected payload from {context}: {reason}")]
    Decode { context: String, reason: String },

    #[error("no faucet available on {0}")]
    FaucetUnavailable(Network),

    #[error("invalid gateway configuration: {0}")]
    InvalidConfig(String),
}

impl GatewayError {
    pub fn transport(context: impl Into<String>, reason: impl fmt::Display) -> Self {
        GatewayError::Transport {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    pub fn decode(context: impl Into<String>, reason: impl fmt::Display) -> Self {
        GatewayError::Decode {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    /// True for failures that mean the requested state change did not happen.
    pub fn is_transactional(&self) -> bool {
        matches!(
            self,
            GatewayError::Submission { .. } | GatewayError::Execution { .. }
        )
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
