//! Client side of the XWorld `profile` Move module: per-account action lists.

use serde::Serialize;
use serde_json::Value;

use crate::{gateway::FunctionId, identity::Address};

pub mod queries;
pub mod transactions;

pub use queries::{ActionQueryClient, QueryDiagnostic, QueryResult};
pub use transactions::ActionTransactionClient;

pub const PROFILE_MODULE: &str = "profile";

pub const CREATE_ACTION_LIST: &str = "create_action_list";
pub const ACTION: &str = "action";
pub const GET_ACTION_LIST_COUNTER: &str = "get_action_list_counter";
pub const GET_ACTION_LIST: &str = "get_action_list";
pub const GET_ACTION: &str = "get_action";

pub type ActionListIndex = u64;

/// Where the module is published; hands out its function identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProfileModule {
    address: Address,
}

impl ProfileModule {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn function(&self, name: &str) -> FunctionId {
        FunctionId::new(self.address, PROFILE_MODULE, name)
    }
}

/// One appended record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Action {
    pub list_index: ActionListIndex,
    pub kind: u64,
    pub message: String,
}

impl Action {
    /// Accepts `{"act"|"kind"|"action": n, "message": s}` or `[n, s]`.
    pub fn decode(list_index: ActionListIndex, value: &Value) -> Result<Self, String> {
        let (kind, message) = match value {
            Value::Object(map) => {
                let kind = ["act", "kind", "action"]
                    .iter()
                    .find_map(|k| map.get(*k))
                    .ok_or("action object without a kind field")?;
                let message = map.get("message").ok_or("action object without message")?;
                (kind, message)
            }
            Value::Array(items) if items.len() == 2 => (&items[0], &items[1]),
            other => return Err(format!("cannot decode action from {other}")),
        };
        Ok(Self {
            list_index,
            kind: decode_u64(kind).ok_or_else(|| format!("action kind {kind} is not a u64"))?,
            message: message
                .as_str()
                .ok_or_else(|| format!("action message {message} is not a string"))?
                .to_string(),
        })
    }

    /// A view returns a list of values; the action is either the single value
    /// or the whole list as a tuple.
    pub fn decode_view(list_index: ActionListIndex, values: &[Value]) -> Result<Self, String> {
        match values {
            [single] => Self::decode(list_index, single),
            [kind, message] => {
                let tuple = Value::Array(vec![kind.clone(), message.clone()]);
                Self::decode(list_index, &tuple)
            }
            _ => Err(format!("expected 1 or 2 return values, got {}", values.len())),
        }
    }
}

/// What `get_action_list` returned. `actions` is filled in when the payload
/// carries an `actions` array the client understands.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActionListSummary {
    pub list_index: ActionListIndex,
    pub actions: Option<Vec<Action>>,
    pub raw: Value,
}

impl ActionListSummary {
    pub fn decode_view(list_index: ActionListIndex, values: &[Value]) -> Result<Self, String> {
        let raw = match values {
            [single] => single.clone(),
            [] => return Err("get_action_list returned nothing".into()),
            many => Value::Array(many.to_vec()),
        };
        let actions = match raw.get("actions").and_then(Value::as_array) {
            Some(items) => Some(
                items
                    .iter()
                    .map(|item| Action::decode(list_index, item))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            None => None,
        };
        Ok(Self {
            list_index,
            actions,
            raw,
        })
    }

    pub fn action_count(&self) -> Option<usize> {
        self.actions.as_ref().map(Vec::len)
    }
}

/// Move integers come back as decimal strings; plain numbers are accepted too.
pub fn decode_u64(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn function_ids_are_scoped_to_the_module() {
        let module = ProfileModule::new("0xcafe".parse().unwrap());
        let id = module.function(GET_ACTION);
        assert_eq!(id.module, "profile");
        assert!(id
            .to_string()
            .ends_with("000000cafe::profile::get_action"));
    }

    #[test]
    fn decodes_action_shapes() {
        let from_object = Action::decode(0, &json!({"act": "1", "message": "download xworld APP"}))
            .unwrap();
        let from_tuple = Action::decode_view(0, &[json!(1), json!("download xworld APP")]).unwrap();
        assert_eq!(from_object, from_tuple);
        assert_eq!(from_object.kind, 1);

        assert!(Action::decode(0, &json!({"message": "x"})).is_err());
        assert!(Action::decode(0, &json!({"act": "x", "message": "x"})).is_err());
        assert!(Action::decode_view(0, &[]).is_err());
    }

    #[test]
    fn decodes_list_summary() {
        let summary = ActionListSummary::decode_view(
            2,
            &[json!({"actions": [{"act": "3", "message": "a"}, {"act": "4", "message": "b"}]})],
        )
        .unwrap();
        assert_eq!(summary.action_count(), Some(2));
        assert_eq!(summary.actions.as_ref().unwrap()[1].kind, 4);
        assert_eq!(summary.actions.as_ref().unwrap()[1].list_index, 2);

        let opaque = ActionListSummary::decode_view(0, &[json!({"owner": "0x1"})]).unwrap();
        assert_eq!(opaque.action_count(), None);
    }

    #[test]
    fn u64_from_strings_or_numbers() {
        assert_eq!(decode_u64(&json!("18446744073709551615")), Some(u64::MAX));
        assert_eq!(decode_u64(&json!(5)), Some(5));
        assert_eq!(decode_u64(&json!(-1)), None);
        assert_eq!(decode_u64(&json!(true)), None);
    }
}
