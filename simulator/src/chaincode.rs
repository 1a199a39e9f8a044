//! The `account` chaincode run by simulated peers.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use ledgerlink_common::ProposalRequest;

/// Key-value world state shared by peers and orderers of one network.
pub type WorldState = Arc<RwLock<BTreeMap<String, String>>>;

/// World state seeded with a handful of accounts.
pub fn seeded_state() -> WorldState {
    let owners = ["jill", "chris", "claire", "leon", "ada"];
    let state = owners
        .iter()
        .enumerate()
        .map(|(i, owner)| (format!("ACCOUNT{}", i), owner.to_string()))
        .collect();
    Arc::new(RwLock::new(state))
}

#[derive(Serialize)]
struct Entry<'a> {
    key: &'a str,
    value: &'a str,
}

/// Simulate a call against `state` without writing anything.
///
/// `Err` carries the chaincode's error message.
pub fn execute(state: &BTreeMap<String, String>, request: &ProposalRequest) -> Result<Vec<u8>, String> {
    let args = &request.args;
    match (request.function.as_str(), args.as_slice()) {
        ("list", []) => {
            let entries: Vec<_> = state
                .iter()
                .map(|(key, value)| Entry { key, value })
                .collect();
            serde_json::to_vec(&entries).map_err(|e| e.to_string())
        }
        ("query", [key]) => state
            .get(key)
            .map(|value| value.clone().into_bytes())
            .ok_or_else(|| format!("Account {} does not exist", key)),
        ("update", [key, value]) => {
            if !state.contains_key(key) {
                return Err(format!("Account {} does not exist", key));
            }
            serde_json::to_vec(&Entry { key, value }).map_err(|e| e.to_string())
        }
        (function @ ("list" | "query" | "update"), _) => Err(format!(
            "Incorrect number of arguments for {}: {}",
            function,
            args.len()
        )),
        (function, _) => Err(format!("Unknown function: {}", function)),
    }
}

/// Apply the writes of an ordered transaction. Returns whether anything changed.
pub fn commit(state: &mut BTreeMap<String, String>, request: &ProposalRequest) -> bool {
    match (request.function.as_str(), request.args.as_slice()) {
        ("update", [key, value]) => {
            state.insert(key.clone(), value.clone());
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(function: &str, args: &[&str]) -> ProposalRequest {
        ProposalRequest::new("account", function, args.iter().copied())
    }

    #[test]
    fn test_query_and_list() {
        let state = seeded_state();
        let state = state.read();

        assert_eq!(execute(&state, &request("query", &["ACCOUNT1"])).unwrap(), b"chris");
        assert!(execute(&state, &request("query", &["ACCOUNT9"])).is_err());

        let list: serde_json::Value =
            serde_json::from_slice(&execute(&state, &request("list", &[])).unwrap()).unwrap();
        assert_eq!(list.as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_update_simulates_then_commits() {
        let state = seeded_state();
        let update = request("update", &["ACCOUNT1", "jill_1"]);

        assert!(execute(&state.read(), &update).is_ok());
        assert_eq!(state.read()["ACCOUNT1"], "chris");

        assert!(commit(&mut state.write(), &update));
        assert_eq!(state.read()["ACCOUNT1"], "jill_1");
    }

    #[test]
    fn test_bad_calls() {
        let state = seeded_state();
        let state = state.read();
        assert!(execute(&state, &request("update", &["ACCOUNT1"]))
            .unwrap_err()
            .contains("Incorrect number"));
        assert!(execute(&state, &request("delete", &["ACCOUNT1"]))
            .unwrap_err()
            .contains("Unknown function"));
    }
}
