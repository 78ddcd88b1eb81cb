//! Broadcaster extraction
//!
//! Determines the single account whose authority governs broadcasting a
//! transaction. Every operation kind names its acting account in a
//! specific payload field; the mapping is a data table so new ledger
//! operation kinds are a one-line edit.
//!
//! Extraction fails closed: unknown kinds, malformed payloads, empty
//! transactions, and transactions whose operations disagree on the
//! acting account all yield `None`.

use serde_json::Value;

use crate::chain::Transaction;

/// Operation kind → payload field naming the acting account
const ACTING_ACCOUNT_FIELD: &[(&str, &str)] = &[
    ("transfer", "from"),
    ("transfer_to_vesting", "from"),
    ("withdraw_vesting", "account"),
    ("vote", "voter"),
    ("comment", "author"),
    ("delete_comment", "author"),
    ("account_create", "creator"),
    ("account_update", "account"),
    ("account_witness_vote", "account"),
    ("delegate_vesting_shares", "delegator"),
    ("claim_reward_balance", "account"),
];

/// Operation kind → payload field holding an ordered required-authorities
/// list; the acting account is the first entry
const ACTING_ACCOUNT_LIST_FIELD: &[(&str, &str)] = &[
    ("custom_json", "required_auths"),
    ("custom_binary", "required_active_auths"),
];

/// Fallback list field for `custom_json` when `required_auths` is empty
const CUSTOM_JSON_POSTING_FIELD: &str = "required_posting_auths";

/// Resolve the acting account of a single operation, or `None` if the
/// kind is unrecognized or the payload is malformed
fn acting_account(kind: &str, payload: &Value) -> Option<String> {
    let fields = payload.as_object()?;

    if let Some((_, field)) = ACTING_ACCOUNT_FIELD.iter().find(|(k, _)| *k == kind) {
        return fields.get(*field)?.as_str().map(str::to_string);
    }

    if let Some((_, list_field)) = ACTING_ACCOUNT_LIST_FIELD.iter().find(|(k, _)| *k == kind) {
        if let Some(first) = first_in_list(fields.get(*list_field)) {
            return Some(first);
        }
        if kind == "custom_json" {
            return first_in_list(fields.get(CUSTOM_JSON_POSTING_FIELD));
        }
        return None;
    }

    None
}

fn first_in_list(value: Option<&Value>) -> Option<String> {
    value?.as_array()?.first()?.as_str().map(str::to_string)
}

/// Determine the single account whose authority governs broadcasting
/// `tx`
///
/// Returns `None` when the transaction is empty, any operation cannot be
/// resolved, or two operations resolve to different accounts. No
/// guessing: a transaction that would need two distinct broadcasters is
/// unsupported.
pub fn extract_broadcaster(tx: &Transaction) -> Option<String> {
    let mut username: Option<String> = None;

    for op in &tx.operations {
        let account = acting_account(&op.kind, &op.payload)?;
        match &username {
            Some(existing) if *existing != account => return None,
            Some(_) => {}
            None => username = Some(account),
        }
    }

    username
}
