//! Line-delimited JSON payloads for `_bulk` and `_msearch` requests

use serde_json::{Map, Value};

use crate::models::{BulkOperation, MultiSearchOperation};

pub const BULK_ENDPOINT: &str = "_bulk";
pub const MULTI_SEARCH_ENDPOINT: &str = "_msearch";

/// Encode bulk operations as `{action: metadata}` lines, each followed by the
/// document line for data-carrying actions
pub fn encode_bulk(operations: &[BulkOperation]) -> String {
    let mut payload = String::new();

    for operation in operations {
        let mut action = Map::with_capacity(1);
        action.insert(
            operation.action.as_str().to_string(),
            operation.metadata.clone(),
        );
        push_line(&mut payload, &Value::Object(action));

        if operation.action.carries_data() {
            push_line(&mut payload, operation.data.as_ref().unwrap_or(&Value::Null));
        }
    }

    payload
}

/// Encode multi-search operations as alternating header/body lines
pub fn encode_multi_search(operations: &[MultiSearchOperation]) -> String {
    let mut payload = String::new();

    for operation in operations {
        push_line(&mut payload, &operation.header);
        push_line(&mut payload, &operation.body);
    }

    payload
}

pub fn rewrite_path_for_bulk(path: &str) -> String {
    rewrite_path(path, BULK_ENDPOINT)
}

pub fn rewrite_path_for_multi_search(path: &str) -> String {
    rewrite_path(path, MULTI_SEARCH_ENDPOINT)
}

fn rewrite_path(path: &str, endpoint: &str) -> String {
    // only a whole trailing segment counts as the endpoint
    let base = match path.strip_suffix(endpoint) {
        Some(rest) if rest.is_empty() || rest.ends_with('/') => rest,
        _ => path,
    };
    let base = base.strip_suffix('/').unwrap_or(base);
    format!("{}/{}", base, endpoint)
}

fn push_line(payload: &mut String, value: &Value) {
    payload.push_str(&value.to_string());
    payload.push('\n');
}
