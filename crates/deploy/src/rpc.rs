//! Minimal Ethereum JSON-RPC client helpers.

use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::Value;

/// Timeout applied to every individual RPC request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Make a JSON-RPC call and deserialize the `result` member.
///
/// An `error` member in the response is turned into an error carrying the node's message.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    let response = client
        .post(url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .with_context(|| format!("Failed to send {} request", method))?;

    let body: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    parse_response(method, body)
}

fn parse_response<T: DeserializeOwned>(method: &str, body: Value) -> Result<T, anyhow::Error> {
    if let Some(error) = body.get("error") {
        anyhow::bail!(
            "{} failed: {}",
            method,
            error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown RPC error")
        );
    }

    let result = body
        .get("result")
        .cloned()
        .with_context(|| format!("No result in {} response", method))?;

    serde_json::from_value(result).with_context(|| format!("Failed to deserialize {} result", method))
}

/// Deserialize a u64 from a hex quantity string (with 0x prefix).
pub fn deserialize_u64_from_hex<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    u64::from_str_radix(s.trim_start_matches("0x"), 16).map_err(serde::de::Error::custom)
}

/// Like [`deserialize_u64_from_hex`] for optional quantities.
pub fn deserialize_opt_u64_from_hex<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = Option::<String>::deserialize(deserializer)?;
    s.map(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16).map_err(serde::de::Error::custom))
        .transpose()
}

/// A JSON-RPC hex quantity, e.g. the result of `eth_blockNumber`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Quantity(#[serde(deserialize_with = "deserialize_u64_from_hex")] pub u64);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_result() {
        let quantity: Quantity =
            parse_response("eth_blockNumber", json!({"jsonrpc": "2.0", "id": 1, "result": "0x1b4"}))
                .unwrap();
        assert_eq!(quantity, Quantity(436));
    }

    #[test]
    fn test_parse_null_result() {
        let receipt: Option<Value> = parse_response(
            "eth_getTransactionReceipt",
            json!({"jsonrpc": "2.0", "id": 1, "result": null}),
        )
        .unwrap();
        assert!(receipt.is_none());
    }

    #[test]
    fn test_parse_error_response() {
        let err = parse_response::<Quantity>(
            "eth_sendTransaction",
            json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32000, "message": "insufficient funds"}}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("insufficient funds"));
    }

    #[test]
    fn test_parse_missing_result() {
        assert!(parse_response::<Quantity>("eth_blockNumber", json!({"jsonrpc": "2.0"})).is_err());
    }
}
