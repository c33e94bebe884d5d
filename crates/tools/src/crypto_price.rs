//! `fetchCryptoPrice`: current price of a cryptocurrency from CoinGecko.
//!
//! Calls `GET {base}/simple/price?ids=<coin>&vs_currencies=<currency>` and
//! reads `payload[coin][currency]`, both keys lowercased. A payload without
//! that entry (unknown coin, unsupported currency) is a tool failure.

use agentloop_core::error::ToolError;
use agentloop_core::tool::Tool;
use async_trait::async_trait;
use tracing::debug;

use crate::required_str;

const TOOL_NAME: &str = "fetchCryptoPrice";

pub struct CryptoPriceTool {
    client: reqwest::Client,
    base_url: String,
}

impl CryptoPriceTool {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn failed(reason: impl Into<String>) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: TOOL_NAME.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Tool for CryptoPriceTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Fetches the current price of a specified cryptocurrency"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "cryptoName": { "type": "string" },
                "vsCurrency": { "type": "string", "default": "USD" }
            },
            "required": ["cryptoName"]
        })
    }

    async fn invoke(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let crypto = required_str(&arguments, "cryptoName")?;
        let currency = arguments["vsCurrency"].as_str().unwrap_or("USD");
        debug!(crypto, currency, "Fetching crypto price");

        let url = format!("{}/simple/price", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("ids", crypto), ("vs_currencies", currency)])
            .send()
            .await
            .map_err(|e| ToolError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::failed(format!("price API returned {status}")));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Self::failed(format!("unreadable price payload: {e}")))?;

        let price = payload
            .get(crypto.to_lowercase())
            .and_then(|quotes| quotes.get(currency.to_lowercase()))
            .ok_or_else(|| Self::failed(format!("no {currency} price for '{crypto}'")))?;

        match price {
            serde_json::Value::Number(n) => Ok(n.to_string()),
            serde_json::Value::String(s) => Ok(s.clone()),
            other => Err(Self::failed(format!("unexpected price value: {other}"))),
        }
    }
}
