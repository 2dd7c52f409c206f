//! JSON-RPC `eth_call` contract reader

use super::abi::{self, COINS, DESCRIPTION, EXPIRATION, OWNER_URNS, RATE, SLATES};
use super::{ContractCallError, ContractReader};
use crate::hash::{Address, Bytes32, Selector};
use crate::types::{ChainId, Wad};
use anyhow::Result;
use async_trait::async_trait;
use config::Config;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{error, info};

/// JSON-RPC error code for an execution revert
const REVERT_ERROR_CODE: i64 = 3;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ChainEndpoint {
    rpc_url: String,
}

pub struct RpcContractReader {
    client: reqwest::Client,
    endpoints: HashMap<ChainId, String>,
}

impl RpcContractReader {
    pub fn new(endpoints: HashMap<ChainId, String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoints,
        }
    }

    /// Endpoints from `chains.<id>.rpc-url`
    pub fn from_config(config: &Config) -> Result<Self> {
        let chains: HashMap<String, ChainEndpoint> =
            config.get("chains").unwrap_or_default();
        let mut endpoints = HashMap::new();
        for (chain, endpoint) in chains {
            let chain_id: ChainId = chain.parse()?;
            info!("Contract reads on chain {chain_id} via {}", endpoint.rpc_url);
            endpoints.insert(chain_id, endpoint.rpc_url);
        }
        Ok(Self::new(endpoints))
    }

    /// `eth_call` at latest, returning the decoded words or `None` on revert
    async fn call(
        &self,
        chain_id: ChainId,
        to: &Address,
        selector: &Selector,
        args: &[Bytes32],
        name: &str,
    ) -> Result<Option<Vec<Bytes32>>, ContractCallError> {
        let url = self
            .endpoints
            .get(&chain_id)
            .ok_or(ContractCallError::UnconfiguredChain(chain_id))?;
        let call = format!("{name} on {to}");
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [{ "to": to.to_string(), "data": abi::encode_call(selector, args) }, "latest"],
        });

        let transport = |message: String| {
            error!(chain_id, contract = %to, args = ?args, "Contract call {name} failed: {message}");
            ContractCallError::Transport {
                chain_id,
                call: call.clone(),
                message,
            }
        };

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| transport(e.to_string()))?;
        let body: Value = response.json().await.map_err(|e| transport(e.to_string()))?;

        if let Some(rpc_error) = body.get("error") {
            let code = rpc_error.get("code").and_then(Value::as_i64).unwrap_or_default();
            let message = rpc_error.get("message").and_then(Value::as_str).unwrap_or_default();
            if code == REVERT_ERROR_CODE || message.to_lowercase().contains("revert") {
                return Ok(None);
            }
            return Err(transport(format!("RPC error {code}: {message}")));
        }

        let result = body.get("result").and_then(Value::as_str).ok_or_else(|| {
            ContractCallError::MalformedResponse {
                chain_id,
                call: call.clone(),
                message: "missing result".to_string(),
            }
        })?;
        let words = abi::decode_words(result).map_err(|message| {
            ContractCallError::MalformedResponse {
                chain_id,
                call: call.clone(),
                message,
            }
        })?;

        // No return data means the target has no code or no such function
        Ok((!words.is_empty()).then_some(words))
    }

    /// Run a call and decode its words
    async fn read<T>(
        &self,
        chain_id: ChainId,
        to: &Address,
        selector: &Selector,
        args: &[Bytes32],
        name: &str,
        decode: fn(&[Bytes32]) -> Result<Option<T>, String>,
    ) -> Result<Option<T>, ContractCallError> {
        match self.call(chain_id, to, selector, args, name).await? {
            Some(words) => {
                decode(&words).map_err(|message| ContractCallError::MalformedResponse {
                    chain_id,
                    call: format!("{name} on {to}"),
                    message,
                })
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ContractReader for RpcContractReader {
    async fn slate_member(
        &self,
        chain_id: ChainId,
        chief: &Address,
        slate: &Bytes32,
        index: u64,
    ) -> Result<Option<Address>, ContractCallError> {
        let args = [*slate, Bytes32::from_u64(index)];
        self.read(chain_id, chief, &SLATES, &args, "slates", abi::decode_address).await
    }

    async fn spell_description(
        &self,
        chain_id: ChainId,
        spell: &Address,
    ) -> Result<Option<String>, ContractCallError> {
        self.read(chain_id, spell, &DESCRIPTION, &[], "description", abi::decode_string).await
    }

    async fn spell_expiration(
        &self,
        chain_id: ChainId,
        spell: &Address,
    ) -> Result<Option<u64>, ContractCallError> {
        self.read(chain_id, spell, &EXPIRATION, &[], "expiration", abi::decode_u64).await
    }

    async fn conversion_rate(
        &self,
        chain_id: ChainId,
        converter: &Address,
    ) -> Result<Option<Wad>, ContractCallError> {
        self.read(chain_id, converter, &RATE, &[], "rate", abi::decode_wad).await
    }

    async fn owner_urn(
        &self,
        chain_id: ChainId,
        engine: &Address,
        owner: &Address,
        index: u64,
    ) -> Result<Option<Address>, ContractCallError> {
        let args = [Bytes32::from_address(owner), Bytes32::from_u64(index)];
        self.read(chain_id, engine, &OWNER_URNS, &args, "ownerUrns", abi::decode_address).await
    }

    async fn pool_coin(
        &self,
        chain_id: ChainId,
        pool: &Address,
        index: u64,
    ) -> Result<Option<Address>, ContractCallError> {
        let args = [Bytes32::from_u64(index)];
        self.read(chain_id, pool, &COINS, &args, "coins", abi::decode_address).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_chain_is_an_error() {
        let reader = RpcContractReader::new(HashMap::new());
        let result = reader.spell_expiration(10, &Address::default()).await;
        assert!(matches!(result, Err(ContractCallError::UnconfiguredChain(10))));
    }

    #[test]
    fn endpoints_load_from_config() {
        let config = Config::builder()
            .set_override("chains.1.rpc-url", "http://localhost:8545")
            .unwrap()
            .set_override("chains.42161.rpc-url", "http://localhost:8547")
            .unwrap()
            .build()
            .unwrap();
        let reader = RpcContractReader::from_config(&config).unwrap();
        assert_eq!(reader.endpoints.len(), 2);
        assert_eq!(reader.endpoints[&1], "http://localhost:8545");
    }
}
