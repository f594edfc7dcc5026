// MRV Registry
// Copyright (C) 2019 Monadic GmbH <radicle@monadic.xyz>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License version 3 as
// published by the Free Software Foundation.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! [backend::Backend] implementation for a remote node speaking the Ethereum JSON-RPC protocol
use futures::future::{BoxFuture, FutureExt as _};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use mrv_registry_core::{Address, Project, ProjectId, TxHash, H256};

use crate::abi::{self, Read};
use crate::backend::{self, Outcome, TransactionIncluded};
use crate::config::Contracts;
use crate::error::Error;
use crate::event::Event;
use crate::transaction::SignedTransaction;

/// Timeout for a single JSON-RPC request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct RemoteNode {
    http: reqwest::Client,
    url: Url,
    contracts: Contracts,
    poll_interval: Duration,
    request_id: Arc<AtomicU64>,
}

#[derive(Serialize)]
struct Request<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Deserialize)]
struct Response {
    result: Option<Value>,
    error: Option<NodeError>,
}

#[derive(Debug, Deserialize)]
struct NodeError {
    code: i64,
    message: String,
    data: Option<Value>,
}

/// Failure of a single JSON-RPC request.
#[derive(Debug)]
enum RpcError {
    Transport(reqwest::Error),
    Node(NodeError),
    InvalidResponse(String),
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RpcError::Transport(error) => write!(f, "{}", error),
            RpcError::Node(error) => write!(f, "node error {}: {}", error.code, error.message),
            RpcError::InvalidResponse(detail) => write!(f, "invalid response: {}", detail),
        }
    }
}

impl From<RpcError> for Error {
    fn from(error: RpcError) -> Self {
        Error::Connectivity(error.to_string())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Receipt {
    block_number: String,
    status: Option<String>,
    #[serde(default)]
    logs: Vec<ReceiptLog>,
}

#[derive(Deserialize)]
struct ReceiptLog {
    address: Address,
    topics: Vec<H256>,
    data: String,
}

impl RemoteNode {
    pub fn new(url: Url, contracts: Contracts, poll_interval: Duration) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(RemoteNode {
            http,
            url,
            contracts,
            poll_interval,
            request_id: Arc::new(AtomicU64::new(1)),
        })
    }

    async fn call<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R, RpcError> {
        let request = Request {
            jsonrpc: "2.0",
            method,
            params,
            id: self.request_id.fetch_add(1, Ordering::SeqCst),
        };
        let response: Response = self
            .http
            .post(self.url.clone())
            .json(&request)
            .send()
            .await
            .map_err(RpcError::Transport)?
            .json()
            .await
            .map_err(RpcError::Transport)?;
        if let Some(error) = response.error {
            return Err(RpcError::Node(error));
        }
        serde_json::from_value(response.result.unwrap_or(Value::Null))
            .map_err(|e| RpcError::InvalidResponse(e.to_string()))
    }

    async fn quantity(&self, method: &str, params: Value) -> Result<u64, Error> {
        let value: String = self.call(method, params).await?;
        parse_quantity(&value).map_err(Error::Connectivity)
    }

    /// Execute a read-only call against the registry contract.
    async fn read(&self, read: Read) -> Result<Vec<u8>, Error> {
        let params = json!([
            {
                "to": self.contracts.registry,
                "data": format!("0x{}", hex::encode(read.encode())),
            },
            "latest"
        ]);
        let data: String = self.call("eth_call", params).await?;
        decode_hex(&data).map_err(Error::Connectivity)
    }

    /// Poll for the receipt of `tx_hash` until it is available.
    ///
    /// Never gives up on its own. Callers bound the wait with a timeout.
    async fn wait_for_receipt(
        self,
        tx_hash: TxHash,
        from: Address,
        to: Address,
        data: Vec<u8>,
    ) -> Result<TransactionIncluded, Error> {
        loop {
            match self
                .call::<Option<Receipt>>("eth_getTransactionReceipt", json!([tx_hash]))
                .await
            {
                Ok(Some(receipt)) => {
                    let block_number =
                        parse_quantity(&receipt.block_number).map_err(Error::Connectivity)?;
                    let outcome = if receipt.status.as_deref() == Some("0x0") {
                        let reason = self.revert_reason(from, to, &data, block_number).await;
                        Outcome::Reverted { reason }
                    } else {
                        Outcome::Success {
                            events: receipt_events(self.contracts.registry, &receipt.logs),
                        }
                    };
                    return Ok(TransactionIncluded {
                        tx_hash,
                        block_number,
                        outcome,
                    });
                }
                Ok(None) => {}
                Err(error) => log::warn!("Failed to fetch receipt of {}: {}", tx_hash, error),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Replay a failed transaction as a call at its block to recover the revert reason.
    async fn revert_reason(&self, from: Address, to: Address, data: &[u8], block: u64) -> String {
        let params = json!([
            {
                "from": from,
                "to": to,
                "data": format!("0x{}", hex::encode(data)),
            },
            format!("0x{:x}", block)
        ]);
        let fallback = String::from("execution reverted");
        match self.call::<String>("eth_call", params).await {
            Err(RpcError::Node(error)) => error
                .data
                .as_ref()
                .and_then(revert_data)
                .and_then(|data| abi::decode_revert_reason(&data))
                .unwrap_or(error.message),
            Err(error) => {
                log::warn!("Failed to replay reverted transaction: {}", error);
                fallback
            }
            Ok(_) => fallback,
        }
    }
}

#[async_trait::async_trait]
impl backend::Backend for RemoteNode {
    async fn submit(
        &self,
        transaction: SignedTransaction,
    ) -> Result<BoxFuture<'static, Result<TransactionIncluded, Error>>, Error> {
        let tx_hash = transaction.hash();
        let from = transaction.sender()?;
        let payload = format!("0x{}", hex::encode(transaction.payload()));
        let returned: TxHash = self
            .call("eth_sendRawTransaction", json!([payload]))
            .await
            .map_err(|error| Error::Broadcast(error.to_string()))?;
        if returned != tx_hash {
            log::warn!(
                "Node reported transaction hash {} for transaction {}",
                returned,
                tx_hash
            );
        }
        log::debug!("Broadcast transaction {}", tx_hash);
        Ok(self
            .clone()
            .wait_for_receipt(tx_hash, from, transaction.to(), transaction.data().to_vec())
            .boxed())
    }

    async fn chain_id(&self) -> Result<u64, Error> {
        self.quantity("eth_chainId", json!([])).await
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, Error> {
        self.quantity("eth_getTransactionCount", json!([address, "latest"]))
            .await
    }

    async fn owner(&self) -> Result<Address, Error> {
        let data = self.read(Read::Owner).await?;
        abi::decode_address(&data).map_err(invalid_return)
    }

    async fn next_project_id(&self) -> Result<ProjectId, Error> {
        let data = self.read(Read::NextProjectId).await?;
        abi::decode_uint(&data).map_err(invalid_return)
    }

    async fn project(&self, id: ProjectId) -> Result<Option<Project>, Error> {
        let data = self.read(Read::Project(id)).await?;
        abi::decode_project(&data).map_err(invalid_return)
    }

    async fn is_verifier(&self, address: Address) -> Result<bool, Error> {
        let data = self.read(Read::IsVerifier(address)).await?;
        abi::decode_bool(&data).map_err(invalid_return)
    }
}

fn invalid_return(error: abi::AbiError) -> Error {
    Error::Connectivity(format!("unexpected return data: {}", error))
}

/// Revert data attached to a node error. Nodes put it either directly into `data` or into
/// `data.data`.
fn revert_data(data: &Value) -> Option<Vec<u8>> {
    match data {
        Value::String(hex) => decode_hex(hex).ok(),
        Value::Object(object) => object.get("data").and_then(revert_data),
        _ => None,
    }
}

/// Registry events in `logs`. Logs that cannot be decoded are skipped.
fn receipt_events(registry: Address, logs: &[ReceiptLog]) -> Vec<Event> {
    logs.iter()
        .filter_map(|entry| {
            let entry = abi::Log {
                address: entry.address,
                topics: entry.topics.clone(),
                data: decode_hex(&entry.data).ok()?,
            };
            match abi::decode_event(registry, &entry) {
                Ok(event) => event,
                Err(error) => {
                    log::warn!("Skipping undecodable registry log: {}", error);
                    None
                }
            }
        })
        .collect()
}

fn parse_quantity(value: &str) -> Result<u64, String> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16).map_err(|e| format!("invalid quantity {}: {}", value, e))
}

fn decode_hex(value: &str) -> Result<Vec<u8>, String> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(digits).map_err(|e| format!("invalid hex data {}: {}", value, e))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn quantities() {
        assert_eq!(parse_quantity("0x7a69"), Ok(31337));
        assert_eq!(parse_quantity("0x"), Ok(0));
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn receipt_reports_submitted_project() {
        let registry = Address::new([0xc0; 20]);
        let topic = H256::keccak256(abi::PROJECT_SUBMITTED.as_bytes());
        let receipt: Receipt = serde_json::from_value(json!({
            "blockNumber": "0x10",
            "status": "0x1",
            "logs": [
                {
                    "address": "0x0000000000000000000000000000000000000001",
                    "topics": [topic],
                    "data": "0x"
                },
                {
                    "address": registry,
                    "topics": [
                        topic,
                        "0x0000000000000000000000000000000000000000000000000000000000000005",
                        "0x0000000000000000000000000707070707070707070707070707070707070707"
                    ],
                    "data": "0x"
                }
            ]
        }))
        .unwrap();
        assert_eq!(
            crate::event::submitted_project_id(&receipt_events(registry, &receipt.logs)),
            Some(5)
        );

        let bare: Receipt =
            serde_json::from_value(json!({ "blockNumber": "0x10", "status": "0x1" })).unwrap();
        assert!(receipt_events(registry, &bare.logs).is_empty());
    }

    #[test]
    fn revert_data_locations() {
        let reason = "08c379a0\
            0000000000000000000000000000000000000000000000000000000000000020\
            0000000000000000000000000000000000000000000000000000000000000004\
            6e6f706500000000000000000000000000000000000000000000000000000000";
        let flat = json!(format!("0x{}", reason));
        let nested = json!({ "message": "reverted", "data": format!("0x{}", reason) });
        for data in &[flat, nested] {
            let bytes = revert_data(data).unwrap();
            assert_eq!(abi::decode_revert_reason(&bytes), Some(String::from("nope")));
        }
        assert_eq!(revert_data(&json!(3)), None);
    }
}
