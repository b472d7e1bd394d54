use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, Bytes, TxHash, U256, U64};
use async_trait::async_trait;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::chain::{ForkedChain, SimulationMode, Transaction};
use crate::error::{ChainError, ThenOk};

/// A forked node (anvil or hardhat) reached over JSON-RPC.
///
/// Cheat-codes use the `hardhat_*` and `evm_*` namespaces, which anvil
/// accepts as aliases.
pub struct RpcChain {
    client: reqwest::Client,
    url: String,
    mode: SimulationMode,
    next_id: AtomicU64,
    receipt_poll_interval: Duration,
    receipt_attempts: u32,
}

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(250);
const RECEIPT_ATTEMPTS: u32 = 120;

#[derive(Serialize)]
struct Request<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    result: Value,
    error: Option<ErrorObject>,
}

#[derive(Debug, Deserialize)]
struct ErrorObject {
    code: i64,
    message: String,
}

impl Response {
    fn into_result<T: DeserializeOwned>(self) -> Result<T, ChainError> {
        if let Some(ErrorObject { code, message }) = self.error {
            return Err(ChainError::Rpc { code, message });
        }

        Ok(serde_json::from_value(self.result)?)
    }
}

#[derive(Debug, Serialize)]
struct TransactionRequest<'a> {
    from: Address,
    to: Address,
    value: U256,
    data: &'a Bytes,
}

impl<'a> From<&'a Transaction> for TransactionRequest<'a> {
    fn from(tx: &'a Transaction) -> Self {
        Self {
            from: tx.from,
            to: tx.to,
            value: tx.value,
            data: &tx.input,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Receipt {
    status: U64,
}

impl RpcChain {
    pub fn new(url: impl Into<String>, mode: SimulationMode) -> Result<Self, ChainError> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            url: url.into(),
            mode,
            next_id: AtomicU64::new(1),
            receipt_poll_interval: RECEIPT_POLL_INTERVAL,
            receipt_attempts: RECEIPT_ATTEMPTS,
        })
    }

    /// How often, and how many times, to ask for a receipt before giving up.
    ///
    /// Only matters on forks that mine on an interval instead of per transaction.
    pub fn with_receipt_polling(mut self, interval: Duration, attempts: u32) -> Self {
        self.receipt_poll_interval = interval;
        self.receipt_attempts = attempts.max(1);
        self
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        trace!(id, method, %params, "json-rpc request");

        let response: Response = self
            .client
            .post(&self.url)
            .json(&Request {
                jsonrpc: "2.0",
                id,
                method,
                params,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response.into_result()
    }

    async fn cheat(&self, method: &'static str, params: Value) -> Result<(), ChainError> {
        self.mode.require(method)?;
        self.request::<IgnoredAny>(method, params).await?;

        Ok(())
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> Result<Receipt, ChainError> {
        for attempt in 1..=self.receipt_attempts {
            let receipt: Option<Receipt> = self
                .request("eth_getTransactionReceipt", json!([hash]))
                .await?;

            if let Some(receipt) = receipt {
                return Ok(receipt);
            }

            debug!(%hash, attempt, "transaction not mined yet");
            if attempt < self.receipt_attempts {
                tokio::time::sleep(self.receipt_poll_interval).await;
            }
        }

        Err(ChainError::MissingReceipt(hash))
    }
}

#[async_trait]
impl ForkedChain for RpcChain {
    async fn block_number(&self) -> Result<u64, ChainError> {
        let number: U64 = self.request("eth_blockNumber", json!([])).await?;

        Ok(number.to())
    }

    async fn balance(&self, account: Address) -> Result<U256, ChainError> {
        self.request("eth_getBalance", json!([account, "latest"]))
            .await
    }

    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, ChainError> {
        self.request("eth_call", json!([{ "to": to, "data": input }, "latest"]))
            .await
    }

    async fn send_transaction(&self, tx: Transaction) -> Result<TxHash, ChainError> {
        let hash: TxHash = self
            .request(
                "eth_sendTransaction",
                json!([TransactionRequest::from(&tx)]),
            )
            .await?;

        let receipt = self.wait_for_receipt(hash).await?;

        (receipt.status == U64::from(1)).then_ok(
            hash,
            ChainError::Reverted {
                reason: format!("transaction {hash} failed"),
            },
        )
    }

    async fn mine_block(&self) -> Result<(), ChainError> {
        self.cheat("evm_mine", json!([])).await
    }

    async fn increase_time(&self, seconds: u64) -> Result<(), ChainError> {
        self.cheat("evm_increaseTime", json!([seconds])).await
    }

    async fn impersonate(&self, account: Address) -> Result<(), ChainError> {
        self.cheat("hardhat_impersonateAccount", json!([account]))
            .await
    }

    async fn set_balance(&self, account: Address, amount: U256) -> Result<(), ChainError> {
        self.cheat("hardhat_setBalance", json!([account, amount]))
            .await
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, b256};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    const ACCOUNT: Address = address!("2b1ad6184a6b0fac06bd225ed37c2abc04415ff4");

    /// Answers each json-rpc request with the next canned `result` and
    /// returns the request bodies it received.
    async fn serve(responses: Vec<Value>) -> (String, tokio::task::JoinHandle<Vec<Value>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();

            for response in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = Vec::new();
                let body = loop {
                    let mut chunk = [0u8; 4096];
                    let n = socket.read(&mut chunk).await.unwrap();
                    buf.extend_from_slice(&chunk[..n]);

                    let text = String::from_utf8_lossy(&buf).to_string();
                    if let Some(split) = text.find("\r\n\r\n") {
                        let length = text[..split]
                            .lines()
                            .find_map(|line| {
                                let (name, value) = line.split_once(':')?;
                                name.eq_ignore_ascii_case("content-length")
                                    .then(|| value.trim().parse::<usize>().ok())
                                    .flatten()
                            })
                            .unwrap_or(0);
                        if buf.len() >= split + 4 + length {
                            break buf[split + 4..split + 4 + length].to_vec();
                        }
                    }
                    assert!(n > 0, "connection closed before full request");
                };

                let request: Value = serde_json::from_slice(&body).unwrap();
                let payload = json!({ "jsonrpc": "2.0", "id": request["id"], "result": response })
                    .to_string();
                let reply = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    payload.len(),
                    payload
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
                requests.push(request);
            }

            requests
        });

        (url, handle)
    }

    #[test]
    fn error_object_becomes_rpc_error() {
        let response: Response = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32603, "message": "execution reverted: voting is closed" }
        }))
        .unwrap();

        assert!(matches!(
            response.into_result::<Value>(),
            Err(ChainError::Rpc { code: -32603, message }) if message.contains("voting is closed")
        ));
    }

    #[test]
    fn null_result_satisfies_cheat_codes() {
        let response: Response =
            serde_json::from_value(json!({ "jsonrpc": "2.0", "id": 1, "result": null })).unwrap();

        assert!(response.into_result::<IgnoredAny>().is_ok());
    }

    #[test]
    fn transaction_request_uses_data_field() {
        let tx = Transaction::call(ACCOUNT, ACCOUNT, vec![0xde_u8, 0xad]);
        let value = serde_json::to_value(TransactionRequest::from(&tx)).unwrap();

        assert_eq!(value["data"], "0xdead");
        assert_eq!(value["value"], "0x0");
        assert!(value["from"]
            .as_str()
            .unwrap()
            .eq_ignore_ascii_case("0x2b1ad6184a6b0fac06bd225ed37c2abc04415ff4"));
    }

    #[tokio::test]
    async fn cheat_codes_are_refused_outside_simulation_mode() {
        let chain = RpcChain::new("http://127.0.0.1:9", SimulationMode::Disabled).unwrap();

        assert!(matches!(
            chain.mine_block().await,
            Err(ChainError::SimulationModeDisabled { method: "evm_mine" })
        ));
        assert!(matches!(
            chain.increase_time(1).await,
            Err(ChainError::SimulationModeDisabled { method: "evm_increaseTime" })
        ));
        assert!(matches!(
            chain.impersonate(ACCOUNT).await,
            Err(ChainError::SimulationModeDisabled { method: "hardhat_impersonateAccount" })
        ));
        assert!(matches!(
            chain.set_balance(ACCOUNT, U256::from(1u8)).await,
            Err(ChainError::SimulationModeDisabled { method: "hardhat_setBalance" })
        ));
    }

    #[tokio::test]
    async fn block_number_decodes_hex_quantity() {
        let (url, server) = serve(vec![json!("0xd3b4a1")]).await;
        let chain = RpcChain::new(url, SimulationMode::Enabled).unwrap();

        assert_eq!(chain.block_number().await.unwrap(), 0xd3b4a1);

        let requests = server.await.unwrap();
        assert_eq!(requests[0]["method"], "eth_blockNumber");
    }

    #[tokio::test]
    async fn send_transaction_checks_receipt_status() {
        let hash = b256!("1111111111111111111111111111111111111111111111111111111111111111");
        let (url, server) = serve(vec![
            json!(hash),
            json!({ "status": "0x0" }),
        ])
        .await;
        let chain = RpcChain::new(url, SimulationMode::Enabled).unwrap();

        let result = chain
            .send_transaction(Transaction::call(ACCOUNT, ACCOUNT, Bytes::new()))
            .await;
        assert!(matches!(result, Err(ChainError::Reverted { .. })));

        let requests = server.await.unwrap();
        assert_eq!(requests[0]["method"], "eth_sendTransaction");
        assert_eq!(requests[1]["method"], "eth_getTransactionReceipt");
        assert_eq!(requests[1]["params"][0], json!(hash));
    }

    #[tokio::test]
    async fn send_transaction_waits_for_interval_mining() {
        let hash = b256!("2222222222222222222222222222222222222222222222222222222222222222");
        let (url, server) = serve(vec![
            json!(hash),
            Value::Null,
            Value::Null,
            json!({ "status": "0x1" }),
        ])
        .await;
        let chain = RpcChain::new(url, SimulationMode::Enabled)
            .unwrap()
            .with_receipt_polling(Duration::from_millis(1), 5);

        let sent = chain
            .send_transaction(Transaction::call(ACCOUNT, ACCOUNT, Bytes::new()))
            .await;
        assert_eq!(sent.unwrap(), hash);

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 4);
        assert!(requests[1..]
            .iter()
            .all(|request| request["method"] == "eth_getTransactionReceipt"));
    }

    #[tokio::test]
    async fn send_transaction_gives_up_without_receipt() {
        let hash = b256!("3333333333333333333333333333333333333333333333333333333333333333");
        let (url, server) = serve(vec![json!(hash), Value::Null, Value::Null]).await;
        let chain = RpcChain::new(url, SimulationMode::Enabled)
            .unwrap()
            .with_receipt_polling(Duration::from_millis(1), 2);

        let sent = chain
            .send_transaction(Transaction::call(ACCOUNT, ACCOUNT, Bytes::new()))
            .await;
        assert!(matches!(sent, Err(ChainError::MissingReceipt(missing)) if missing == hash));

        assert_eq!(server.await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn impersonation_is_forwarded_in_simulation_mode() {
        let (url, server) = serve(vec![Value::Null]).await;
        let chain = RpcChain::new(url, SimulationMode::Enabled).unwrap();

        chain.impersonate(ACCOUNT).await.unwrap();

        let requests = server.await.unwrap();
        assert_eq!(requests[0]["method"], "hardhat_impersonateAccount");
        assert_eq!(requests[0]["params"].as_array().unwrap().len(), 1);
    }
}
