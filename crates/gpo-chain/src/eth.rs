//! Ethereum JSON-RPC implementation of the chain capabilities.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, JsonRpcClient, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, U256, U64};
use tracing::{error, info, warn};

use gpo_core::RpcSettings;

use crate::contract::GasPriceOracleContract;
use crate::error::{ChainError, ChainResult};
use crate::{ChainObserver, PriceWriter};

/// How often to retry `eth_chainId` while waiting for the node to come up.
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Pending transaction poll interval.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

type SignerClient<P> = SignerMiddleware<Provider<P>, LocalWallet>;

/// Chain client backed by a JSON-RPC endpoint and a local signing key.
pub struct EthClient<P = Http> {
    provider: Provider<P>,
    contract: GasPriceOracleContract<SignerClient<P>>,
    signer: Address,
    transaction_gas_price: Option<U256>,
    wait_for_receipt: bool,
    request_timeout: Duration,
    receipt_timeout: Duration,
}

impl EthClient<Http> {
    /// Connect to the configured node over HTTP.
    ///
    /// The key, contract address, and URL are parsed before any network I/O.
    /// Blocks until the node answers `eth_chainId`, retrying every 5 seconds.
    pub async fn connect(settings: &RpcSettings) -> ChainResult<Self> {
        let wallet: LocalWallet = settings
            .private_key
            .parse()
            .map_err(|e| ChainError::InvalidKey(format!("{e}")))?;
        let contract_address: Address = settings
            .gas_price_oracle_address
            .parse()
            .map_err(|e| {
                ChainError::InvalidAddress(format!("{}: {e}", settings.gas_price_oracle_address))
            })?;
        let provider = Provider::<Http>::try_from(settings.ethereum_http_url.as_str())
            .map_err(|e| ChainError::InvalidUrl(format!("{}: {e}", settings.ethereum_http_url)))?
            .interval(POLL_INTERVAL);

        let remote_chain_id = wait_for_chain_id(&provider, settings.request_timeout).await;
        let chain_id = match settings.chain_id {
            Some(configured) => {
                if U256::from(configured) != remote_chain_id {
                    warn!(
                        configured,
                        remote = %remote_chain_id,
                        "configured chain id differs from the node's"
                    );
                }
                configured
            }
            None => {
                info!(chain_id = %remote_chain_id, "chain id unset, using the node's");
                u64::try_from(remote_chain_id).map_err(|_| {
                    ChainError::Rpc(format!("chain id {remote_chain_id} exceeds 64 bits"))
                })?
            }
        };

        let client = Self::new(
            provider,
            wallet.with_chain_id(chain_id),
            contract_address,
            settings,
        );

        info!(
            url = %settings.ethereum_http_url,
            chain_id,
            contract = ?contract_address,
            signer = ?client.signer,
            "connected to chain"
        );
        Ok(client)
    }
}

impl<P: JsonRpcClient + Clone + 'static> EthClient<P> {
    /// Bind an already constructed provider. `wallet` must carry the chain id
    /// transactions are signed for.
    pub fn new(
        provider: Provider<P>,
        wallet: LocalWallet,
        contract_address: Address,
        settings: &RpcSettings,
    ) -> Self {
        let signer = wallet.address();
        let client = Arc::new(SignerMiddleware::new(provider.clone(), wallet));
        Self {
            provider,
            contract: GasPriceOracleContract::new(contract_address, client),
            signer,
            transaction_gas_price: settings.transaction_gas_price.map(U256::from),
            wait_for_receipt: settings.wait_for_receipt,
            request_timeout: settings.request_timeout,
            receipt_timeout: settings.receipt_timeout,
        }
    }
}

impl<P: JsonRpcClient + 'static> ChainObserver for EthClient<P> {
    async fn latest_height(&self) -> ChainResult<u64> {
        let number = bounded(self.request_timeout, self.provider.get_block_number()).await?;
        Ok(number.as_u64())
    }

    async fn on_chain_price(&self) -> ChainResult<f64> {
        let call = self.contract.gas_price();
        let price = bounded(self.request_timeout, call.call()).await?;
        u256_to_f64(price)
    }

    async fn verify_authority(&self, signer: Address) -> ChainResult<bool> {
        let call = self.contract.owner();
        let owner = bounded(self.request_timeout, call.call()).await?;
        if owner != signer {
            error!(signer = ?signer, owner = ?owner, "signing key does not match contract owner");
        }
        Ok(owner == signer)
    }
}

impl<P: JsonRpcClient + 'static> PriceWriter for EthClient<P> {
    fn signer(&self) -> Address {
        self.signer
    }

    async fn submit_price(&self, price: f64) -> ChainResult<()> {
        let value = price_to_wei(price)?;

        let mut call = self.contract.set_gas_price(value).legacy();
        if let Some(gas_price) = self.transaction_gas_price {
            call = call.gas_price(gas_price);
        }

        let pending = bounded(self.request_timeout, call.send()).await?;
        let tx_hash = pending.tx_hash();
        info!(?tx_hash, gas_price = %value, "gas price update sent");

        if !self.wait_for_receipt {
            return Ok(());
        }

        let receipt = bounded(self.receipt_timeout, pending)
            .await?
            .ok_or(ChainError::Dropped(tx_hash))?;
        if receipt.status != Some(U64::from(1)) {
            return Err(ChainError::Reverted(tx_hash));
        }

        info!(
            ?tx_hash,
            block = ?receipt.block_number,
            gas_used = ?receipt.gas_used,
            "gas price update confirmed"
        );
        Ok(())
    }
}

/// Poll `eth_chainId` until the node answers.
async fn wait_for_chain_id(provider: &Provider<Http>, request_timeout: Duration) -> U256 {
    let mut ticker = tokio::time::interval(CONNECT_RETRY_INTERVAL);
    loop {
        ticker.tick().await;
        match bounded(request_timeout, provider.get_chainid()).await {
            Ok(chain_id) => return chain_id,
            Err(e) => warn!(error = %e, "node not reachable, retrying"),
        }
    }
}

/// Run an RPC future with a deadline.
async fn bounded<T, E, F>(limit: Duration, fut: F) -> ChainResult<T>
where
    E: Display,
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(ChainError::Rpc(e.to_string())),
        Err(_) => Err(ChainError::Timeout(limit)),
    }
}

fn u256_to_f64(value: U256) -> ChainResult<f64> {
    if value > U256::from(u128::MAX) {
        return Err(ChainError::InvalidPrice(format!("{value} exceeds 128 bits")));
    }
    Ok(value.as_u128() as f64)
}

/// On-chain prices are integers; fractional parts are dropped.
fn price_to_wei(price: f64) -> ChainResult<U256> {
    if !price.is_finite() || price < 0.0 {
        return Err(ChainError::InvalidPrice(price.to_string()));
    }
    if price >= u128::MAX as f64 {
        return Err(ChainError::InvalidPrice(format!("{price} exceeds 128 bits")));
    }
    Ok(U256::from(price.trunc() as u128))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use ethers::providers::MockError;
    use ethers::types::{Transaction, TransactionReceipt, TxHash};
    use ethers::utils::{hex, id};
    use gpo_core::OracleConfig;
    use serde::de::DeserializeOwned;
    use serde::Serialize;
    use serde_json::{json, Value};

    const KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[derive(Debug, Default)]
    struct Script {
        responses: HashMap<String, VecDeque<Value>>,
        calls: Vec<(String, Value)>,
    }

    /// JSON-RPC transport answering from canned per-method responses. The
    /// last response queued for a method repeats, so polling loops settle.
    #[derive(Debug, Clone, Default)]
    struct ScriptedRpc {
        script: Arc<Mutex<Script>>,
    }

    impl ScriptedRpc {
        fn respond(&self, method: &str, value: Value) -> &Self {
            self.script
                .lock()
                .unwrap()
                .responses
                .entry(method.to_string())
                .or_default()
                .push_back(value);
            self
        }

        fn methods(&self) -> Vec<String> {
            let script = self.script.lock().unwrap();
            script.calls.iter().map(|(method, _)| method.clone()).collect()
        }

        fn params(&self, method: &str) -> Vec<Value> {
            let script = self.script.lock().unwrap();
            script
                .calls
                .iter()
                .filter(|(m, _)| m == method)
                .map(|(_, params)| params.clone())
                .collect()
        }
    }

    #[async_trait::async_trait]
    impl JsonRpcClient for ScriptedRpc {
        type Error = MockError;

        async fn request<T: Serialize + Send + Sync, R: DeserializeOwned>(
            &self,
            method: &str,
            params: T,
        ) -> Result<R, MockError> {
            let params = serde_json::to_value(params)?;
            let value = {
                let mut script = self.script.lock().unwrap();
                script.calls.push((method.to_string(), params));
                let queue = script
                    .responses
                    .get_mut(method)
                    .ok_or(MockError::EmptyResponses)?;
                let next = if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                };
                next.ok_or(MockError::EmptyResponses)?
            };
            Ok(serde_json::from_value(value)?)
        }
    }

    fn settings(key: &str) -> RpcSettings {
        let mut settings = OracleConfig {
            private_key: Some(KEY.to_string()),
            target_gas_per_second: Some(1.0),
            max_percent_change_per_epoch: Some(0.1),
            average_block_gas_limit_per_epoch: Some(1.0),
            epoch_length_seconds: Some(1),
            ..Default::default()
        }
        .validate()
        .unwrap()
        .rpc;
        settings.private_key = key.to_string();
        settings
    }

    fn wallet() -> LocalWallet {
        KEY.parse::<LocalWallet>().unwrap().with_chain_id(10u64)
    }

    fn client(rpc: &ScriptedRpc, settings: &RpcSettings) -> EthClient<ScriptedRpc> {
        let provider = Provider::new(rpc.clone()).interval(Duration::from_millis(10));
        let contract = settings.gas_price_oracle_address.parse().unwrap();
        EthClient::new(provider, wallet(), contract, settings)
    }

    fn word(value: u64) -> Value {
        json!(format!("0x{value:064x}"))
    }

    fn address_word(address: Address) -> Value {
        json!(format!("0x{:0>64}", hex::encode(address)))
    }

    fn tx_hash() -> TxHash {
        TxHash::repeat_byte(0xab)
    }

    /// Responses for filling, signing and broadcasting one transaction.
    fn script_send(rpc: &ScriptedRpc) {
        rpc.respond("eth_getTransactionCount", json!("0x3"))
            .respond("eth_gasPrice", json!("0x3b9aca00"))
            .respond("eth_estimateGas", json!("0x5208"))
            .respond("eth_sendRawTransaction", json!(tx_hash()));
    }

    fn script_mined(rpc: &ScriptedRpc, status: u64) {
        let tx = Transaction {
            hash: tx_hash(),
            block_number: Some(U64::from(7)),
            ..Default::default()
        };
        let receipt = TransactionReceipt {
            transaction_hash: tx_hash(),
            block_number: Some(U64::from(7)),
            status: Some(U64::from(status)),
            ..Default::default()
        };
        rpc.respond("eth_getTransactionByHash", serde_json::to_value(tx).unwrap())
            .respond("eth_getTransactionReceipt", serde_json::to_value(receipt).unwrap());
    }

    /// The single raw transaction broadcast, as lowercase hex without `0x`.
    fn sent_raw(rpc: &ScriptedRpc) -> String {
        let sent = rpc.params("eth_sendRawTransaction");
        assert_eq!(sent.len(), 1);
        sent[0][0].as_str().unwrap().trim_start_matches("0x").to_lowercase()
    }

    #[tokio::test]
    async fn latest_height_reads_block_number() {
        let rpc = ScriptedRpc::default();
        rpc.respond("eth_blockNumber", json!("0x2a"));

        let height = client(&rpc, &settings(KEY)).latest_height().await.unwrap();
        assert_eq!(height, 42);
    }

    #[tokio::test]
    async fn on_chain_price_decodes_contract_value() {
        let rpc = ScriptedRpc::default();
        rpc.respond("eth_call", word(1_000_000_000));

        let price = client(&rpc, &settings(KEY)).on_chain_price().await.unwrap();
        assert_eq!(price, 1e9);
        assert_eq!(rpc.methods(), vec!["eth_call"]);
    }

    #[tokio::test]
    async fn rpc_failure_is_reported() {
        // Nothing scripted: every request fails.
        let rpc = ScriptedRpc::default();
        let result = client(&rpc, &settings(KEY)).latest_height().await;
        assert!(matches!(result, Err(ChainError::Rpc(_))));
    }

    #[tokio::test]
    async fn authority_matches_contract_owner() {
        let signer = wallet().address();

        let rpc = ScriptedRpc::default();
        rpc.respond("eth_call", address_word(signer));
        let owned = client(&rpc, &settings(KEY));
        assert_eq!(owned.signer(), signer);
        assert!(owned.verify_authority(signer).await.unwrap());

        let rpc = ScriptedRpc::default();
        rpc.respond("eth_call", address_word(Address::repeat_byte(0x22)));
        let foreign = client(&rpc, &settings(KEY));
        assert!(!foreign.verify_authority(signer).await.unwrap());
    }

    #[tokio::test]
    async fn submit_sends_truncated_legacy_transaction() {
        let rpc = ScriptedRpc::default();
        script_send(&rpc);

        client(&rpc, &settings(KEY)).submit_price(1234.9).await.unwrap();

        let raw = sent_raw(&rpc);
        // Legacy transactions are a bare RLP list, typed ones start with 0x01/0x02.
        assert!(u8::from_str_radix(&raw[..2], 16).unwrap() >= 0xc0);
        let calldata = format!("{}{:064x}", hex::encode(id("setGasPrice(uint256)")), 1234u64);
        assert!(raw.contains(&calldata), "{raw}");
        // Gas price came from the node.
        assert!(rpc.methods().iter().any(|m| m == "eth_gasPrice"));
        // Not waiting for a receipt.
        assert!(rpc.params("eth_getTransactionReceipt").is_empty());
    }

    #[tokio::test]
    async fn configured_transaction_gas_price_is_used() {
        let rpc = ScriptedRpc::default();
        script_send(&rpc);
        let mut settings = settings(KEY);
        settings.transaction_gas_price = Some(7_000_000_000);

        client(&rpc, &settings).submit_price(1.0).await.unwrap();

        assert!(!rpc.methods().iter().any(|m| m == "eth_gasPrice"));
        // RLP encoding of 7 gwei.
        assert!(sent_raw(&rpc).contains("8501a13b8600"));
    }

    #[tokio::test]
    async fn successful_receipt_is_accepted() {
        let rpc = ScriptedRpc::default();
        script_send(&rpc);
        script_mined(&rpc, 1);
        let mut settings = settings(KEY);
        settings.wait_for_receipt = true;

        client(&rpc, &settings).submit_price(5.0).await.unwrap();
        assert!(!rpc.params("eth_getTransactionReceipt").is_empty());
    }

    #[tokio::test]
    async fn reverted_receipt_is_an_error() {
        let rpc = ScriptedRpc::default();
        script_send(&rpc);
        script_mined(&rpc, 0);
        let mut settings = settings(KEY);
        settings.wait_for_receipt = true;

        let result = client(&rpc, &settings).submit_price(5.0).await;
        assert!(matches!(result, Err(ChainError::Reverted(h)) if h == tx_hash()));
    }

    #[tokio::test]
    async fn dropped_transaction_is_an_error() {
        let rpc = ScriptedRpc::default();
        script_send(&rpc);
        rpc.respond("eth_getTransactionByHash", Value::Null);
        let mut settings = settings(KEY);
        settings.wait_for_receipt = true;

        let result = client(&rpc, &settings).submit_price(5.0).await;
        assert!(matches!(result, Err(ChainError::Dropped(h)) if h == tx_hash()));
    }

    #[tokio::test]
    async fn invalid_price_is_not_sent() {
        let rpc = ScriptedRpc::default();
        script_send(&rpc);

        let result = client(&rpc, &settings(KEY)).submit_price(-1.0).await;
        assert!(matches!(result, Err(ChainError::InvalidPrice(_))));
        assert!(rpc.methods().is_empty());
    }

    #[test]
    fn price_is_truncated_to_integer_wei() {
        assert_eq!(price_to_wei(11.9).unwrap(), U256::from(11u64));
        assert_eq!(price_to_wei(0.0).unwrap(), U256::zero());
    }

    #[test]
    fn unrepresentable_prices_are_rejected() {
        assert!(price_to_wei(-1.0).is_err());
        assert!(price_to_wei(f64::NAN).is_err());
        assert!(price_to_wei(f64::INFINITY).is_err());
    }

    #[test]
    fn u256_conversion() {
        assert_eq!(u256_to_f64(U256::from(1_000_000_000u64)).unwrap(), 1e9);
        assert!(u256_to_f64(U256::MAX).is_err());
    }

    #[tokio::test]
    async fn bounded_times_out() {
        let never = std::future::pending::<Result<(), ChainError>>();
        let result = bounded(Duration::from_millis(10), never).await;
        assert!(matches!(result, Err(ChainError::Timeout(_))));
    }

    #[tokio::test]
    async fn bounded_maps_errors() {
        let failing = async { Err::<(), _>("boom") };
        let result = bounded(Duration::from_secs(1), failing).await;
        assert!(matches!(result, Err(ChainError::Rpc(msg)) if msg == "boom"));
    }

    #[tokio::test]
    async fn bad_key_fails_before_network() {
        // Nothing listens here; a key error must be reported without waiting
        // for the node.
        let result = EthClient::connect(&settings("not-a-key")).await;
        assert!(matches!(result, Err(ChainError::InvalidKey(_))));
    }
}
