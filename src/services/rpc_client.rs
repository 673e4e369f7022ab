//! Bitcoin Core RPC client used as the confirmation source for a loaded
//! contract: which of the contract's candidate transactions have landed,
//! and where the chain tip currently sits.

use crate::config::{env as config_env, network};
use crate::error::{ServiceError, ServiceResult};
use bitcoin::Txid;
use bitcoincore_rpc::{Auth, Client, RpcApi};
use serde_json::Value;
use std::env;

#[derive(Debug)]
pub struct NodeClient {
    client: Client,
    wallet_name: String,
}

impl NodeClient {
    /// Create a new RPC client with configuration from environment or defaults
    pub fn new() -> ServiceResult<Self> {
        // Load environment variables
        dotenv::dotenv().ok();

        let rpc_url = env::var(config_env::RPC_URL)
            .unwrap_or_else(|_| network::DEFAULT_RPC_HOST.to_string());
        let rpc_port = env::var(config_env::RPC_PORT)
            .unwrap_or_else(|_| network::DEFAULT_RPC_PORT.to_string());
        let rpc_user = env::var(config_env::RPC_USER)
            .unwrap_or_else(|_| network::DEFAULT_RPC_USER.to_string());
        let rpc_password = env::var(config_env::RPC_PASSWORD)
            .unwrap_or_else(|_| network::DEFAULT_RPC_PASSWORD.to_string());
        let wallet_name = env::var(config_env::RPC_WALLET)
            .unwrap_or_else(|_| network::DEFAULT_WALLET_NAME.to_string());

        let auth = Auth::UserPass(rpc_user, rpc_password);
        let url = format!("http://{}:{}/wallet/{}", rpc_url, rpc_port, wallet_name);

        let client = Client::new(&url, auth)?;

        Ok(NodeClient {
            client,
            wallet_name,
        })
    }

    pub fn wallet_name(&self) -> &str {
        &self.wallet_name
    }

    /// Get current block count
    pub fn get_block_count(&self) -> ServiceResult<u64> {
        Ok(self.client.get_block_count()?)
    }

    /// Get the timestamp of the current chain tip
    pub fn get_best_block_time(&self) -> ServiceResult<u64> {
        let info = self
            .client
            .call::<Value>("getblockchaininfo", &[])?;
        info["time"]
            .as_u64()
            .or_else(|| info["mediantime"].as_u64())
            .ok_or_else(|| ServiceError::invalid_response("no tip timestamp in blockchain info"))
    }

    /// Get a raw transaction with verbose information
    pub fn get_raw_transaction_verbose(&self, txid: &Txid) -> ServiceResult<Value> {
        let result = self
            .client
            .call::<Value>("getrawtransaction", &[txid.to_string().into(), true.into()])?;
        Ok(result)
    }

    /// Get the number of confirmations for a transaction
    pub fn get_confirmations(&self, txid: &Txid) -> ServiceResult<u64> {
        match self.get_raw_transaction_verbose(txid) {
            Ok(tx_info) => Ok(tx_info["confirmations"].as_u64().unwrap_or(0)),
            // Transaction not found means 0 confirmations
            Err(_) => Ok(0),
        }
    }

    /// Filter the candidate txids down to those the node reports as
    /// confirmed past the configured threshold
    pub fn confirmed_transactions(&self, candidates: &[Txid]) -> ServiceResult<Vec<Txid>> {
        let mut confirmed = Vec::new();
        for txid in candidates {
            let confirmations = self.get_confirmations(txid)?;
            log::debug!("{txid}: {confirmations} confirmations");
            if confirmations >= network::CONFIRMATION_THRESHOLD {
                confirmed.push(*txid);
            }
        }
        Ok(confirmed)
    }
}
