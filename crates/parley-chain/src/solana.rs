//! Solana payment watcher
//!
//! Scans the most recent finalized transactions to the receiving address for
//! one that carries the expected memo and credits the expected amount, then
//! extracts a payment proof. Invoked synchronously from status checks, so the
//! whole probe is bounded by a wall-clock budget and returns "no proof"
//! instead of blocking.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use async_trait::async_trait;

use parley_types::{CryptoCurrency, PaymentProof};

use crate::error::ChainError;
use crate::wallet::ReceivingWallet;
use crate::PaymentWatcher;

/// Lamports per SOL.
const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// Raw units per USDC (6 decimals).
const UNITS_PER_USDC: f64 = 1_000_000.0;

/// Relative amount tolerance (0.01%) absorbing float rounding.
const AMOUNT_TOLERANCE: f64 = 1e-4;

#[derive(Debug, Clone)]
pub struct SolanaConfig {
    pub rpc_url: String,
    /// SPL mint of the accepted stablecoin.
    pub stable_token_mint: String,
    /// How many recent signatures to scan per probe.
    pub signature_limit: usize,
    /// Wall-clock budget for one probe.
    pub probe_budget: Duration,
}

impl Default for SolanaConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            stable_token_mint: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
            signature_limit: 100,
            probe_budget: Duration::from_secs(5),
        }
    }
}

pub struct SolanaWatcher {
    client: reqwest::Client,
    config: SolanaConfig,
    wallet: ReceivingWallet,
}

impl SolanaWatcher {
    pub fn new(wallet: ReceivingWallet, config: SolanaConfig) -> Self {
        info!(
            wallet_address = wallet.address(),
            network = wallet.network(),
            rpc_url = %config.rpc_url,
            "solana_watcher_initialized"
        );
        Self {
            client: reqwest::Client::new(),
            config,
            wallet,
        }
    }

    async fn scan(
        &self,
        expected_amount: f64,
        memo: &str,
        currency: CryptoCurrency,
    ) -> Result<Option<PaymentProof>, ChainError> {
        let signatures = self.recent_signatures().await?;
        if signatures.is_empty() {
            debug!(wallet_address = self.wallet.address(), "no_recent_transactions");
            return Ok(None);
        }

        for sig_info in &signatures {
            // Failed transactions carry a non-null err.
            if !sig_info
                .get("err")
                .map(Value::is_null)
                .unwrap_or(true)
            {
                continue;
            }
            let Some(signature) = sig_info.get("signature").and_then(Value::as_str) else {
                continue;
            };

            let Some(tx) = self.transaction(signature).await? else {
                continue;
            };

            if !has_memo(&tx, memo) {
                continue;
            }

            let matched = match currency {
                CryptoCurrency::SOL => {
                    native_credit(&tx, self.wallet.address())
                        .map(|credit| amounts_match(credit, expected_amount))
                        .unwrap_or(false)
                }
                CryptoCurrency::USDC => {
                    token_transfer_amount(&tx, &self.config.stable_token_mint)
                        .map(|amount| amounts_match(amount, expected_amount))
                        .unwrap_or(false)
                }
            };

            if matched {
                let sender = match currency {
                    CryptoCurrency::SOL => native_sender(&tx),
                    CryptoCurrency::USDC => token_sender(&tx),
                }
                .unwrap_or_else(|| "unknown".to_string());

                let proof = PaymentProof {
                    transaction_hash: signature.to_string(),
                    block_number: tx
                        .get("slot")
                        .and_then(Value::as_u64)
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "0".to_string()),
                    from_address: sender,
                    confirmed_at: block_time(&tx).unwrap_or_else(Utc::now),
                };

                info!(
                    transaction_hash = %proof.transaction_hash,
                    amount = expected_amount,
                    currency = %currency,
                    "payment_matched"
                );
                return Ok(Some(proof));
            }
        }

        debug!(memo, "no_matching_payment");
        Ok(None)
    }

    async fn recent_signatures(&self) -> Result<Vec<Value>, ChainError> {
        let result = self
            .rpc_call(
                "getSignaturesForAddress",
                json!([
                    self.wallet.address(),
                    { "limit": self.config.signature_limit, "commitment": "finalized" }
                ]),
            )
            .await?;

        Ok(result.as_array().cloned().unwrap_or_default())
    }

    async fn transaction(&self, signature: &str) -> Result<Option<Value>, ChainError> {
        let result = self
            .rpc_call(
                "getTransaction",
                json!([
                    signature,
                    {
                        "encoding": "jsonParsed",
                        "commitment": "finalized",
                        "maxSupportedTransactionVersion": 0
                    }
                ]),
            )
            .await?;

        if result.is_null() {
            return Ok(None);
        }
        Ok(Some(result))
    }

    /// POST a JSON-RPC call, retrying once with jitter on transport errors.
    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let mut last_err = None;
        for attempt in 0..2 {
            if attempt > 0 {
                let jitter_ms = 50 + (rand::random::<u64>() % 200);
                tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
            }

            match self
                .client
                .post(&self.config.rpc_url)
                .json(&payload)
                .send()
                .await
            {
                Ok(response) => {
                    let body: Value = response
                        .json()
                        .await
                        .map_err(|e| ChainError::Transport(e.to_string()))?;

                    if let Some(err) = body.get("error") {
                        if !err.is_null() {
                            return Err(ChainError::Rpc(format!("{method}: {err}")));
                        }
                    }
                    return Ok(body.get("result").cloned().unwrap_or(Value::Null));
                }
                Err(e) => {
                    warn!(method, attempt, error = %e, "chain_rpc_retry");
                    last_err = Some(ChainError::Transport(e.to_string()));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ChainError::Transport("rpc call failed".to_string())))
    }
}

#[async_trait]
impl PaymentWatcher for SolanaWatcher {
    fn wallet_address(&self) -> &str {
        self.wallet.address()
    }

    fn network(&self) -> &str {
        self.wallet.network()
    }

    async fn find_payment(
        &self,
        expected_amount: f64,
        memo: &str,
        currency: CryptoCurrency,
    ) -> Result<Option<PaymentProof>, ChainError> {
        match tokio::time::timeout(
            self.config.probe_budget,
            self.scan(expected_amount, memo, currency),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    memo,
                    budget_secs = self.config.probe_budget.as_secs(),
                    "chain_probe_budget_exceeded"
                );
                Ok(None)
            }
        }
    }
}

// ============================================================================
// Parsed-transaction helpers
// ============================================================================

/// Relative comparison absorbing floating-point rounding on both sides.
pub fn amounts_match(got: f64, expected: f64) -> bool {
    (got - expected).abs() <= expected.abs() * AMOUNT_TOLERANCE
}

fn instructions(tx: &Value) -> impl Iterator<Item = &Value> {
    tx.pointer("/transaction/message/instructions")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

/// Whether the transaction carries a memo-program instruction whose payload
/// equals `memo` byte-for-byte.
pub fn has_memo(tx: &Value, memo: &str) -> bool {
    instructions(tx).any(|instr| {
        instr.get("program").and_then(Value::as_str) == Some("spl-memo")
            && instr.get("parsed").and_then(Value::as_str) == Some(memo)
    })
}

fn account_keys(tx: &Value) -> Vec<&str> {
    tx.pointer("/transaction/message/accountKeys")
        .and_then(Value::as_array)
        .map(|keys| {
            keys.iter()
                .filter_map(|k| {
                    k.as_str()
                        .or_else(|| k.get("pubkey").and_then(Value::as_str))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn balance_deltas(tx: &Value) -> Vec<(String, i64)> {
    let pre = tx
        .pointer("/meta/preBalances")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let post = tx
        .pointer("/meta/postBalances")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    account_keys(tx)
        .into_iter()
        .enumerate()
        .filter_map(|(idx, key)| {
            let pre_lamports = pre.get(idx).and_then(Value::as_i64)?;
            let post_lamports = post.get(idx).and_then(Value::as_i64)?;
            Some((key.to_string(), post_lamports - pre_lamports))
        })
        .collect()
}

/// Net SOL credited to `address` in this transaction.
pub fn native_credit(tx: &Value, address: &str) -> Option<f64> {
    balance_deltas(tx)
        .into_iter()
        .find(|(key, _)| key == address)
        .map(|(_, delta)| delta as f64 / LAMPORTS_PER_SOL)
}

/// The principal payer of a native transfer: the account whose balance
/// dropped the most. Audit-trail attribution only; settlement never depends
/// on the sender.
pub fn native_sender(tx: &Value) -> Option<String> {
    balance_deltas(tx)
        .into_iter()
        .filter(|(_, delta)| *delta < 0)
        .min_by_key(|(_, delta)| *delta)
        .map(|(key, _)| key)
}

/// Stablecoin amount moved by a token-program transfer in this transaction.
pub fn token_transfer_amount(tx: &Value, expected_mint: &str) -> Option<f64> {
    instructions(tx)
        .filter(|instr| instr.get("program").and_then(Value::as_str) == Some("spl-token"))
        .find_map(|instr| {
            let parsed = instr.get("parsed")?;
            match parsed.get("type").and_then(Value::as_str) {
                Some("transfer") => {
                    let raw: f64 = parsed
                        .pointer("/info/amount")
                        .and_then(Value::as_str)?
                        .parse()
                        .ok()?;
                    Some(raw / UNITS_PER_USDC)
                }
                Some("transferChecked") => {
                    let mint = parsed.pointer("/info/mint").and_then(Value::as_str)?;
                    if mint != expected_mint {
                        return None;
                    }
                    parsed
                        .pointer("/info/tokenAmount/uiAmount")
                        .and_then(Value::as_f64)
                }
                _ => None,
            }
        })
}

/// Sender of a token transfer, from the token-transfer record itself.
pub fn token_sender(tx: &Value) -> Option<String> {
    instructions(tx)
        .filter(|instr| instr.get("program").and_then(Value::as_str) == Some("spl-token"))
        .find_map(|instr| {
            let parsed = instr.get("parsed")?;
            let kind = parsed.get("type").and_then(Value::as_str)?;
            if kind != "transfer" && kind != "transferChecked" {
                return None;
            }
            parsed
                .pointer("/info/authority")
                .or_else(|| parsed.pointer("/info/source"))
                .and_then(Value::as_str)
                .map(String::from)
        })
}

fn block_time(tx: &Value) -> Option<DateTime<Utc>> {
    let secs = tx.get("blockTime").and_then(Value::as_i64)?;
    DateTime::from_timestamp(secs, 0)
}
