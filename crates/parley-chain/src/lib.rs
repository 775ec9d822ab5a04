//! Parley chain integration
//!
//! Read-only view of the settlement chain: given an expected amount, a memo,
//! and a currency, decide whether a finalized inbound transfer settles a deal
//! and produce the payment proof. The watcher never signs or submits
//! transactions; the receiving wallet key is used only to derive the address
//! payments go to.

pub mod error;
pub mod pricing;
pub mod solana;
pub mod wallet;

use async_trait::async_trait;

use parley_types::{CryptoCurrency, PaymentProof};

pub use error::ChainError;
pub use pricing::{PriceConverter, RateOptions};
pub use solana::{SolanaConfig, SolanaWatcher};
pub use wallet::ReceivingWallet;

/// The seam between the deal lifecycle and any concrete chain.
///
/// Replay defense is not this trait's job: the deal store's conditional
/// `PENDING→PAID` update subsumes it.
#[async_trait]
pub trait PaymentWatcher: Send + Sync {
    /// Address buyers must pay.
    fn wallet_address(&self) -> &str;

    /// Network tag included in payment instructions.
    fn network(&self) -> &str;

    /// Search recent finalized transfers for one settling `(amount, memo)`.
    ///
    /// Returns `Ok(None)` when no matching transfer exists yet or the probe
    /// budget elapsed; `Err` only on structural RPC failures.
    async fn find_payment(
        &self,
        expected_amount: f64,
        memo: &str,
        currency: CryptoCurrency,
    ) -> Result<Option<PaymentProof>, ChainError>;
}
