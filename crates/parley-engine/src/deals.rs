//! Deal lifecycle service
//!
//! Implements the lock protocol and the status state machine on top of the
//! deal repository and the chain watcher. The service itself holds no
//! per-deal state: concurrent checks race on the repository's conditional
//! updates, and losers re-read the post-write row.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use parley_chain::{PaymentWatcher, PriceConverter};
use parley_crypto::SecretBox;
use parley_db::{DbDeal, DbError, DealRepo};
use parley_types::{
    CryptoCurrency, DealSecret, DealStatus, Item, ParleyError, PaymentInstructions, PaymentProof,
};

use crate::tokens;

/// Attempts to draw a unique memo before giving up.
const MEMO_RETRY_LIMIT: usize = 4;

/// What a status check observed about a deal.
#[derive(Debug)]
pub enum StatusView {
    Pending(PaymentInstructions),
    Paid {
        secret: DealSecret,
        proof: PaymentProof,
    },
    Expired,
}

pub struct DealService {
    repo: DealRepo,
    watcher: Arc<dyn PaymentWatcher>,
    converter: PriceConverter,
    secrets: SecretBox,
    currency: CryptoCurrency,
    ttl: Duration,
}

impl DealService {
    pub fn new(
        repo: DealRepo,
        watcher: Arc<dyn PaymentWatcher>,
        converter: PriceConverter,
        secrets: SecretBox,
        currency: CryptoCurrency,
        ttl_seconds: i64,
    ) -> Self {
        Self {
            repo,
            watcher,
            converter,
            secrets,
            currency,
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    /// Lock an accepted offer behind an on-chain payment.
    ///
    /// Generates the reservation code, encrypts it, and inserts a PENDING
    /// deal with a fresh unique memo. The plaintext code exists only on this
    /// stack frame and is never logged.
    pub async fn lock(
        &self,
        item: &Item,
        final_price: f64,
        buyer_did: Option<&str>,
        request_id: &str,
    ) -> Result<PaymentInstructions, ParleyError> {
        let crypto_amount = self
            .converter
            .convert(final_price, self.currency)
            .map_err(|e| ParleyError::internal(e.to_string()))?;

        let reservation_code = tokens::reservation_code();
        let secret_ciphertext = self
            .secrets
            .encrypt(&reservation_code)
            .map_err(|e| ParleyError::internal(e.to_string()))?;

        let now = Utc::now();
        let expires_at = now + self.ttl;

        let mut last_err = None;
        for _ in 0..MEMO_RETRY_LIMIT {
            let deal = DbDeal {
                id: Uuid::new_v4(),
                item_id: item.id.clone(),
                item_name: item.name.clone(),
                final_price,
                crypto_amount,
                currency: self.currency.code().to_string(),
                payment_memo: tokens::payment_memo(),
                wallet_address: self.watcher.wallet_address().to_string(),
                network: self.watcher.network().to_string(),
                secret_ciphertext: secret_ciphertext.clone(),
                status: DealStatus::Pending.as_str().to_string(),
                buyer_did: buyer_did.map(String::from),
                transaction_hash: None,
                block_number: None,
                from_address: None,
                paid_at: None,
                created_at: now,
                expires_at,
                updated_at: now,
            };

            match self.repo.insert(&deal).await {
                Ok(row) => {
                    info!(
                        request_id,
                        deal_id = %row.id,
                        item_id = %row.item_id,
                        amount = row.crypto_amount,
                        currency = %row.currency,
                        expires_at = %row.expires_at,
                        "deal_created"
                    );
                    metrics::counter!("parley_deals_locked_total").increment(1);
                    return Ok(instructions_for(&row));
                }
                Err(e) if e.is_duplicate() => {
                    warn!(request_id, "payment_memo_collision");
                    last_err = Some(e);
                }
                Err(e) => return Err(store_error(e)),
            }
        }

        Err(ParleyError::internal(format!(
            "could not draw a unique payment memo: {}",
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// Check a deal's settlement status, transitioning it when warranted.
    pub async fn check(&self, deal_id: Uuid, request_id: &str) -> Result<StatusView, ParleyError> {
        let deal = self
            .repo
            .find_by_id(deal_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| ParleyError::DealNotFound {
                deal_id: deal_id.to_string(),
            })?;

        match deal.deal_status()? {
            // Verification is never repeated for a settled deal.
            DealStatus::Paid => self.paid_view(&deal),
            DealStatus::Expired => Ok(StatusView::Expired),
            DealStatus::Pending => self.check_pending(deal, request_id).await,
        }
    }

    async fn check_pending(
        &self,
        deal: DbDeal,
        request_id: &str,
    ) -> Result<StatusView, ParleyError> {
        let now = Utc::now();

        if now > deal.expires_at {
            return match self.repo.mark_expired(deal.id).await.map_err(store_error)? {
                Some(expired) => {
                    info!(
                        request_id,
                        deal_id = %expired.id,
                        expires_at = %expired.expires_at,
                        "deal_expired"
                    );
                    metrics::counter!("parley_deals_expired_total").increment(1);
                    Ok(StatusView::Expired)
                }
                // Another worker transitioned the row first; trust its write.
                None => self.reload_settled(deal.id).await,
            };
        }

        let currency: CryptoCurrency = deal.currency.parse()?;
        let proof = match self
            .watcher
            .find_payment(deal.crypto_amount, &deal.payment_memo, currency)
            .await
        {
            Ok(proof) => proof,
            Err(e) => {
                // A failed probe is not an error to the caller; the deal just
                // stays pending until the chain answers.
                warn!(request_id, deal_id = %deal.id, error = %e, "chain_probe_failed");
                None
            }
        };

        let Some(proof) = proof else {
            info!(
                request_id,
                deal_id = %deal.id,
                amount = deal.crypto_amount,
                currency = %deal.currency,
                "payment_pending"
            );
            return Ok(StatusView::Pending(instructions_for(&deal)));
        };

        match self
            .repo
            .mark_paid(deal.id, &proof)
            .await
            .map_err(store_error)?
        {
            Some(paid) => {
                info!(
                    request_id,
                    deal_id = %paid.id,
                    transaction_hash = %proof.transaction_hash,
                    block_number = %proof.block_number,
                    from_address = %proof.from_address,
                    "payment_verified"
                );
                metrics::counter!("parley_deals_paid_total").increment(1);
                self.paid_view(&paid)
            }
            // Lost the PENDING→PAID race; the winner's proof is the record.
            None => self.reload_settled(deal.id).await,
        }
    }

    /// Re-read a deal after losing a conditional-update race.
    async fn reload_settled(&self, deal_id: Uuid) -> Result<StatusView, ParleyError> {
        let deal = self
            .repo
            .find_by_id(deal_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| ParleyError::DealNotFound {
                deal_id: deal_id.to_string(),
            })?;

        match deal.deal_status()? {
            DealStatus::Paid => self.paid_view(&deal),
            DealStatus::Expired => Ok(StatusView::Expired),
            DealStatus::Pending => Ok(StatusView::Pending(instructions_for(&deal))),
        }
    }

    fn paid_view(&self, deal: &DbDeal) -> Result<StatusView, ParleyError> {
        let reservation_code = self
            .secrets
            .decrypt(&deal.secret_ciphertext)
            .map_err(|e| ParleyError::internal(e.to_string()))?;

        let paid_at = deal.paid_at.map(|t| t.timestamp()).unwrap_or_default();

        Ok(StatusView::Paid {
            secret: DealSecret {
                reservation_code,
                item_name: deal.item_name.clone(),
                final_price: deal.final_price,
                paid_at,
            },
            proof: PaymentProof {
                transaction_hash: deal.transaction_hash.clone().unwrap_or_default(),
                block_number: deal.block_number.clone().unwrap_or_default(),
                from_address: deal.from_address.clone().unwrap_or_default(),
                confirmed_at: deal.paid_at.unwrap_or_else(Utc::now),
            },
        })
    }
}

fn instructions_for(deal: &DbDeal) -> PaymentInstructions {
    PaymentInstructions {
        deal_id: deal.id,
        wallet_address: deal.wallet_address.clone(),
        amount: deal.crypto_amount,
        currency: deal.currency.clone(),
        memo: deal.payment_memo.clone(),
        network: deal.network.clone(),
        expires_at: deal.expires_at.timestamp(),
    }
}

fn store_error(e: DbError) -> ParleyError {
    ParleyError::StoreUnavailable {
        reason: e.to_string(),
    }
}
