// crates/trustflow-adapters/src/anchor.rs
//
// LocalLedger: an in-process, hash-chained ledger that stands in for a
// blockchain. Every anchor appends one block whose tx hash commits to the
// previous block's hash, the payload digest, and the subject.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use trustflow_core::{AnchorReceipt, BlockchainAnchorService, TrustflowError};

#[derive(Debug)]
struct ChainTip {
    height: u64,
    hash: String,
}

/// Append-only local ledger.
#[derive(Debug)]
pub struct LocalLedger {
    tip: Mutex<ChainTip>,
    blocks: Mutex<Vec<AnchorReceipt>>,
    available: AtomicBool,
}

impl LocalLedger {
    pub fn new() -> Self {
        let genesis = hex::encode(Sha256::digest(b"trustflow-local-ledger-genesis"));
        Self {
            tip: Mutex::new(ChainTip {
                height: 0,
                hash: genesis,
            }),
            blocks: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle availability; while unavailable every anchor fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub async fn height(&self) -> u64 {
        self.tip.lock().await.height
    }

    /// Every receipt issued so far, oldest first.
    pub async fn receipts(&self) -> Vec<AnchorReceipt> {
        self.blocks.lock().await.clone()
    }
}

impl Default for LocalLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// SHA-256 of the payload's JSON encoding, hex-encoded.
pub fn payload_digest(payload: &serde_json::Value) -> Result<String, TrustflowError> {
    let bytes = serde_json::to_vec(payload)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[async_trait]
impl BlockchainAnchorService for LocalLedger {
    async fn anchor(
        &self,
        subject_id: &str,
        payload: &serde_json::Value,
        network: &str,
    ) -> Result<AnchorReceipt, TrustflowError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(TrustflowError::AnchorUnavailable(format!(
                "ledger {} is offline",
                network
            )));
        }

        let data_hash = payload_digest(payload)?;

        let mut tip = self.tip.lock().await;
        let block_number = tip.height + 1;
        let mut hasher = Sha256::new();
        hasher.update(tip.hash.as_bytes());
        hasher.update(data_hash.as_bytes());
        hasher.update(subject_id.as_bytes());
        hasher.update(block_number.to_le_bytes());
        let tx_hash = hex::encode(hasher.finalize());

        tip.height = block_number;
        tip.hash = tx_hash.clone();
        drop(tip);

        let receipt = AnchorReceipt {
            data_hash,
            block_number,
            tx_hash,
            network: network.to_string(),
            timestamp: Utc::now(),
        };
        self.blocks.lock().await.push(receipt.clone());

        tracing::debug!(
            "Anchored {} at block {} on {}",
            subject_id,
            block_number,
            network
        );
        Ok(receipt)
    }
}
