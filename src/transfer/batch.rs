use std::mem;

use futures::StreamExt;
use tracing::debug;

use crate::error::{Result, VaaError};
use crate::traits::{Signer, TxStream, UnsignedTransaction};

use super::TransactionId;

/// Groups unsigned transactions into signer batches.
///
/// Stackable transactions (token approvals and the like) are held back; the
/// next non-stackable one closes the batch and everything pending is sent in
/// one [`Signer::sign_and_send`] call. [`finish`](Self::finish) sends whatever
/// is still pending.
pub struct TxBatcher<'s> {
    signer: &'s dyn Signer,
    pending: Vec<UnsignedTransaction>,
    txids: Vec<TransactionId>,
}

impl<'s> TxBatcher<'s> {
    pub fn new(signer: &'s dyn Signer) -> Self {
        Self {
            signer,
            pending: Vec::new(),
            txids: Vec::new(),
        }
    }

    pub async fn push(&mut self, tx: UnsignedTransaction) -> Result<()> {
        if tx.chain != self.signer.chain() {
            return Err(VaaError::InvalidTransfer(format!(
                "transaction {:?} targets {}, signer is on {}",
                tx.description,
                tx.chain,
                self.signer.chain()
            )));
        }
        let stackable = tx.stackable;
        self.pending.push(tx);
        if !stackable {
            self.flush().await?;
        }
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = mem::take(&mut self.pending);
        debug!(
            chain = %self.signer.chain(),
            transactions = batch.len(),
            event = "transaction_batch_sent"
        );
        let txids = self.signer.sign_and_send(batch).await?;
        self.txids.extend(txids);
        Ok(())
    }

    /// Transactions waiting for a non-stackable one.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub async fn finish(mut self) -> Result<Vec<TransactionId>> {
        self.flush().await?;
        Ok(self.txids)
    }
}

/// Drains `stream` through a [`TxBatcher`] and returns the ids of everything sent.
pub async fn sign_send_wait(mut stream: TxStream<'_>, signer: &dyn Signer) -> Result<Vec<TransactionId>> {
    let mut batcher = TxBatcher::new(signer);
    while let Some(tx) = stream.next().await {
        batcher.push(tx?).await?;
    }
    batcher.finish().await
}
