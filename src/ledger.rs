//! Stock ledger: the authoritative on-hand quantity per product
//!
//! This is the only write path to a product's on-hand quantity. Every
//! mutation is a conditional apply-delta — either a compare-and-swap loop on
//! the standalone API, or a read-check-write inside the same storage
//! transaction that moves the owning request's status.

use crate::error::WorkflowError;
use sled::transaction::{ConflictableTransactionError, TransactionalTree};
use sled::{Db, Tree};

const TREE_NAME: &str = "stock_ledger";

pub(crate) fn encode_qty(quantity: u64) -> [u8; 8] {
    quantity.to_be_bytes()
}

pub(crate) fn decode_qty(bytes: &[u8], product_id: &str) -> Result<u64, WorkflowError> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| WorkflowError::Corrupt {
        key: product_id.to_string(),
        reason: format!("ledger value is {} bytes, expected 8", bytes.len()),
    })?;
    Ok(u64::from_be_bytes(raw))
}

pub struct StockLedger {
    tree: Tree,
}

impl StockLedger {
    pub fn open(db: &Db) -> Result<Self, WorkflowError> {
        Ok(Self {
            tree: db.open_tree(TREE_NAME)?,
        })
    }

    pub(crate) fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn on_hand(&self, product_id: &str) -> Result<u64, WorkflowError> {
        match self.tree.get(product_id.as_bytes())? {
            Some(bytes) => decode_qty(&bytes, product_id),
            None => Err(WorkflowError::NotFound(product_id.to_string())),
        }
    }

    /// Seed (or reset) a product's ledger entry. Used at registration time,
    /// never by workflow transitions.
    pub fn set_initial(&self, product_id: &str, quantity: u64) -> Result<(), WorkflowError> {
        self.tree
            .insert(product_id.as_bytes(), &encode_qty(quantity)[..])?;
        Ok(())
    }

    /// Atomically apply a signed delta and return the new quantity.
    ///
    /// The read and the write are a single compare-and-swap loop, so two
    /// concurrent callers cannot both draw the same stock below zero: the
    /// loser re-reads and re-checks. A delta that would take the value
    /// negative fails with `StockUnderflow` and leaves the entry unchanged.
    pub fn apply_delta(&self, product_id: &str, delta: i64) -> Result<u64, WorkflowError> {
        loop {
            let current = self
                .tree
                .get(product_id.as_bytes())?
                .ok_or_else(|| WorkflowError::NotFound(product_id.to_string()))?;
            let on_hand = decode_qty(&current, product_id)?;

            let next = checked_apply(product_id, on_hand, delta)?;

            let swap = self.tree.compare_and_swap(
                product_id.as_bytes(),
                Some(&current),
                Some(&encode_qty(next)[..]),
            )?;
            match swap {
                Ok(()) => return Ok(next),
                // lost the race, re-read and re-check
                Err(_) => continue,
            }
        }
    }
}

/// Shared guard arithmetic. `StockUnderflow` here means a caller bypassed the
/// accept guard, which is an invariant violation worth shouting about.
pub(crate) fn checked_apply(
    product_id: &str,
    on_hand: u64,
    delta: i64,
) -> Result<u64, WorkflowError> {
    let next = on_hand as i128 + delta as i128;
    if next < 0 {
        tracing::error!(
            product_id,
            on_hand,
            delta,
            "stock underflow: ledger invariant violated"
        );
        return Err(WorkflowError::StockUnderflow {
            product_id: product_id.to_string(),
            on_hand,
            delta,
        });
    }
    Ok(next as u64)
}

/// Transactional read of a product's on-hand quantity, aborting the enclosing
/// transaction on a missing or corrupt entry.
pub(crate) fn tx_on_hand(
    tree: &TransactionalTree,
    product_id: &str,
) -> Result<u64, ConflictableTransactionError<WorkflowError>> {
    match tree.get(product_id.as_bytes())? {
        Some(bytes) => {
            decode_qty(&bytes, product_id).map_err(ConflictableTransactionError::Abort)
        }
        None => Err(ConflictableTransactionError::Abort(WorkflowError::NotFound(
            product_id.to_string(),
        ))),
    }
}

pub(crate) fn tx_set(
    tree: &TransactionalTree,
    product_id: &str,
    quantity: u64,
) -> Result<(), ConflictableTransactionError<WorkflowError>> {
    tree.insert(product_id.as_bytes(), &encode_qty(quantity)[..])?;
    Ok(())
}
