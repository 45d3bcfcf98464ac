//! Durable approval request records
//!
//! Requests are CBOR-encoded under their minted id. Terminal requests are
//! retained for audit; nothing here ever deletes.

use crate::error::WorkflowError;
use crate::request::ApprovalRequest;
use sled::transaction::{ConflictableTransactionError, TransactionalTree};
use sled::{Db, Tree};

const TREE_NAME: &str = "approval_requests";

fn decode_request(key: &str, bytes: &[u8]) -> Result<ApprovalRequest, WorkflowError> {
    minicbor::decode(bytes).map_err(|e| WorkflowError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn encode_request(request: &ApprovalRequest) -> Result<Vec<u8>, WorkflowError> {
    minicbor::to_vec(request).map_err(|e| WorkflowError::Corrupt {
        key: request.request_id.clone(),
        reason: e.to_string(),
    })
}

pub struct RequestStore {
    pub(crate) tree: Tree,
}

impl RequestStore {
    pub fn open(db: &Db) -> Result<Self, WorkflowError> {
        Ok(Self {
            tree: db.open_tree(TREE_NAME)?,
        })
    }

    pub fn get(&self, request_id: &str) -> Result<Option<ApprovalRequest>, WorkflowError> {
        match self.tree.get(request_id.as_bytes())? {
            Some(bytes) => Ok(Some(decode_request(request_id, &bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put(&self, request: &ApprovalRequest) -> Result<(), WorkflowError> {
        let cbor = encode_request(request)?;
        self.tree.insert(request.request_id.as_bytes(), cbor)?;
        Ok(())
    }

    /// Full scan in key order. The projection layer filters and pages on top.
    pub fn iter(&self) -> impl Iterator<Item = Result<ApprovalRequest, WorkflowError>> + '_ {
        self.tree.iter().map(|entry| {
            let (key, bytes) = entry?;
            decode_request(&String::from_utf8_lossy(&key), &bytes)
        })
    }
}

/// Transactional load, aborting the enclosing transaction when the request
/// does not exist or fails to decode.
pub(crate) fn tx_get(
    tree: &TransactionalTree,
    request_id: &str,
) -> Result<ApprovalRequest, ConflictableTransactionError<WorkflowError>> {
    match tree.get(request_id.as_bytes())? {
        Some(bytes) => {
            decode_request(request_id, &bytes).map_err(ConflictableTransactionError::Abort)
        }
        None => Err(ConflictableTransactionError::Abort(WorkflowError::NotFound(
            request_id.to_string(),
        ))),
    }
}

pub(crate) fn tx_put(
    tree: &TransactionalTree,
    request: &ApprovalRequest,
) -> Result<(), ConflictableTransactionError<WorkflowError>> {
    let cbor = encode_request(request).map_err(ConflictableTransactionError::Abort)?;
    tree.insert(request.request_id.as_bytes(), cbor)?;
    Ok(())
}
