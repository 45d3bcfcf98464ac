#[derive(thiserror::Error, Debug)]
pub enum WorkflowError {
    #[error("unknown request or product id: {0}")]
    NotFound(String),
    #[error("version conflict on {request_id}: expected {expected}, found {found}")]
    VersionConflict {
        request_id: String,
        expected: u64,
        found: u64,
    },
    #[error("stock underflow on {product_id}: on-hand {on_hand}, delta {delta}")]
    StockUnderflow {
        product_id: String,
        on_hand: u64,
        delta: i64,
    },
    #[error("corrupt record under key {key}: {reason}")]
    Corrupt { key: String, reason: String },
    #[error(transparent)]
    Storage(#[from] sled::Error),
}
