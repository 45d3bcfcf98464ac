//! Service layer API for the approval workflow
//!
//! Every transition runs as one sled transaction over the request store and
//! the stock ledger: the version read, the guard decision, and both writes
//! commit together or not at all. Concurrent commands touching the same
//! request or product serialize on those keys; everything else runs in
//! parallel. Events are published after commit, never from inside the
//! transaction closure.

use crate::error::WorkflowError;
use crate::events::{DEFAULT_EVENT_BUFFER, EventBroadcaster, StatusEvent, Subscription};
use crate::ids;
use crate::ledger::{self, StockLedger};
use crate::product::{Product, ProductCatalog, TimeStamp};
use crate::request::{ApprovalRequest, Command, RequestStatus};
use crate::store::{self, RequestStore};
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use std::sync::Arc;

/// Outcome of a single transition command. Guard failures and no-ops are
/// routine results of a multi-actor queue, not faults — only storage trouble
/// and unknown ids surface as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied { status: RequestStatus, version: u64 },
    NotApplicable { status: RequestStatus },
    InsufficientStock { required: u64, on_hand: u64 },
}

enum TxApplied {
    Advanced {
        old_status: RequestStatus,
        request: ApprovalRequest,
    },
    NoOp {
        status: RequestStatus,
    },
    Insufficient {
        required: u64,
        on_hand: u64,
    },
}

pub struct ApprovalService {
    db: Arc<sled::Db>,
    pub(crate) requests: RequestStore,
    pub(crate) ledger: StockLedger,
    pub(crate) catalog: ProductCatalog,
    broadcaster: EventBroadcaster,
}

impl ApprovalService {
    pub fn new(db: Arc<sled::Db>) -> anyhow::Result<Self> {
        let requests = RequestStore::open(&db)?;
        let ledger = StockLedger::open(&db)?;
        let catalog = ProductCatalog::open(&db)?;
        Ok(Self {
            db,
            requests,
            ledger,
            catalog,
            broadcaster: EventBroadcaster::new(DEFAULT_EVENT_BUFFER),
        })
    }

    /// Register a product's reference record and seed its ledger entry.
    pub fn register_product(&self, product: Product, initial_on_hand: u64) -> anyhow::Result<()> {
        self.catalog.put(&product)?;
        self.ledger.set_initial(&product.product_id, initial_on_hand)?;
        Ok(())
    }

    /// Reserve raw material against a BOM. The request starts `Pending`; no
    /// stock moves until an inventory clerk accepts it.
    pub fn submit_raw_material_request(
        &self,
        bom_id: &str,
        product_id: &str,
        quantity: u64,
        actor: &str,
    ) -> anyhow::Result<ApprovalRequest> {
        self.require_product(product_id)?;
        let request = ApprovalRequest::new_raw_material(
            ids::new_request_id()?,
            bom_id,
            product_id,
            quantity,
            actor,
        );
        self.requests.put(&request)?;
        tracing::debug!(request_id = %request.request_id, "raw material request submitted");
        Ok(request)
    }

    /// Claim produced output against a BOM. The request starts `Requested`;
    /// stock is credited only on the final `ReceiveByInventory`.
    pub fn submit_finished_goods_request(
        &self,
        bom_id: &str,
        product_id: &str,
        quantity: u64,
        actor: &str,
    ) -> anyhow::Result<ApprovalRequest> {
        self.require_product(product_id)?;
        let request = ApprovalRequest::new_finished_goods(
            ids::new_request_id()?,
            bom_id,
            product_id,
            quantity,
            actor,
        );
        self.requests.put(&request)?;
        tracing::debug!(request_id = %request.request_id, "finished goods request submitted");
        Ok(request)
    }

    fn require_product(&self, product_id: &str) -> anyhow::Result<()> {
        if self.catalog.get(product_id)?.is_none() {
            return Err(WorkflowError::NotFound(product_id.to_string()).into());
        }
        Ok(())
    }

    // raw-material side

    pub fn accept(&self, request_id: &str, actor: &str) -> anyhow::Result<TransitionOutcome> {
        self.apply(Command::Accept, request_id, actor)
    }

    pub fn issue_to_production(
        &self,
        request_id: &str,
        actor: &str,
    ) -> anyhow::Result<TransitionOutcome> {
        self.apply(Command::IssueToProduction, request_id, actor)
    }

    pub fn confirm_receipt(
        &self,
        request_id: &str,
        actor: &str,
    ) -> anyhow::Result<TransitionOutcome> {
        self.apply(Command::ConfirmReceipt, request_id, actor)
    }

    // finished-goods side

    pub fn allocate(&self, request_id: &str, actor: &str) -> anyhow::Result<TransitionOutcome> {
        self.apply(Command::Allocate, request_id, actor)
    }

    pub fn issue_from_production(
        &self,
        request_id: &str,
        actor: &str,
    ) -> anyhow::Result<TransitionOutcome> {
        self.apply(Command::IssueFromProduction, request_id, actor)
    }

    pub fn receive_by_inventory(
        &self,
        request_id: &str,
        actor: &str,
    ) -> anyhow::Result<TransitionOutcome> {
        self.apply(Command::ReceiveByInventory, request_id, actor)
    }

    /// Apply a command to one request. Safe to retry: a command whose effect
    /// already landed comes back `NotApplicable`.
    pub fn apply(
        &self,
        command: Command,
        request_id: &str,
        actor: &str,
    ) -> anyhow::Result<TransitionOutcome> {
        self.apply_checked(command, request_id, actor, None)
    }

    /// Like [`Self::apply`], but rejects with `VersionConflict` when the
    /// stored request has moved past the version the caller read.
    pub fn apply_at_version(
        &self,
        command: Command,
        request_id: &str,
        actor: &str,
        expected_version: u64,
    ) -> anyhow::Result<TransitionOutcome> {
        self.apply_checked(command, request_id, actor, Some(expected_version))
    }

    fn apply_checked(
        &self,
        command: Command,
        request_id: &str,
        actor: &str,
        expected_version: Option<u64>,
    ) -> anyhow::Result<TransitionOutcome> {
        let result = (&self.requests.tree, self.ledger.tree()).transaction(|(requests, stock)| {
            let mut request = store::tx_get(requests, request_id)?;

            if let Some(expected) = expected_version {
                if request.version != expected {
                    return Err(ConflictableTransactionError::Abort(
                        WorkflowError::VersionConflict {
                            request_id: request.request_id.clone(),
                            expected,
                            found: request.version,
                        },
                    ));
                }
            }

            let Some(to) = request.target_status(command) else {
                return Ok(TxApplied::NoOp {
                    status: request.status,
                });
            };

            let delta = request.ledger_delta(command);
            if delta != 0 {
                let on_hand = ledger::tx_on_hand(stock, &request.product_id)?;
                if delta < 0 && delta.unsigned_abs() > on_hand {
                    // guard failure: request stays put, ledger untouched
                    return Ok(TxApplied::Insufficient {
                        required: request.quantity,
                        on_hand,
                    });
                }
                let next = ledger::checked_apply(&request.product_id, on_hand, delta)
                    .map_err(ConflictableTransactionError::Abort)?;
                ledger::tx_set(stock, &request.product_id, next)?;
            }

            let old_status = request.status;
            request.advance(command, to, actor);
            store::tx_put(requests, &request)?;

            Ok(TxApplied::Advanced {
                old_status,
                request,
            })
        });

        match result {
            Ok(TxApplied::Advanced {
                old_status,
                request,
            }) => {
                tracing::debug!(
                    request_id = %request.request_id,
                    ?command,
                    ?old_status,
                    new_status = ?request.status,
                    version = request.version,
                    "transition applied"
                );
                self.broadcaster.publish(&StatusEvent {
                    request_id: request.request_id.clone(),
                    kind: request.kind,
                    old_status,
                    new_status: request.status,
                    actor: actor.to_string(),
                    at: TimeStamp::new(),
                });
                Ok(TransitionOutcome::Applied {
                    status: request.status,
                    version: request.version,
                })
            }
            Ok(TxApplied::NoOp { status }) => Ok(TransitionOutcome::NotApplicable { status }),
            Ok(TxApplied::Insufficient { required, on_hand }) => {
                Ok(TransitionOutcome::InsufficientStock { required, on_hand })
            }
            Err(TransactionError::Abort(e)) => Err(e.into()),
            Err(TransactionError::Storage(e)) => Err(WorkflowError::Storage(e).into()),
        }
    }

    // read accessors, used by dashboards re-fetching after a broadcast event

    pub fn get_request(&self, request_id: &str) -> anyhow::Result<ApprovalRequest> {
        self.requests
            .get(request_id)?
            .ok_or_else(|| WorkflowError::NotFound(request_id.to_string()).into())
    }

    pub fn on_hand(&self, product_id: &str) -> anyhow::Result<u64> {
        Ok(self.ledger.on_hand(product_id)?)
    }

    pub fn product(&self, product_id: &str) -> anyhow::Result<Option<Product>> {
        Ok(self.catalog.get(product_id)?)
    }

    /// Register a live listener for status-change events.
    pub fn subscribe(&self) -> Subscription {
        self.broadcaster.subscribe()
    }

    pub fn flush(&self) -> anyhow::Result<()> {
        self.db.flush()?;
        Ok(())
    }
}
