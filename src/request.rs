//! Approval request records and the per-kind transition tables
//!
//! A request's status is a closed enum per kind; the only way a status moves
//! is through [`ApprovalRequest::target_status`] + [`ApprovalRequest::advance`],
//! which the service layer drives inside a storage transaction.

use crate::product::TimeStamp;
use chrono::Utc;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    #[n(0)]
    RawMaterial,
    #[n(1)]
    FinishedGoods,
}

/// Raw-material side: reservation of stock ahead of a production run.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RawMaterialStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Accepted,
    #[n(2)]
    IssuedToProduction,
    #[n(3)]
    ReceivedByProduction,
}

/// Finished-goods side: crediting produced output back into inventory.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FinishedGoodsStatus {
    #[n(0)]
    Requested,
    #[n(1)]
    Allocated,
    #[n(2)]
    IssuedFromProduction,
    #[n(3)]
    ReceivedByInventory,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    #[n(0)]
    Raw(#[n(0)] RawMaterialStatus),
    #[n(1)]
    Finished(#[n(0)] FinishedGoodsStatus),
}

impl RequestStatus {
    pub fn kind(&self) -> RequestKind {
        match self {
            RequestStatus::Raw(_) => RequestKind::RawMaterial,
            RequestStatus::Finished(_) => RequestKind::FinishedGoods,
        }
    }

    /// Position in the happy path, 0-based. Never decreases on a stored
    /// request: there are no reversal transitions.
    pub fn rank(&self) -> u8 {
        match self {
            RequestStatus::Raw(s) => *s as u8,
            RequestStatus::Finished(s) => *s as u8,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Raw(RawMaterialStatus::ReceivedByProduction)
                | RequestStatus::Finished(FinishedGoodsStatus::ReceivedByInventory)
        )
    }
}

/// The commands a caller can issue against a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Accept,
    IssueToProduction,
    ConfirmReceipt,
    Allocate,
    IssueFromProduction,
    ReceiveByInventory,
}

/// Idempotency markers, one per action whose effect must land at most once.
/// Set the first time the action applies; a retried command that finds its
/// marker already set is a no-op regardless of any client behaviour.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedMarkers {
    #[n(0)]
    pub accepted: bool,
    #[n(1)]
    pub issued: bool,
    #[n(2)]
    pub received: bool,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRequest {
    #[n(0)]
    pub request_id: String,
    #[n(1)]
    pub kind: RequestKind,
    #[n(2)]
    pub bom_id: String,
    #[n(3)]
    pub product_id: String,
    #[n(4)]
    pub quantity: u64,
    #[n(5)]
    pub status: RequestStatus,
    #[n(6)]
    pub version: u64,
    #[n(7)]
    pub markers: AppliedMarkers,
    #[n(8)]
    pub created_at: TimeStamp<Utc>,
    #[n(9)]
    pub status_changed_at: TimeStamp<Utc>,
    #[n(10)]
    pub last_actor: String,
}

impl ApprovalRequest {
    pub fn new_raw_material(
        request_id: String,
        bom_id: &str,
        product_id: &str,
        quantity: u64,
        actor: &str,
    ) -> Self {
        Self::new(
            request_id,
            RequestKind::RawMaterial,
            RequestStatus::Raw(RawMaterialStatus::Pending),
            bom_id,
            product_id,
            quantity,
            actor,
        )
    }

    pub fn new_finished_goods(
        request_id: String,
        bom_id: &str,
        product_id: &str,
        quantity: u64,
        actor: &str,
    ) -> Self {
        Self::new(
            request_id,
            RequestKind::FinishedGoods,
            RequestStatus::Finished(FinishedGoodsStatus::Requested),
            bom_id,
            product_id,
            quantity,
            actor,
        )
    }

    fn new(
        request_id: String,
        kind: RequestKind,
        status: RequestStatus,
        bom_id: &str,
        product_id: &str,
        quantity: u64,
        actor: &str,
    ) -> Self {
        let now = TimeStamp::new();
        Self {
            request_id,
            kind,
            bom_id: bom_id.to_string(),
            product_id: product_id.to_string(),
            quantity,
            status,
            version: 0,
            markers: AppliedMarkers::default(),
            created_at: now.clone(),
            status_changed_at: now,
            last_actor: actor.to_string(),
        }
    }

    /// The transition table: the status this command moves the request to,
    /// or `None` when the command does not apply from the current state or
    /// its idempotency marker is already set.
    pub fn target_status(&self, command: Command) -> Option<RequestStatus> {
        use Command::*;
        use FinishedGoodsStatus as F;
        use RawMaterialStatus as R;
        use RequestStatus::{Finished, Raw};

        match (self.status, command) {
            (Raw(R::Pending), Accept) if !self.markers.accepted => Some(Raw(R::Accepted)),
            (Raw(R::Accepted), IssueToProduction) if !self.markers.issued => {
                Some(Raw(R::IssuedToProduction))
            }
            (Raw(R::IssuedToProduction), ConfirmReceipt) => Some(Raw(R::ReceivedByProduction)),
            (Finished(F::Requested), Allocate) => Some(Finished(F::Allocated)),
            (Finished(F::Allocated), IssueFromProduction) => {
                Some(Finished(F::IssuedFromProduction))
            }
            (Finished(F::IssuedFromProduction), ReceiveByInventory) if !self.markers.received => {
                Some(Finished(F::ReceivedByInventory))
            }
            _ => None,
        }
    }

    /// Signed on-hand delta the command carries when it applies. Accept draws
    /// stock down, receiving finished goods credits it back; every other
    /// transition is a pure status move.
    pub fn ledger_delta(&self, command: Command) -> i64 {
        match command {
            Command::Accept => -(self.quantity as i64),
            Command::ReceiveByInventory => self.quantity as i64,
            _ => 0,
        }
    }

    /// Record an applied transition: marker, status, version bump, audit trail.
    /// Callers must only pass a `to` obtained from [`Self::target_status`].
    pub fn advance(&mut self, command: Command, to: RequestStatus, actor: &str) {
        match command {
            Command::Accept => self.markers.accepted = true,
            Command::IssueToProduction => self.markers.issued = true,
            Command::ReceiveByInventory => self.markers.received = true,
            _ => {}
        }
        self.status = to;
        self.version += 1;
        self.status_changed_at = TimeStamp::new();
        self.last_actor = actor.to_string();
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
