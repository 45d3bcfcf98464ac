//! Read-side views over the request store
//!
//! Eventually consistent with the store by construction (a full scan of
//! committed records); dashboards re-query on every broadcast event, so no
//! stronger guarantee is needed.

use crate::product::TimeStamp;
use crate::request::{ApprovalRequest, RequestKind, RequestStatus};
use crate::service::ApprovalService;
use chrono::Utc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    pub fn first(limit: usize) -> Self {
        Self { offset: 0, limit }
    }

    pub fn all() -> Self {
        Self {
            offset: 0,
            limit: usize::MAX,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::all()
    }
}

/// Optional narrowing of a listing; no filter means the whole queue.
#[derive(Debug, Default, Clone)]
pub struct ListFilter {
    pub product_id: Option<String>,
    pub bom_id: Option<String>,
}

impl ListFilter {
    fn matches(&self, request: &ApprovalRequest) -> bool {
        if let Some(product_id) = &self.product_id {
            if &request.product_id != product_id {
                return false;
            }
        }
        if let Some(bom_id) = &self.bom_id {
            if &request.bom_id != bom_id {
                return false;
            }
        }
        true
    }
}

/// What a queue dashboard renders per row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSummary {
    pub request_id: String,
    pub bom_id: String,
    pub product_id: String,
    pub quantity: u64,
    pub status: RequestStatus,
    pub version: u64,
    pub status_changed_at: TimeStamp<Utc>,
}

impl From<&ApprovalRequest> for RequestSummary {
    fn from(request: &ApprovalRequest) -> Self {
        Self {
            request_id: request.request_id.clone(),
            bom_id: request.bom_id.clone(),
            product_id: request.product_id.clone(),
            quantity: request.quantity,
            status: request.status,
            version: request.version,
            status_changed_at: request.status_changed_at.clone(),
        }
    }
}

impl ApprovalService {
    /// All requests of one kind currently in `status`, ordered by creation
    /// time then id, paged.
    pub fn list_by_status(
        &self,
        kind: RequestKind,
        status: RequestStatus,
        page: Page,
    ) -> anyhow::Result<Vec<RequestSummary>> {
        self.list_filtered(kind, status, &ListFilter::default(), page)
    }

    pub fn list_filtered(
        &self,
        kind: RequestKind,
        status: RequestStatus,
        filter: &ListFilter,
        page: Page,
    ) -> anyhow::Result<Vec<RequestSummary>> {
        let mut matches: Vec<ApprovalRequest> = Vec::new();
        for record in self.requests.iter() {
            let request = record?;
            if request.kind == kind && request.status == status && filter.matches(&request) {
                matches.push(request);
            }
        }
        matches.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.request_id.cmp(&b.request_id))
        });

        Ok(matches
            .iter()
            .skip(page.offset)
            .take(page.limit)
            .map(RequestSummary::from)
            .collect())
    }
}
