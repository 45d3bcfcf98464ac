//! Production and inventory approval workflow.
//!
//! Raw-material reservations and finished-goods claims move through a fixed
//! state machine driven by [`service::ApprovalService`]. The stock ledger is
//! the single source of truth for on-hand quantities and can never go
//! negative: the accept guard and the ledger decrement commit in one storage
//! transaction. Status changes fan out through [`events::EventBroadcaster`]
//! as refresh hints for live dashboards, which read back through the
//! projection layer.

pub mod bulk;
pub mod error;
pub mod events;
pub mod ids;
pub mod ledger;
pub mod product;
pub mod projection;
pub mod request;
pub mod service;
pub mod store;
