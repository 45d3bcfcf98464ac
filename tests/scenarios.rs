//! Integration scenarios walking the approval workflow end to end.

use anyhow::Context;
use sled::open;
use std::sync::Arc;
use stock_approval::{
    error::WorkflowError,
    ids,
    product::Product,
    request::{Command, FinishedGoodsStatus, RawMaterialStatus, RequestStatus},
    service::{ApprovalService, TransitionOutcome},
};

use tempfile::tempdir; // Use for test db cleanup.

#[test]
fn raw_material_flow_end_to_end() -> anyhow::Result<()> {
    // Sled uses file-based locking to prevent concurrent access, so only one test
    // can hold the lock at a time. As is good practice in testing create separate
    // databases for each test. The db is created on temp for simplified cleanup.
    let temp_dir = tempdir()?;
    let db = Arc::new(open(temp_dir.path().join("raw_material_flow.db"))?);
    let service = ApprovalService::new(db)?;

    let clerk = ids::new_actor_id()?;
    let bom_id = ids::new_bom_id()?;
    let product = Product::new(ids::new_product_id()?, "Steel rod", "kg");
    let product_id = product.product_id.clone();
    service.register_product(product, 100)?;

    let r1 = service.submit_raw_material_request(&bom_id, &product_id, 60, &clerk)?;
    let r2 = service.submit_raw_material_request(&bom_id, &product_id, 50, &clerk)?;

    // r1 fits: stock commits and the request advances
    let outcome = service
        .accept(&r1.request_id, &clerk)
        .context("accept of r1 failed: ")?;
    assert_eq!(
        outcome,
        TransitionOutcome::Applied {
            status: RequestStatus::Raw(RawMaterialStatus::Accepted),
            version: 1,
        }
    );
    assert_eq!(service.on_hand(&product_id)?, 40);

    // r2 no longer fits: guard rejects, nothing moves
    let outcome = service.accept(&r2.request_id, &clerk)?;
    assert_eq!(
        outcome,
        TransitionOutcome::InsufficientStock {
            required: 50,
            on_hand: 40,
        }
    );
    let r2_now = service.get_request(&r2.request_id)?;
    assert_eq!(r2_now.status, RequestStatus::Raw(RawMaterialStatus::Pending));
    assert_eq!(r2_now.version, 0);
    assert_eq!(service.on_hand(&product_id)?, 40);

    // physical handoff, then production confirms receipt
    let outcome = service.issue_to_production(&r1.request_id, &clerk)?;
    assert_eq!(
        outcome,
        TransitionOutcome::Applied {
            status: RequestStatus::Raw(RawMaterialStatus::IssuedToProduction),
            version: 2,
        }
    );

    let outcome = service.confirm_receipt(&r1.request_id, &clerk)?;
    assert_eq!(
        outcome,
        TransitionOutcome::Applied {
            status: RequestStatus::Raw(RawMaterialStatus::ReceivedByProduction),
            version: 3,
        }
    );
    assert!(service.get_request(&r1.request_id)?.is_terminal());

    // a stale retry of an earlier command is a benign no-op
    let outcome = service.accept(&r1.request_id, &clerk)?;
    assert_eq!(
        outcome,
        TransitionOutcome::NotApplicable {
            status: RequestStatus::Raw(RawMaterialStatus::ReceivedByProduction),
        }
    );
    assert_eq!(service.on_hand(&product_id)?, 40);

    Ok(())
}

#[test]
fn finished_goods_flow_credits_stock() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db = Arc::new(open(temp_dir.path().join("finished_goods_flow.db"))?);
    let service = ApprovalService::new(db)?;

    let staff = ids::new_actor_id()?;
    let bom_id = ids::new_bom_id()?;
    let product = Product::new(ids::new_product_id()?, "Bracket assembly", "pcs");
    let product_id = product.product_id.clone();
    service.register_product(product, 0)?;

    let request = service.submit_finished_goods_request(&bom_id, &product_id, 25, &staff)?;
    assert_eq!(
        request.status,
        RequestStatus::Finished(FinishedGoodsStatus::Requested)
    );

    let outcome = service.allocate(&request.request_id, &staff)?;
    assert_eq!(
        outcome,
        TransitionOutcome::Applied {
            status: RequestStatus::Finished(FinishedGoodsStatus::Allocated),
            version: 1,
        }
    );
    // no stock movement until the goods physically arrive back
    assert_eq!(service.on_hand(&product_id)?, 0);

    service.issue_from_production(&request.request_id, &staff)?;
    let outcome = service.receive_by_inventory(&request.request_id, &staff)?;
    assert_eq!(
        outcome,
        TransitionOutcome::Applied {
            status: RequestStatus::Finished(FinishedGoodsStatus::ReceivedByInventory),
            version: 3,
        }
    );
    assert_eq!(service.on_hand(&product_id)?, 25);
    assert!(service.get_request(&request.request_id)?.is_terminal());

    Ok(())
}

#[test]
fn accept_and_receive_conserve_stock() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db = Arc::new(open(temp_dir.path().join("conservation.db"))?);
    let service = ApprovalService::new(db)?;

    let clerk = ids::new_actor_id()?;
    let bom_id = ids::new_bom_id()?;
    let product = Product::new(ids::new_product_id()?, "Aluminium sheet", "kg");
    let product_id = product.product_id.clone();
    service.register_product(product, 100)?;

    // draw 60 out for production
    let raw = service.submit_raw_material_request(&bom_id, &product_id, 60, &clerk)?;
    service.accept(&raw.request_id, &clerk)?;
    assert_eq!(service.on_hand(&product_id)?, 40);

    // credit 80 of produced output back
    let finished = service.submit_finished_goods_request(&bom_id, &product_id, 80, &clerk)?;
    service.allocate(&finished.request_id, &clerk)?;
    service.issue_from_production(&finished.request_id, &clerk)?;
    service.receive_by_inventory(&finished.request_id, &clerk)?;
    assert_eq!(service.on_hand(&product_id)?, 120);

    // no other transition on either request touched the ledger
    service.issue_to_production(&raw.request_id, &clerk)?;
    service.confirm_receipt(&raw.request_id, &clerk)?;
    assert_eq!(service.on_hand(&product_id)?, 120);

    Ok(())
}

#[test]
fn transitions_publish_status_events() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db = Arc::new(open(temp_dir.path().join("status_events.db"))?);
    let service = ApprovalService::new(db)?;

    let clerk = ids::new_actor_id()?;
    let bom_id = ids::new_bom_id()?;
    let product = Product::new(ids::new_product_id()?, "Copper wire", "m");
    let product_id = product.product_id.clone();
    service.register_product(product, 500)?;

    let request = service.submit_raw_material_request(&bom_id, &product_id, 100, &clerk)?;

    let subscription = service.subscribe();
    service.accept(&request.request_id, &clerk)?;

    let events = subscription.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].request_id, request.request_id);
    assert_eq!(
        events[0].old_status,
        RequestStatus::Raw(RawMaterialStatus::Pending)
    );
    assert_eq!(
        events[0].new_status,
        RequestStatus::Raw(RawMaterialStatus::Accepted)
    );
    assert_eq!(events[0].actor, clerk);

    // a guard failure changes nothing, so nothing is published
    let short = service.submit_raw_material_request(&bom_id, &product_id, 9_999, &clerk)?;
    service.accept(&short.request_id, &clerk)?;
    assert!(subscription.drain().is_empty());

    Ok(())
}

#[test]
fn bulk_accept_reports_partial_failure() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db = Arc::new(open(temp_dir.path().join("bulk_accept.db"))?);
    let service = ApprovalService::new(db)?;

    let clerk = ids::new_actor_id()?;
    let bom_id = ids::new_bom_id()?;
    let product = Product::new(ids::new_product_id()?, "Bearing", "pcs");
    let product_id = product.product_id.clone();
    service.register_product(product, 50)?;

    let r1 = service.submit_raw_material_request(&bom_id, &product_id, 20, &clerk)?;
    let r2 = service.submit_raw_material_request(&bom_id, &product_id, 40, &clerk)?;
    let r3 = service.submit_raw_material_request(&bom_id, &product_id, 10, &clerk)?;
    let ghost = "req_1doesnotexist".to_string();

    let ids = vec![
        r1.request_id.clone(),
        r2.request_id.clone(),
        r3.request_id.clone(),
        ghost.clone(),
    ];
    let report = service.bulk_apply(Command::Accept, &ids, &clerk);

    assert_eq!(report.applied(), 2);
    assert_eq!(report.failed(), 2);
    assert_eq!(report.summary(), "applied 2 of 4");

    assert!(report.outcome(&r1.request_id).unwrap().is_applied());
    assert_eq!(
        report.outcome(&r2.request_id),
        Some(&stock_approval::bulk::BulkItemOutcome::InsufficientStock {
            required: 40,
            on_hand: 30,
        })
    );
    assert!(report.outcome(&r3.request_id).unwrap().is_applied());
    assert_eq!(
        report.outcome(&ghost),
        Some(&stock_approval::bulk::BulkItemOutcome::NotFound)
    );

    // ledger reflects exactly the two applied items
    assert_eq!(service.on_hand(&product_id)?, 20);
    // and r2 is untouched, free to be retried once stock returns
    assert_eq!(
        service.get_request(&r2.request_id)?.status,
        RequestStatus::Raw(RawMaterialStatus::Pending)
    );

    Ok(())
}

#[test]
fn stale_version_is_rejected() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db = Arc::new(open(temp_dir.path().join("version_check.db"))?);
    let service = ApprovalService::new(db)?;

    let clerk = ids::new_actor_id()?;
    let bom_id = ids::new_bom_id()?;
    let product = Product::new(ids::new_product_id()?, "Gasket", "pcs");
    let product_id = product.product_id.clone();
    service.register_product(product, 100)?;

    let request = service.submit_raw_material_request(&bom_id, &product_id, 10, &clerk)?;

    let outcome = service.apply_at_version(Command::Accept, &request.request_id, &clerk, 0)?;
    assert!(matches!(outcome, TransitionOutcome::Applied { version: 1, .. }));

    // a caller still holding version 0 must re-fetch before acting
    let err = service
        .apply_at_version(Command::IssueToProduction, &request.request_id, &clerk, 0)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<WorkflowError>(),
        Some(WorkflowError::VersionConflict {
            expected: 0,
            found: 1,
            ..
        })
    ));

    let outcome =
        service.apply_at_version(Command::IssueToProduction, &request.request_id, &clerk, 1)?;
    assert!(matches!(outcome, TransitionOutcome::Applied { version: 2, .. }));

    Ok(())
}
