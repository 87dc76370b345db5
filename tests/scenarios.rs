use anyhow::Context;
use std::sync::Arc;
use tempfile::{TempDir, tempdir};

use expense_approval::{
    conditions::{ConditionField, ConditionOp},
    error::ErrorKind,
    expense::ExpenseStatus,
    rule::RuleKind,
    service::{ExpenseService, NewConditionRule, NewExpense, NewRule},
    user::{Role, User},
};

// Sled uses file-based locking to prevent concurrent access, so only one test
// can hold the lock at a time. As is good practice in testing create separate
// databases for each test. The db is created on temp for simplified cleanup.
fn open_service(db_name: &str) -> anyhow::Result<(TempDir, ExpenseService)> {
    let temp_dir = tempdir()?;
    let db = sled::open(temp_dir.path().join(db_name))?;
    let service = ExpenseService::new(Arc::new(db))?;
    Ok((temp_dir, service))
}

fn seed_user(
    service: &ExpenseService,
    username: &str,
    role: Role,
    manager: Option<&str>,
) -> anyhow::Result<()> {
    service
        .create_user(
            &Role::admin(),
            User::new(username, role, manager.map(String::from)),
        )
        .with_context(|| format!("failed to seed user {username}"))?;
    Ok(())
}

fn travel_expense(amount: u64, rule_id: Option<String>) -> NewExpense {
    NewExpense {
        amount,
        currency: "USD".into(),
        category: "travel".into(),
        description: "client visit".into(),
        rule_id,
    }
}

#[test]
fn manager_chain_drains_to_approval() -> anyhow::Result<()> {
    let (_tmp, service) = open_service("chain_drain.db")?;

    seed_user(&service, "carol", Role::manager(), None)?;
    seed_user(&service, "bob", Role::manager(), Some("carol"))?;
    seed_user(&service, "alice", Role::employee(), Some("bob"))?;

    let expense = service
        .submit_expense("alice", travel_expense(500, None))
        .context("submission failed")?;
    assert_eq!(expense.approvers().as_slice(), ["bob", "carol"]);
    assert_eq!(expense.status(), ExpenseStatus::Pending);

    let outcome = service
        .approve_expense(&expense.id, "bob", &Role::manager(), None)
        .context("bob's approval failed")?;
    assert_eq!(outcome.status, ExpenseStatus::Pending);
    assert_eq!(outcome.remaining_approvers, ["carol"]);

    // the chain is exhausted with carol's vote; no rule needs to fire
    let outcome = service
        .approve_expense(&expense.id, "carol", &Role::manager(), None)
        .context("carol's approval failed")?;
    assert_eq!(outcome.status, ExpenseStatus::Approved);
    assert!(outcome.remaining_approvers.is_empty());

    let stored = service.expense(&expense.id)?;
    assert_eq!(stored.status(), ExpenseStatus::Approved);
    assert_eq!(stored.votes().len(), 2);
    assert_eq!(stored.comments(), ["bob: Approved", "carol: Approved"]);

    Ok(())
}

#[test]
fn percentage_rule_approves_at_threshold() -> anyhow::Result<()> {
    let (_tmp, service) = open_service("percentage_threshold.db")?;

    seed_user(&service, "alice", Role::employee(), None)?;
    let rule = service.create_rule(
        &Role::admin(),
        NewRule {
            name: "three quarters of finance".into(),
            kind: RuleKind::Percentage,
            threshold: Some(75),
            approver_pool: vec!["x".into(), "y".into(), "z".into(), "w".into()],
            specific_approver: None,
            active: true,
        },
    )?;

    let expense = service.submit_expense("alice", travel_expense(500, Some(rule.id.clone())))?;
    assert_eq!(expense.approvers().as_slice(), ["x", "y", "z", "w"]);

    let outcome = service.approve_expense(&expense.id, "x", &Role::employee(), None)?;
    assert_eq!(outcome.status, ExpenseStatus::Pending, "1 of 4 is 25%");

    let outcome = service.approve_expense(&expense.id, "y", &Role::employee(), None)?;
    assert_eq!(outcome.status, ExpenseStatus::Pending, "2 of 4 is 50%");

    let outcome = service.approve_expense(&expense.id, "z", &Role::employee(), None)?;
    assert_eq!(outcome.status, ExpenseStatus::Approved, "3 of 4 is 75%");
    assert_eq!(outcome.remaining_approvers, ["w"]);

    Ok(())
}

#[test]
fn specific_rule_approves_immediately() -> anyhow::Result<()> {
    let (_tmp, service) = open_service("specific_rule.db")?;

    seed_user(&service, "bob", Role::manager(), None)?;
    seed_user(&service, "alice", Role::employee(), Some("bob"))?;
    let rule = service.create_rule(
        &Role::admin(),
        NewRule {
            name: "cfo can settle anything".into(),
            kind: RuleKind::Specific,
            threshold: None,
            approver_pool: Vec::new(),
            specific_approver: Some("cfo".into()),
            active: true,
        },
    )?;

    let expense = service.submit_expense("alice", travel_expense(500, Some(rule.id)))?;
    assert_eq!(expense.approvers().as_slice(), ["bob", "cfo"]);

    // the designated approver settles it even though bob never voted
    let outcome = service.approve_expense(&expense.id, "cfo", &Role::new("cfo"), None)?;
    assert_eq!(outcome.status, ExpenseStatus::Approved);
    assert_eq!(outcome.remaining_approvers, ["bob"]);

    Ok(())
}

#[test]
fn condition_rule_injects_extra_approver() -> anyhow::Result<()> {
    let (_tmp, service) = open_service("condition_inject.db")?;

    seed_user(&service, "bob", Role::manager(), None)?;
    seed_user(&service, "alice", Role::employee(), Some("bob"))?;
    service.create_condition_rule(
        &Role::admin(),
        NewConditionRule {
            field: ConditionField::Amount,
            operator: ConditionOp::GreaterThan,
            value: "400".into(),
            approver: "auditor".into(),
        },
    )?;
    service.create_condition_rule(
        &Role::admin(),
        NewConditionRule {
            field: ConditionField::Category,
            operator: ConditionOp::Equals,
            value: "Meals".into(),
            approver: "canteen".into(),
        },
    )?;

    let expense = service.submit_expense("alice", travel_expense(500, None))?;
    assert_eq!(expense.approvers().as_slice(), ["bob", "auditor"]);

    let outcome = service.approve_expense(&expense.id, "bob", &Role::manager(), None)?;
    assert_eq!(outcome.status, ExpenseStatus::Pending);

    let outcome = service.approve_expense(&expense.id, "auditor", &Role::employee(), None)?;
    assert_eq!(outcome.status, ExpenseStatus::Approved);

    Ok(())
}

#[test]
fn rejection_is_terminal() -> anyhow::Result<()> {
    let (_tmp, service) = open_service("rejection_terminal.db")?;

    seed_user(&service, "carol", Role::manager(), None)?;
    seed_user(&service, "bob", Role::manager(), Some("carol"))?;
    seed_user(&service, "alice", Role::employee(), Some("bob"))?;

    let expense = service.submit_expense("alice", travel_expense(500, None))?;

    let outcome = service
        .reject_expense(&expense.id, "bob", &Role::manager(), Some("no receipt attached"))
        .context("rejection failed")?;
    assert_eq!(outcome.status, ExpenseStatus::Rejected);
    assert!(outcome.remaining_approvers.is_empty());

    let stored = service.expense(&expense.id)?;
    assert!(stored.approvers().is_empty());
    assert_eq!(stored.comments(), ["bob: no receipt attached"]);

    // any further decision must fail with a conflict and change nothing
    let err = service
        .approve_expense(&expense.id, "carol", &Role::manager(), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = service
        .reject_expense(&expense.id, "root", &Role::admin(), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let after = service.expense(&expense.id)?;
    assert_eq!(after.votes().len(), stored.votes().len());
    assert_eq!(after.comments(), stored.comments());

    Ok(())
}

#[test]
fn submission_is_validated() -> anyhow::Result<()> {
    let (_tmp, service) = open_service("submission_validation.db")?;

    seed_user(&service, "alice", Role::employee(), None)?;
    seed_user(&service, "bob", Role::manager(), None)?;

    let err = service
        .submit_expense("alice", travel_expense(0, None))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut no_currency = travel_expense(500, None);
    no_currency.currency.clear();
    let err = service.submit_expense("alice", no_currency).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // managers do not submit expenses
    let err = service
        .submit_expense("bob", travel_expense(500, None))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = service
        .submit_expense("ghost", travel_expense(500, None))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // a rule id that references nothing is a lookup failure, not a skip
    let err = service
        .submit_expense("alice", travel_expense(500, Some("rule_missing".into())))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    Ok(())
}

#[test]
fn unauthorized_decisions_leave_no_trace() -> anyhow::Result<()> {
    let (_tmp, service) = open_service("unauthorized.db")?;

    seed_user(&service, "bob", Role::manager(), None)?;
    seed_user(&service, "alice", Role::employee(), Some("bob"))?;
    seed_user(&service, "mallory", Role::employee(), None)?;

    let expense = service.submit_expense("alice", travel_expense(500, None))?;

    let err = service
        .approve_expense(&expense.id, "mallory", &Role::employee(), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let stored = service.expense(&expense.id)?;
    assert!(stored.votes().is_empty());
    assert!(stored.comments().is_empty());
    assert_eq!(stored.approvers().as_slice(), ["bob"]);

    Ok(())
}

#[test]
fn listing_is_role_filtered() -> anyhow::Result<()> {
    let (_tmp, service) = open_service("listing_filter.db")?;

    seed_user(&service, "bob", Role::manager(), None)?;
    seed_user(&service, "alice", Role::employee(), Some("bob"))?;
    seed_user(&service, "dave", Role::employee(), Some("bob"))?;

    service.submit_expense("alice", travel_expense(100, None))?;
    service.submit_expense("alice", travel_expense(200, None))?;
    service.submit_expense("dave", travel_expense(300, None))?;

    assert_eq!(service.list_expenses(&Role::admin(), "root")?.len(), 3);
    assert_eq!(service.list_expenses(&Role::manager(), "bob")?.len(), 3);

    let own = service.list_expenses(&Role::employee(), "alice")?;
    assert_eq!(own.len(), 2);
    assert!(own.iter().all(|e| e.employee == "alice"));

    Ok(())
}

#[test]
fn rule_management_is_admin_gated() -> anyhow::Result<()> {
    let (_tmp, service) = open_service("rule_admin.db")?;

    let pool_rule = NewRule {
        name: "finance vote".into(),
        kind: RuleKind::Percentage,
        threshold: Some(50),
        approver_pool: vec!["x".into(), "y".into()],
        specific_approver: None,
        active: true,
    };

    let err = service
        .create_rule(&Role::manager(), pool_rule.clone())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let rule = service.create_rule(&Role::admin(), pool_rule.clone())?;
    assert_eq!(service.list_rules(&Role::admin())?.len(), 1);

    // deactivate through update
    let mut updated = pool_rule.clone();
    updated.active = false;
    let rule = service.update_rule(&Role::admin(), &rule.id, updated)?;
    assert!(!rule.active);

    service.delete_rule(&Role::admin(), &rule.id)?;
    let err = service.rule(&Role::admin(), &rule.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // a percentage rule with an empty pool never gets stored
    let mut empty_pool = pool_rule;
    empty_pool.approver_pool.clear();
    let err = service.create_rule(&Role::admin(), empty_pool).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    Ok(())
}

#[test]
fn inactive_rule_is_ignored_at_submission() -> anyhow::Result<()> {
    let (_tmp, service) = open_service("inactive_rule.db")?;

    seed_user(&service, "bob", Role::manager(), None)?;
    seed_user(&service, "alice", Role::employee(), Some("bob"))?;
    let rule = service.create_rule(
        &Role::admin(),
        NewRule {
            name: "dormant pool".into(),
            kind: RuleKind::Percentage,
            threshold: Some(50),
            approver_pool: vec!["x".into(), "y".into()],
            specific_approver: None,
            active: false,
        },
    )?;

    let expense = service.submit_expense("alice", travel_expense(500, Some(rule.id)))?;
    assert_eq!(expense.approvers().as_slice(), ["bob"]);

    Ok(())
}
