//! Service layer API for expense workflow operations.
//!
//! Transport-agnostic: the surrounding HTTP layer (out of scope here) maps
//! these calls and [`ErrorKind`](crate::error::ErrorKind) onto its wire
//! format. Administrative rule and user management lives here too, gated on
//! the admin role.

use std::sync::Arc;

use crate::builder::ApproverSetBuilder;
use crate::conditions::{ConditionField, ConditionOp, ConditionRule};
use crate::engine::{ApprovalDecisionEngine, DecisionOutcome};
use crate::error::{ApprovalError, Result};
use crate::expense::{Expense, TimeStamp};
use crate::rule::{Rule, RuleKind};
use crate::store::ExpenseStore;
use crate::user::{Role, User};
use crate::utils;

/// Submission payload. `category` and `description` may be empty; `rule_id`
/// optionally ties an approval rule to the expense.
#[derive(Debug, Clone, Default)]
pub struct NewExpense {
    pub amount: u64, // minor currency units
    pub currency: String,
    pub category: String,
    pub description: String,
    pub rule_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewRule {
    pub name: String,
    pub kind: RuleKind,
    pub threshold: Option<u32>,
    pub approver_pool: Vec<String>,
    pub specific_approver: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct NewConditionRule {
    pub field: ConditionField,
    pub operator: ConditionOp,
    pub value: String,
    pub approver: String,
}

pub struct ExpenseService {
    store: ExpenseStore,
}

impl ExpenseService {
    pub fn new(db: Arc<sled::Db>) -> Result<Self> {
        Ok(Self {
            store: ExpenseStore::open(&db)?,
        })
    }

    /// Submit a new expense for approval. Only employees submit; the initial
    /// approver queue is assembled from the manager chain, the referenced
    /// rule and any matching condition rules.
    pub fn submit_expense(&self, employee: &str, new: NewExpense) -> Result<Expense> {
        if new.amount == 0 {
            return Err(ApprovalError::InvalidSubmission(
                "amount must be greater than zero".into(),
            ));
        }
        if new.currency.is_empty() {
            return Err(ApprovalError::InvalidSubmission("currency is required".into()));
        }
        let submitter = self.store.user(employee)?.ok_or_else(|| {
            ApprovalError::InvalidSubmission(format!("unknown submitter {employee}"))
        })?;
        if !submitter.role.is_employee() {
            return Err(ApprovalError::InvalidSubmission(
                "only employees can submit expenses".into(),
            ));
        }

        let approvers = ApproverSetBuilder::new(&self.store, &self.store).build(
            employee,
            new.rule_id.as_deref(),
            new.amount,
            &new.category,
        )?;

        let expense = Expense::new(
            utils::new_uuid_to_bech32(utils::EXPENSE_HRP)?,
            employee.to_string(),
            new.amount,
            new.currency,
            new.category,
            new.description,
            approvers,
            TimeStamp::now(),
        );
        self.store.insert_expense(&expense)?;
        tracing::info!(
            expense = %expense.id,
            employee,
            approvers = expense.approvers().len(),
            "expense submitted"
        );

        Ok(expense)
    }

    /// Approve a pending expense. The whole decision is committed as one
    /// atomic write; a concurrent decision on the same expense fails with a
    /// conflict rather than silently dropping a vote.
    pub fn approve_expense(
        &self,
        expense_id: &str,
        actor: &str,
        role: &Role,
        comment: Option<&str>,
    ) -> Result<DecisionOutcome> {
        let (mut expense, read_at) = self
            .store
            .load_expense(expense_id)?
            .ok_or_else(|| ApprovalError::ExpenseNotFound(expense_id.to_string()))?;

        let outcome =
            ApprovalDecisionEngine::new(&self.store).approve(&mut expense, actor, role, comment)?;
        self.store.commit_expense(&expense, &read_at)?;

        Ok(outcome)
    }

    /// Reject a pending expense. Unconditionally terminal; outstanding
    /// approvals are cancelled.
    pub fn reject_expense(
        &self,
        expense_id: &str,
        actor: &str,
        role: &Role,
        comment: Option<&str>,
    ) -> Result<DecisionOutcome> {
        let (mut expense, read_at) = self
            .store
            .load_expense(expense_id)?
            .ok_or_else(|| ApprovalError::ExpenseNotFound(expense_id.to_string()))?;

        let outcome =
            ApprovalDecisionEngine::new(&self.store).reject(&mut expense, actor, role, comment)?;
        self.store.commit_expense(&expense, &read_at)?;

        Ok(outcome)
    }

    pub fn expense(&self, expense_id: &str) -> Result<Expense> {
        self.store
            .load_expense(expense_id)?
            .map(|(expense, _)| expense)
            .ok_or_else(|| ApprovalError::ExpenseNotFound(expense_id.to_string()))
    }

    /// Role-filtered listing, newest first. Admins and managers see every
    /// expense (any of them may decide on any pending one); employees see
    /// only their own.
    pub fn list_expenses(&self, role: &Role, username: &str) -> Result<Vec<Expense>> {
        let mut expenses = self.store.list_expenses()?;
        if !(role.is_admin() || role.is_manager()) {
            expenses.retain(|e| e.employee == username);
        }
        expenses.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(expenses)
    }

    // admin: approval rules

    pub fn create_rule(&self, actor_role: &Role, new: NewRule) -> Result<Rule> {
        require_admin(actor_role)?;
        let rule = Rule {
            id: utils::new_uuid_to_bech32(utils::RULE_HRP)?,
            name: new.name,
            kind: new.kind,
            threshold: new.threshold,
            approver_pool: new.approver_pool,
            specific_approver: new.specific_approver,
            active: new.active,
        };
        rule.validate()?;
        self.store.put_rule(&rule)?;
        tracing::info!(rule = %rule.id, kind = ?rule.kind, "approval rule created");
        Ok(rule)
    }

    pub fn rule(&self, actor_role: &Role, id: &str) -> Result<Rule> {
        require_admin(actor_role)?;
        self.store
            .get_rule(id)?
            .ok_or_else(|| ApprovalError::RuleNotFound(id.to_string()))
    }

    pub fn list_rules(&self, actor_role: &Role) -> Result<Vec<Rule>> {
        require_admin(actor_role)?;
        self.store.list_rules()
    }

    pub fn update_rule(&self, actor_role: &Role, id: &str, new: NewRule) -> Result<Rule> {
        require_admin(actor_role)?;
        if self.store.get_rule(id)?.is_none() {
            return Err(ApprovalError::RuleNotFound(id.to_string()));
        }
        let rule = Rule {
            id: id.to_string(),
            name: new.name,
            kind: new.kind,
            threshold: new.threshold,
            approver_pool: new.approver_pool,
            specific_approver: new.specific_approver,
            active: new.active,
        };
        rule.validate()?;
        self.store.put_rule(&rule)?;
        Ok(rule)
    }

    pub fn delete_rule(&self, actor_role: &Role, id: &str) -> Result<()> {
        require_admin(actor_role)?;
        if !self.store.delete_rule(id)? {
            return Err(ApprovalError::RuleNotFound(id.to_string()));
        }
        Ok(())
    }

    // admin: condition rules

    pub fn create_condition_rule(
        &self,
        actor_role: &Role,
        new: NewConditionRule,
    ) -> Result<ConditionRule> {
        require_admin(actor_role)?;
        if new.approver.is_empty() {
            return Err(ApprovalError::InvalidRule(
                "condition rule names no approver".into(),
            ));
        }
        let rule = ConditionRule {
            id: utils::new_uuid_to_bech32(utils::CONDITION_HRP)?,
            field: new.field,
            operator: new.operator,
            value: new.value,
            approver: new.approver,
        };
        self.store.put_condition_rule(&rule)?;
        Ok(rule)
    }

    pub fn list_condition_rules(&self, actor_role: &Role) -> Result<Vec<ConditionRule>> {
        require_admin(actor_role)?;
        self.store.list_condition_rules()
    }

    pub fn delete_condition_rule(&self, actor_role: &Role, id: &str) -> Result<()> {
        require_admin(actor_role)?;
        if !self.store.delete_condition_rule(id)? {
            return Err(ApprovalError::RuleNotFound(id.to_string()));
        }
        Ok(())
    }

    // admin: users

    pub fn create_user(&self, actor_role: &Role, user: User) -> Result<User> {
        require_admin(actor_role)?;
        if user.username.is_empty() {
            return Err(ApprovalError::InvalidUser("username is required".into()));
        }
        if self.store.user(&user.username)?.is_some() {
            return Err(ApprovalError::InvalidUser(format!(
                "username {} is taken",
                user.username
            )));
        }
        self.store.put_user(&user)?;
        Ok(user)
    }

    pub fn user(&self, username: &str) -> Result<User> {
        self.store
            .user(username)?
            .ok_or_else(|| ApprovalError::UserNotFound(username.to_string()))
    }

    pub fn list_users(&self, actor_role: &Role) -> Result<Vec<User>> {
        require_admin(actor_role)?;
        self.store.list_users()
    }

    pub fn delete_user(&self, actor_role: &Role, username: &str) -> Result<()> {
        require_admin(actor_role)?;
        if !self.store.delete_user(username)? {
            return Err(ApprovalError::UserNotFound(username.to_string()));
        }
        Ok(())
    }
}

fn require_admin(role: &Role) -> Result<()> {
    if !role.is_admin() {
        return Err(ApprovalError::AdminOnly);
    }
    Ok(())
}
