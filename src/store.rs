//! Sled-backed record store.
//!
//! One named tree per entity, every record CBOR-encoded. Decision commits
//! go through `compare_and_swap` against the bytes read at the start of the
//! decision, so a concurrent writer on the same expense surfaces as a
//! conflict instead of a lost update.

use std::sync::Arc;

use crate::chain::ManagerLookup;
use crate::conditions::ConditionRule;
use crate::error::{ApprovalError, Result};
use crate::expense::Expense;
use crate::rule::{Rule, RuleSource};
use crate::user::User;

const USERS_TREE: &str = "users";
const RULES_TREE: &str = "rules";
const CONDITIONS_TREE: &str = "condition_rules";
const EXPENSES_TREE: &str = "expenses";

/// Opaque snapshot of an expense record as read from the store; passed back
/// on commit for the optimistic concurrency check.
#[derive(Debug, Clone)]
pub struct Snapshot(sled::IVec);

pub struct ExpenseStore {
    users: sled::Tree,
    rules: sled::Tree,
    conditions: sled::Tree,
    expenses: sled::Tree,
}

impl ExpenseStore {
    pub fn open(db: &Arc<sled::Db>) -> Result<Self> {
        Ok(Self {
            users: db.open_tree(USERS_TREE)?,
            rules: db.open_tree(RULES_TREE)?,
            conditions: db.open_tree(CONDITIONS_TREE)?,
            expenses: db.open_tree(EXPENSES_TREE)?,
        })
    }

    // users

    pub fn put_user(&self, user: &User) -> Result<()> {
        self.users
            .insert(user.username.as_bytes(), minicbor::to_vec(user)?)?;
        Ok(())
    }

    pub fn user(&self, username: &str) -> Result<Option<User>> {
        decode_opt(self.users.get(username.as_bytes())?)
    }

    pub fn delete_user(&self, username: &str) -> Result<bool> {
        Ok(self.users.remove(username.as_bytes())?.is_some())
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        decode_all(&self.users)
    }

    // approval rules

    pub fn put_rule(&self, rule: &Rule) -> Result<()> {
        self.rules.insert(rule.id.as_bytes(), minicbor::to_vec(rule)?)?;
        Ok(())
    }

    pub fn get_rule(&self, id: &str) -> Result<Option<Rule>> {
        decode_opt(self.rules.get(id.as_bytes())?)
    }

    pub fn delete_rule(&self, id: &str) -> Result<bool> {
        Ok(self.rules.remove(id.as_bytes())?.is_some())
    }

    pub fn list_rules(&self) -> Result<Vec<Rule>> {
        decode_all(&self.rules)
    }

    // condition rules

    pub fn put_condition_rule(&self, rule: &ConditionRule) -> Result<()> {
        self.conditions
            .insert(rule.id.as_bytes(), minicbor::to_vec(rule)?)?;
        Ok(())
    }

    pub fn delete_condition_rule(&self, id: &str) -> Result<bool> {
        Ok(self.conditions.remove(id.as_bytes())?.is_some())
    }

    pub fn list_condition_rules(&self) -> Result<Vec<ConditionRule>> {
        decode_all(&self.conditions)
    }

    // expenses

    pub fn insert_expense(&self, expense: &Expense) -> Result<()> {
        self.expenses
            .insert(expense.id.as_bytes(), minicbor::to_vec(expense)?)?;
        Ok(())
    }

    /// Reads an expense together with the raw bytes backing it, to be handed
    /// back to [`commit_expense`](Self::commit_expense).
    pub fn load_expense(&self, id: &str) -> Result<Option<(Expense, Snapshot)>> {
        let Some(raw) = self.expenses.get(id.as_bytes())? else {
            return Ok(None);
        };
        let expense: Expense = minicbor::decode(&raw)?;
        Ok(Some((expense, Snapshot(raw))))
    }

    /// Writes the whole mutated record in one compare-and-swap against the
    /// snapshot it was loaded from. A mismatch means another decision
    /// committed in between; the caller gets a conflict and nothing is
    /// written.
    pub fn commit_expense(&self, expense: &Expense, read_at: &Snapshot) -> Result<()> {
        self.expenses
            .compare_and_swap(
                expense.id.as_bytes(),
                Some(&read_at.0),
                Some(minicbor::to_vec(expense)?),
            )?
            .map_err(|_| ApprovalError::LostUpdate(expense.id.clone()))
    }

    pub fn list_expenses(&self) -> Result<Vec<Expense>> {
        decode_all(&self.expenses)
    }
}

impl ManagerLookup for ExpenseStore {
    fn manager_of(&self, username: &str) -> Result<Option<String>> {
        Ok(self.user(username)?.and_then(|user| user.manager))
    }
}

impl RuleSource for ExpenseStore {
    fn active_rules(&self) -> Result<Vec<Rule>> {
        Ok(self.list_rules()?.into_iter().filter(|r| r.active).collect())
    }

    fn rule(&self, id: &str) -> Result<Option<Rule>> {
        self.get_rule(id)
    }

    fn condition_rules(&self) -> Result<Vec<ConditionRule>> {
        self.list_condition_rules()
    }
}

fn decode_opt<T>(raw: Option<sled::IVec>) -> Result<Option<T>>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    match raw {
        Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
        None => Ok(None),
    }
}

fn decode_all<T>(tree: &sled::Tree) -> Result<Vec<T>>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    let mut records = Vec::new();
    for entry in tree.iter() {
        let (_, bytes) = entry?;
        records.push(minicbor::decode(&bytes)?);
    }
    Ok(records)
}
