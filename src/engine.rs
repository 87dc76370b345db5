//! The approval decision state machine.
//!
//! Consumes approve/reject actions, updates the approver queue and vote
//! ledger, re-evaluates every active rule and computes the new status.
//! Rules are re-read through [`RuleSource`] on each decision rather than
//! snapshotted at submission.

use std::collections::HashSet;

use crate::error::{ApprovalError, Result};
use crate::expense::{ApproverQueue, Decision, Expense, ExpenseStatus, Vote};
use crate::rule::{Rule, RuleKind, RuleSource};
use crate::user::Role;

/// Result of a decision: the (possibly terminal) status and the usernames
/// still owed a vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionOutcome {
    pub status: ExpenseStatus,
    pub remaining_approvers: Vec<String>,
}

/// Why an approval became final.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    /// An active Specific rule's designated approver (by username or role)
    /// cast this vote.
    Specific { rule_id: String },
    /// A Percentage rule's pool reached its threshold.
    Percentage { rule_id: String, percent: u32 },
    /// A Hybrid rule satisfied its percentage or designated-approver arm.
    Hybrid { rule_id: String },
    /// No rule granted approval and the queue drained.
    QueueExhausted,
}

/// Whether `actor` may decide on `expense`: queued approvers may, and any
/// manager or admin may decide on any pending expense. The role bypass is
/// intentionally broad; swapping the policy means swapping this function,
/// not the state machine.
pub fn can_decide(actor: &str, role: &Role, expense: &Expense) -> bool {
    expense.approvers().contains(actor) || role.is_admin() || role.is_manager()
}

/// Share of `pool` that has cast an Approve vote, as a floored integer
/// percent. Voters outside the pool are ignored and a pool member voting
/// twice counts once. An empty pool contributes 0%.
pub fn pool_percentage(pool: &[String], votes: &[Vote]) -> u32 {
    if pool.is_empty() {
        return 0;
    }
    let approved: HashSet<&str> = votes
        .iter()
        .filter(|v| v.decision == Decision::Approve)
        .map(|v| v.user.as_str())
        .filter(|user| pool.iter().any(|member| member == user))
        .collect();
    ((approved.len() * 100) / pool.len()) as u32
}

fn percentage_met(rule: &Rule, votes: &[Vote]) -> Option<u32> {
    let percent = pool_percentage(&rule.approver_pool, votes);
    (percent >= rule.threshold.unwrap_or(0)).then_some(percent)
}

fn specific_approver_voted(rule: &Rule, votes: &[Vote]) -> bool {
    let Some(specific) = &rule.specific_approver else {
        return false;
    };
    votes
        .iter()
        .any(|v| v.decision == Decision::Approve && v.user == *specific)
}

/// Evaluates every active rule against the ledger after a vote, in priority
/// order: Specific, then Percentage, then Hybrid, then the sequential
/// exhaustion fallback. `None` means the expense stays pending.
pub fn evaluate(
    active_rules: &[Rule],
    actor: &str,
    role: &Role,
    votes: &[Vote],
    queue: &ApproverQueue,
) -> Option<Grant> {
    for rule in active_rules.iter().filter(|r| r.kind == RuleKind::Specific) {
        if let Some(specific) = &rule.specific_approver {
            if specific == actor || specific == role.as_str() {
                return Some(Grant::Specific {
                    rule_id: rule.id.clone(),
                });
            }
        }
    }

    for rule in active_rules.iter().filter(|r| r.kind == RuleKind::Percentage) {
        if let Some(percent) = percentage_met(rule, votes) {
            return Some(Grant::Percentage {
                rule_id: rule.id.clone(),
                percent,
            });
        }
    }

    for rule in active_rules.iter().filter(|r| r.kind == RuleKind::Hybrid) {
        if percentage_met(rule, votes).is_some() || specific_approver_voted(rule, votes) {
            return Some(Grant::Hybrid {
                rule_id: rule.id.clone(),
            });
        }
    }

    if queue.is_empty() {
        return Some(Grant::QueueExhausted);
    }

    None
}

pub struct ApprovalDecisionEngine<'a> {
    rules: &'a dyn RuleSource,
}

impl<'a> ApprovalDecisionEngine<'a> {
    pub fn new(rules: &'a dyn RuleSource) -> Self {
        Self { rules }
    }

    /// Applies an Approve decision to a pending expense.
    ///
    /// Appends the comment and vote, removes the actor from the queue, then
    /// re-evaluates the live rule set. The caller persists the mutated
    /// aggregate atomically; on any error the aggregate is untouched.
    pub fn approve(
        &self,
        expense: &mut Expense,
        actor: &str,
        role: &Role,
        comment: Option<&str>,
    ) -> Result<DecisionOutcome> {
        self.guard(expense, actor, role)?;

        expense.record_comment(format!("{actor}: {}", comment.unwrap_or("Approved")));
        expense.record_vote(actor, Decision::Approve);
        expense.remove_approver(actor);

        let active = self.rules.active_rules()?;
        if let Some(grant) = evaluate(&active, actor, role, expense.votes(), expense.approvers()) {
            expense.mark_approved();
            tracing::info!(expense = %expense.id, actor, grant = ?grant, "expense approved");
        } else {
            tracing::debug!(
                expense = %expense.id,
                actor,
                remaining = expense.approvers().len(),
                "vote recorded, expense still pending"
            );
        }

        Ok(DecisionOutcome {
            status: expense.status(),
            remaining_approvers: expense.approvers().to_vec(),
        })
    }

    /// Applies a Reject decision. Rejection is unconditionally terminal:
    /// the queue is cleared and no rule evaluation runs.
    pub fn reject(
        &self,
        expense: &mut Expense,
        actor: &str,
        role: &Role,
        comment: Option<&str>,
    ) -> Result<DecisionOutcome> {
        self.guard(expense, actor, role)?;

        expense.record_comment(format!("{actor}: {}", comment.unwrap_or("Rejected")));
        expense.record_vote(actor, Decision::Reject);
        expense.mark_rejected();
        tracing::info!(expense = %expense.id, actor, "expense rejected");

        Ok(DecisionOutcome {
            status: expense.status(),
            remaining_approvers: Vec::new(),
        })
    }

    /// Terminal and authorization preconditions, checked before any mutation.
    fn guard(&self, expense: &Expense, actor: &str, role: &Role) -> Result<()> {
        if expense.is_terminal() {
            return Err(ApprovalError::TerminalState {
                expense_id: expense.id.clone(),
                status: expense.status(),
            });
        }
        if !can_decide(actor, role, expense) {
            return Err(ApprovalError::NotAnApprover {
                actor: actor.to_string(),
                expense_id: expense.id.clone(),
            });
        }
        Ok(())
    }
}
