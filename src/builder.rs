//! Initial approver queue assembly at submission time.

use crate::chain::{ManagerLookup, resolve_chain};
use crate::conditions::matched_approvers;
use crate::error::{ApprovalError, Result};
use crate::expense::ApproverQueue;
use crate::rule::RuleSource;

/// Merges the manager chain, rule-tied approvers and condition-matched
/// approvers into one deduplicated, order-preserving queue.
pub struct ApproverSetBuilder<'a> {
    directory: &'a dyn ManagerLookup,
    rules: &'a dyn RuleSource,
}

impl<'a> ApproverSetBuilder<'a> {
    pub fn new(directory: &'a dyn ManagerLookup, rules: &'a dyn RuleSource) -> Self {
        Self { directory, rules }
    }

    /// Builds the initial queue. Canonical order, later stages append only
    /// when the username is not already queued:
    ///
    /// 1. the manager chain (sequential-first semantics),
    /// 2. the referenced rule's voting pool, then its specific approver
    ///    (an inactive rule is skipped; an unknown id is an error),
    /// 3. condition-rule matches for this amount and category.
    pub fn build(
        &self,
        employee: &str,
        rule_id: Option<&str>,
        amount: u64,
        category: &str,
    ) -> Result<ApproverQueue> {
        let mut queue: ApproverQueue =
            resolve_chain(self.directory, employee)?.into_iter().collect();

        if let Some(rule_id) = rule_id {
            let rule = self
                .rules
                .rule(rule_id)?
                .ok_or_else(|| ApprovalError::RuleNotFound(rule_id.to_string()))?;
            if rule.active {
                for member in &rule.approver_pool {
                    queue.enqueue(member.clone());
                }
                if let Some(specific) = &rule.specific_approver {
                    queue.enqueue(specific.clone());
                }
            }
        }

        let conditions = self.rules.condition_rules()?;
        for approver in matched_approvers(&conditions, amount, category) {
            queue.enqueue(approver);
        }

        Ok(queue)
    }
}
