//! Admin-configured approval rules.
//!
//! Rules are independent of any one expense. Every *active* rule is
//! consulted on every decision, not just the rule referenced at submission.

use crate::conditions::ConditionRule;
use crate::error::{ApprovalError, Result};

/// Read-only source of approval and condition rules. The decision engine
/// re-reads active rules through this seam on every decision; the sled store
/// implements it, tests substitute fixed sets.
pub trait RuleSource {
    /// All currently active approval rules.
    fn active_rules(&self) -> Result<Vec<Rule>>;
    /// One rule by id, regardless of its active flag.
    fn rule(&self, id: &str) -> Result<Option<Rule>>;
    /// All condition rules.
    fn condition_rules(&self) -> Result<Vec<ConditionRule>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum RuleKind {
    /// Chain-of-command: approvals drain the queue until it is empty.
    #[n(0)]
    Sequential,
    /// A voting pool approves once the approved share reaches the threshold.
    #[n(1)]
    Percentage,
    /// A single designated username or role approves on its own.
    #[n(2)]
    Specific,
    /// Percentage or designated approver, whichever is satisfied first.
    #[n(3)]
    Hybrid,
    /// Injects extra approvers at submission time via condition rules.
    #[n(4)]
    Conditional,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Rule {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub kind: RuleKind,
    /// Integer percent, used by Percentage and Hybrid. Evaluation treats a
    /// missing threshold as 0.
    #[n(3)]
    pub threshold: Option<u32>,
    /// Voting pool usernames.
    #[n(4)]
    pub approver_pool: Vec<String>,
    /// Username or role string.
    #[n(5)]
    pub specific_approver: Option<String>,
    #[n(6)]
    pub active: bool,
}

impl Rule {
    /// Creation/update-time checks. A percentage check against an empty pool
    /// or a designated-approver rule without an approver never gets stored.
    pub fn validate(&self) -> Result<()> {
        match self.kind {
            RuleKind::Percentage | RuleKind::Hybrid => {
                if self.approver_pool.is_empty() {
                    return Err(ApprovalError::InvalidRule(format!(
                        "rule {} has an empty voting pool",
                        self.name
                    )));
                }
                match self.threshold {
                    None => {
                        return Err(ApprovalError::InvalidRule(format!(
                            "rule {} is missing a threshold",
                            self.name
                        )));
                    }
                    Some(t) if t > 100 => {
                        return Err(ApprovalError::InvalidRule(format!(
                            "rule {} threshold {t} is not a percentage",
                            self.name
                        )));
                    }
                    Some(_) => {}
                }
                // a hybrid's specific_approver stays optional; without one it
                // degenerates to its percentage condition
            }
            RuleKind::Specific => {
                if self.specific_approver.is_none() {
                    return Err(ApprovalError::InvalidRule(format!(
                        "rule {} names no specific approver",
                        self.name
                    )));
                }
            }
            RuleKind::Sequential | RuleKind::Conditional => {}
        }
        Ok(())
    }
}
