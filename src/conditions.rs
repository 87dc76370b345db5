//! Condition-triggered approver injection.
//!
//! Admin-defined predicates over expense attributes, evaluated against the
//! submitting expense at submission time only.

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum ConditionField {
    #[n(0)]
    Amount,
    #[n(1)]
    Category,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum ConditionOp {
    #[n(0)]
    GreaterThan,
    #[n(1)]
    LessThan,
    #[n(2)]
    Equals,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct ConditionRule {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub field: ConditionField,
    #[n(2)]
    pub operator: ConditionOp,
    /// Compared numerically for Amount conditions; a non-numeric value makes
    /// the rule a non-match, never an error.
    #[n(3)]
    pub value: String,
    /// Injected into the approver queue when the rule matches.
    #[n(4)]
    pub approver: String,
}

impl ConditionRule {
    pub fn matches(&self, amount: u64, category: &str) -> bool {
        match self.field {
            ConditionField::Amount => {
                let Ok(value) = self.value.parse::<u64>() else {
                    return false;
                };
                match self.operator {
                    ConditionOp::GreaterThan => amount > value,
                    ConditionOp::LessThan => amount < value,
                    ConditionOp::Equals => amount == value,
                }
            }
            // categories compare case-insensitively, equality only
            ConditionField::Category => {
                self.operator == ConditionOp::Equals && self.value.eq_ignore_ascii_case(category)
            }
        }
    }
}

/// Approvers injected by the matching condition rules, deduplicated in
/// first-match order. Order is not significant downstream; the builder merges
/// the result into an already-ordered queue.
pub fn matched_approvers(rules: &[ConditionRule], amount: u64, category: &str) -> Vec<String> {
    let mut approvers: Vec<String> = Vec::new();
    for rule in rules {
        if rule.matches(amount, category) && !approvers.contains(&rule.approver) {
            approvers.push(rule.approver.clone());
        }
    }
    approvers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amount_rule(operator: ConditionOp, value: &str, approver: &str) -> ConditionRule {
        ConditionRule {
            id: "cond_1test".into(),
            field: ConditionField::Amount,
            operator,
            value: value.into(),
            approver: approver.into(),
        }
    }

    fn category_rule(operator: ConditionOp, value: &str, approver: &str) -> ConditionRule {
        ConditionRule {
            id: "cond_1test".into(),
            field: ConditionField::Category,
            operator,
            value: value.into(),
            approver: approver.into(),
        }
    }

    #[test]
    fn amount_comparisons() {
        assert!(amount_rule(ConditionOp::GreaterThan, "1000", "cfo").matches(1500, "travel"));
        assert!(!amount_rule(ConditionOp::GreaterThan, "1000", "cfo").matches(1000, "travel"));
        assert!(amount_rule(ConditionOp::LessThan, "1000", "cfo").matches(999, "travel"));
        assert!(amount_rule(ConditionOp::Equals, "500", "cfo").matches(500, "travel"));
    }

    #[test]
    fn non_numeric_value_is_skipped() {
        assert!(!amount_rule(ConditionOp::GreaterThan, "lots", "cfo").matches(1500, "travel"));
    }

    #[test]
    fn category_matches_case_insensitively() {
        assert!(category_rule(ConditionOp::Equals, "Travel", "auditor").matches(100, "travel"));
        assert!(!category_rule(ConditionOp::Equals, "travel", "auditor").matches(100, "meals"));
    }

    #[test]
    fn category_ignores_ordering_operators() {
        assert!(!category_rule(ConditionOp::GreaterThan, "travel", "auditor").matches(100, "travel"));
        assert!(!category_rule(ConditionOp::LessThan, "travel", "auditor").matches(100, "travel"));
    }

    #[test]
    fn matched_approvers_deduplicates() {
        let rules = vec![
            amount_rule(ConditionOp::GreaterThan, "100", "cfo"),
            category_rule(ConditionOp::Equals, "travel", "cfo"),
            category_rule(ConditionOp::Equals, "travel", "auditor"),
            amount_rule(ConditionOp::LessThan, "50", "intern"),
        ];

        let approvers = matched_approvers(&rules, 500, "travel");
        assert_eq!(approvers, ["cfo", "auditor"]);
    }
}
