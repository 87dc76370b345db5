//! Identifier helpers

use crate::error::{ApprovalError, Result};
use bech32::Bech32m;
use uuid7::uuid7;

/// Human-readable prefix for expense record ids.
pub const EXPENSE_HRP: &str = "expense_";
/// Human-readable prefix for approval rule ids.
pub const RULE_HRP: &str = "rule_";
/// Human-readable prefix for condition rule ids.
pub const CONDITION_HRP: &str = "cond_";

// mint a time-ordered uuid then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> Result<String> {
    let hrp = bech32::Hrp::parse(hrp).map_err(|e| ApprovalError::Identifier(e.to_string()))?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())
        .map_err(|e| ApprovalError::Identifier(e.to_string()))?;
    Ok(encode)
}
