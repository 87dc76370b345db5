//! Manager chain resolution.

use crate::error::Result;

/// Hard cap on reporting-chain hops.
pub const MAX_CHAIN_DEPTH: usize = 10;

/// Read-only seam over the user directory; the sled store implements this,
/// tests substitute a map.
pub trait ManagerLookup {
    fn manager_of(&self, username: &str) -> Result<Option<String>>;
}

/// Walks the reporting hierarchy upward from `username`: manager first, then
/// the manager's manager, and so on. Stops when a user has no manager, when
/// the next manager already appears in the chain (the stored graph may be
/// cyclic), or at [`MAX_CHAIN_DEPTH`] hops. A missing user simply yields an
/// empty chain.
pub fn resolve_chain<L: ManagerLookup + ?Sized>(lookup: &L, username: &str) -> Result<Vec<String>> {
    let mut chain: Vec<String> = Vec::new();
    let mut current = username.to_string();

    while chain.len() < MAX_CHAIN_DEPTH {
        let Some(manager) = lookup.manager_of(&current)? else {
            break;
        };
        if manager.is_empty() || chain.iter().any(|m| *m == manager) {
            break;
        }
        chain.push(manager.clone());
        current = manager;
    }

    Ok(chain)
}
