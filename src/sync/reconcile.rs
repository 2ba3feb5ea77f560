//! Duplicate id elimination.
//!
//! Device containers key items by id, so two host items sharing an id would
//! collide in an export batch. Before every export the host database is
//! scanned and later duplicates are renamed to the next free id of the form
//! `<prefix><n>`.

use std::collections::HashSet;

use tracing::warn;

use crate::error::Result;
use crate::host::HostStore;

/// A single rename performed by [`eliminate_duplicate_ids`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub key: i64,
    pub old_id: String,
    pub new_id: String,
}

/// Split an id into its non-numeric prefix and trailing digits.
///
/// An empty digit run counts as 0. A digit run too large for `u64` is kept
/// as part of the prefix.
#[must_use]
pub fn split_numeric_suffix(id: &str) -> (&str, u64) {
    let digits_at = id
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map_or(id.len(), |(i, _)| i);

    let (prefix, digits) = id.split_at(digits_at);
    if digits.is_empty() {
        return (prefix, 0);
    }
    match digits.parse() {
        Ok(n) => (prefix, n),
        Err(_) => (id, 0),
    }
}

/// First id `<prefix><n>` with `n` above the id's own suffix that is not taken.
#[must_use]
pub fn fresh_id(id: &str, taken: &HashSet<String>) -> String {
    let (prefix, suffix) = split_numeric_suffix(id);
    let mut n = suffix.saturating_add(1);
    loop {
        let candidate = format!("{prefix}{n}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        n = n.saturating_add(1);
    }
}

/// Rename every item whose id was already claimed by an earlier item.
///
/// Items are visited in database order; the first holder of an id keeps
/// it. A candidate id is rejected if any item holds it, not only the items
/// already visited. Each rename is persisted immediately and logged as a
/// warning.
///
/// # Errors
///
/// Returns an error if the host store cannot be read or a rename fails.
pub fn eliminate_duplicate_ids<S: HostStore + ?Sized>(store: &mut S) -> Result<Vec<Rename>> {
    let items = store.items()?;

    let mut taken: HashSet<String> = items.iter().map(|item| item.id.clone()).collect();
    let mut claimed: HashSet<String> = HashSet::with_capacity(items.len());
    let mut renames = Vec::new();

    for item in items {
        if claimed.insert(item.id.clone()) {
            continue;
        }

        let new_id = fresh_id(&item.id, &taken);
        warn!(old = %item.id, new = %new_id, "Fixing duplicate id");
        store.rename_item(item.key, &new_id)?;

        taken.insert(new_id.clone());
        claimed.insert(new_id.clone());
        renames.push(Rename {
            key: item.key,
            old_id: item.id,
            new_id,
        });
    }

    Ok(renames)
}
