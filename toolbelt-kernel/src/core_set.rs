//! Guarantees that core tools are part of every resolved set.

use std::collections::HashSet;

use toolbelt_primitives::ToolId;

/// Merges ranked ids with the core set.
///
/// Ranked ids keep their order; core ids that were not ranked are appended
/// in their own order. The result contains no duplicates.
#[must_use]
pub fn union(ranked: &[ToolId], core: &[ToolId]) -> Vec<ToolId> {
    let mut seen: HashSet<&ToolId> = HashSet::with_capacity(ranked.len() + core.len());
    ranked
        .iter()
        .chain(core)
        .filter(|id| seen.insert(*id))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<ToolId> {
        raw.iter().map(|id| ToolId::new(*id).unwrap()).collect()
    }

    #[test]
    fn appends_missing_core_ids() {
        assert_eq!(
            union(&ids(&["calc"]), &ids(&["search"])),
            ids(&["calc", "search"])
        );
    }

    #[test]
    fn keeps_ranked_order_and_removes_duplicates() {
        assert_eq!(
            union(&ids(&["b", "a", "b", "c"]), &ids(&["c", "d", "d"])),
            ids(&["b", "a", "c", "d"])
        );
    }

    #[test]
    fn empty_inputs() {
        assert!(union(&[], &[]).is_empty());
        assert_eq!(union(&[], &ids(&["search"])), ids(&["search"]));
        assert_eq!(union(&ids(&["calc"]), &[]), ids(&["calc"]));
    }
}
