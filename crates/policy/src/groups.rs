//! Group hierarchy resolution.

use std::collections::{BTreeSet, VecDeque};

use ledgersuite_core::{GroupId, PrincipalId};

use crate::store::{GroupDirectory, StoreResult};

/// Compute the transitive closure of a principal's groups.
///
/// Starts from the directly-assigned active groups and repeatedly unions in
/// each group's implied groups until nothing new is reachable. The walk is
/// breadth-first over a potentially cyclic graph; the result set doubles as
/// the seen-set guard, so diamonds and cycles terminate. Inactive groups are
/// skipped whether assigned or implied, and ids the directory no longer knows
/// are ignored.
///
/// A principal with no assignments resolves to the empty set, not an error.
pub fn resolve_effective_groups<D>(
    directory: &D,
    principal: &PrincipalId,
) -> StoreResult<BTreeSet<GroupId>>
where
    D: GroupDirectory + ?Sized,
{
    let mut effective = BTreeSet::new();
    let mut queue: VecDeque<GroupId> = directory.assigned_groups(principal)?.into();

    while let Some(id) = queue.pop_front() {
        if effective.contains(&id) {
            continue;
        }
        let Some(group) = directory.group(&id)? else {
            continue;
        };
        if !group.active {
            continue;
        }
        effective.insert(id);
        for implied in group.implied {
            if !effective.contains(&implied) {
                queue.push_back(implied);
            }
        }
    }

    Ok(effective)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Group;
    use crate::store::MemoryPolicyStore;

    fn seed(store: &MemoryPolicyStore, id: &'static str, implied: &[&'static str]) {
        let mut group = Group::new(GroupId::new(id), id);
        group.implied = implied.iter().map(|g| GroupId::new(*g)).collect();
        store.upsert_group(group).unwrap();
    }

    fn assigned(store: &MemoryPolicyStore, ids: &[&'static str]) -> PrincipalId {
        let principal = PrincipalId::new();
        store
            .assign_groups(principal, ids.iter().map(|g| GroupId::new(*g)).collect())
            .unwrap();
        principal
    }

    fn names(set: &BTreeSet<GroupId>) -> Vec<&str> {
        set.iter().map(|g| g.as_str()).collect()
    }

    #[test]
    fn closure_includes_implied_groups_transitively() {
        let store = MemoryPolicyStore::new();
        seed(&store, "base.group_system", &["base.group_erp_manager"]);
        seed(&store, "base.group_erp_manager", &["base.group_user"]);
        seed(&store, "base.group_user", &[]);
        let principal = assigned(&store, &["base.group_system"]);

        let effective = resolve_effective_groups(&store, &principal).unwrap();
        assert_eq!(
            names(&effective),
            vec!["base.group_erp_manager", "base.group_system", "base.group_user"]
        );
    }

    #[test]
    fn cycle_terminates_and_returns_both_members() {
        let store = MemoryPolicyStore::new();
        seed(&store, "base.group_a", &["base.group_b"]);
        seed(&store, "base.group_b", &["base.group_a"]);
        let principal = assigned(&store, &["base.group_a"]);

        let effective = resolve_effective_groups(&store, &principal).unwrap();
        assert_eq!(names(&effective), vec!["base.group_a", "base.group_b"]);
    }

    #[test]
    fn diamond_is_visited_once() {
        let store = MemoryPolicyStore::new();
        seed(&store, "base.group_top", &["base.group_left", "base.group_right"]);
        seed(&store, "base.group_left", &["base.group_bottom"]);
        seed(&store, "base.group_right", &["base.group_bottom"]);
        seed(&store, "base.group_bottom", &[]);
        let principal = assigned(&store, &["base.group_top"]);

        let effective = resolve_effective_groups(&store, &principal).unwrap();
        assert_eq!(effective.len(), 4);
    }

    #[test]
    fn no_assignments_resolve_to_empty_set() {
        let store = MemoryPolicyStore::new();
        let effective = resolve_effective_groups(&store, &PrincipalId::new()).unwrap();
        assert!(effective.is_empty());
    }

    #[test]
    fn inactive_groups_are_skipped() {
        let store = MemoryPolicyStore::new();
        seed(&store, "base.group_user", &[]);
        let mut dormant = Group::new(GroupId::new("base.group_dormant"), "dormant");
        dormant.active = false;
        dormant.implied = vec![GroupId::new("base.group_user")];
        store.upsert_group(dormant).unwrap();
        let principal = assigned(&store, &["base.group_dormant"]);

        // The inactive seed grants nothing, including its implications.
        let effective = resolve_effective_groups(&store, &principal).unwrap();
        assert!(effective.is_empty());
    }

    #[test]
    fn resolution_is_idempotent() {
        let store = MemoryPolicyStore::new();
        seed(&store, "base.group_system", &["base.group_user"]);
        seed(&store, "base.group_user", &[]);
        let principal = assigned(&store, &["base.group_system"]);

        let first = resolve_effective_groups(&store, &principal).unwrap();
        let second = resolve_effective_groups(&store, &principal).unwrap();
        assert_eq!(first, second);
    }
}
