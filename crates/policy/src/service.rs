//! Policy service façade.
//!
//! Orchestrates the resolver, rule store, and domain compiler into the four
//! public authorization operations, with per-request-scoped caches. The
//! service is synchronous and performs no I/O of its own beyond rule-store
//! reads; many request threads may share one instance.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use serde::Serialize;

use ledgersuite_core::{CrudFlags, CrudOp, GroupId, ModelName, PrincipalId};

use crate::domain::Domain;
use crate::error::{PolicyError, PolicyResult};
use crate::groups::resolve_effective_groups;
use crate::principal::{EvaluationContext, Principal, Record};
use crate::query::{Filter, QueryBuilder};
use crate::rules::RuleSets;
use crate::store::PolicyStore;

/// Membership in this group (direct or implied) bypasses all checks.
pub const SYSTEM_ADMIN_GROUP: &str = "base.group_system";

/// The distinguished session role that bypasses all checks.
pub const OWNER_ROLE: &str = "owner";

/// Read-only permission summary for presentation/API purposes.
#[derive(Debug, Clone, Serialize)]
pub struct UserPermissions {
    pub groups: Vec<GroupId>,
    pub access: BTreeMap<ModelName, CrudFlags>,
    pub super_admin: bool,
}

/// Cache key for model-access verdicts: the verdict depends only on the
/// group set, so principals sharing groups share entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AccessKey {
    model: ModelName,
    op: CrudOp,
    groups: String,
}

impl AccessKey {
    fn new(model: &ModelName, op: CrudOp, groups: &BTreeSet<GroupId>) -> Self {
        let mut joined = String::new();
        for group in groups {
            if !joined.is_empty() {
                joined.push(',');
            }
            joined.push_str(group.as_str());
        }
        Self {
            model: model.clone(),
            op,
            groups: joined,
        }
    }
}

/// The policy engine façade.
pub struct PolicyService<S> {
    store: Arc<S>,
    group_cache: RwLock<HashMap<PrincipalId, Arc<BTreeSet<GroupId>>>>,
    access_cache: RwLock<HashMap<AccessKey, bool>>,
}

impl<S: PolicyStore> PolicyService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            group_cache: RwLock::new(HashMap::new()),
            access_cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolve (and cache) the principal's effective group closure.
    ///
    /// Concurrent misses may recompute the same entry; the recomputation is
    /// idempotent and last-writer-wins is acceptable.
    pub fn effective_groups(
        &self,
        principal: &PrincipalId,
    ) -> PolicyResult<Arc<BTreeSet<GroupId>>> {
        if let Some(groups) = self
            .group_cache
            .read()
            .map_err(|_| PolicyError::CachePoisoned)?
            .get(principal)
        {
            return Ok(Arc::clone(groups));
        }

        let groups = Arc::new(resolve_effective_groups(self.store.as_ref(), principal)?);
        self.group_cache
            .write()
            .map_err(|_| PolicyError::CachePoisoned)?
            .insert(*principal, Arc::clone(&groups));
        Ok(groups)
    }

    /// Whether any super-admin signal applies.
    ///
    /// Signals are OR-ed: explicit super-admin flag, platform-admin flag, the
    /// distinguished owner role, or membership (direct or implied) in the
    /// system-administrator group.
    pub fn is_super_admin(&self, principal: &Principal) -> PolicyResult<bool> {
        if principal.super_admin || principal.platform_admin || principal.has_role(OWNER_ROLE) {
            return Ok(true);
        }
        let groups = self.effective_groups(&principal.id)?;
        Ok(groups.contains(&GroupId::new(SYSTEM_ADMIN_GROUP)))
    }

    /// Coarse CRUD check: does any active applicable access row grant `op`?
    ///
    /// Access defaults closed: no groups or no rows means deny.
    pub fn check_model_access(
        &self,
        principal: &Principal,
        model: &ModelName,
        op: CrudOp,
    ) -> PolicyResult<bool> {
        if self.is_super_admin(principal)? {
            tracing::debug!(principal = %principal.id, model = %model, %op, "super-admin bypass");
            return Ok(true);
        }

        let groups = self.effective_groups(&principal.id)?;
        if groups.is_empty() {
            return Ok(false);
        }

        let key = AccessKey::new(model, op, &groups);
        if let Some(allowed) = self
            .access_cache
            .read()
            .map_err(|_| PolicyError::CachePoisoned)?
            .get(&key)
        {
            return Ok(*allowed);
        }

        let rows = self.store.model_access_for(model, &groups)?;
        let allowed = rows.iter().any(|row| row.grants(op));
        self.access_cache
            .write()
            .map_err(|_| PolicyError::CachePoisoned)?
            .insert(key, allowed);
        Ok(allowed)
    }

    /// Narrow a query to the rows the principal may touch.
    ///
    /// Every global rule ANDs one clause onto the builder; group rules, when
    /// any apply, contribute a single AND-ed clause that is the OR of their
    /// compiled filters. A model with no applicable rules leaves the builder
    /// unmodified.
    pub fn apply_record_rules<Q: QueryBuilder>(
        &self,
        query: Q,
        model: &ModelName,
        op: CrudOp,
        principal: &Principal,
    ) -> PolicyResult<Q> {
        if self.is_super_admin(principal)? {
            tracing::debug!(principal = %principal.id, model = %model, %op, "super-admin bypass");
            return Ok(query);
        }

        let sets = self.applicable_rules(principal, model, op)?;
        let ctx = EvaluationContext::for_principal(principal);

        let mut query = query;
        for rule in &sets.global {
            let filter = Domain::parse(&rule.domain).to_filter(&ctx);
            if !filter.is_unrestricted() {
                query = query.and_group(|group| filter.apply(group));
            }
        }

        if !sets.group.is_empty() {
            let filters: Vec<Filter> = sets
                .group
                .iter()
                .map(|rule| Domain::parse(&rule.domain).to_filter(&ctx))
                .collect();
            // One unrestricted qualifying rule satisfies the OR tier outright.
            if !filters.iter().any(Filter::is_unrestricted) {
                let tier = Filter::any(filters);
                query = query.and_group(|group| tier.apply(group));
            }
        }

        Ok(query)
    }

    /// Row-level check against a materialized record.
    ///
    /// All global rules must match (AND); if group rules apply, at least one
    /// must match (OR); an absent tier passes.
    pub fn check_record_access(
        &self,
        principal: &Principal,
        record: &Record,
        model: &ModelName,
        op: CrudOp,
    ) -> PolicyResult<bool> {
        if self.is_super_admin(principal)? {
            return Ok(true);
        }

        let sets = self.applicable_rules(principal, model, op)?;
        let ctx = EvaluationContext::for_principal(principal);

        for rule in &sets.global {
            if !Domain::parse(&rule.domain).matches(&ctx, record) {
                return Ok(false);
            }
        }

        if !sets.group.is_empty() {
            let any = sets
                .group
                .iter()
                .any(|rule| Domain::parse(&rule.domain).matches(&ctx, record));
            if !any {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Read-only summary of a principal's effective permissions.
    ///
    /// Derives entirely from the check primitives above.
    pub fn user_permissions(&self, principal: &Principal) -> PolicyResult<UserPermissions> {
        let groups = self.effective_groups(&principal.id)?;
        let super_admin = self.is_super_admin(principal)?;

        let mut access = BTreeMap::new();
        for model in self.store.known_models()? {
            let mut flags = CrudFlags::NONE;
            for op in CrudOp::ALL {
                if self.check_model_access(principal, &model, op)? {
                    flags = flags.with(op);
                }
            }
            access.insert(model, flags);
        }

        Ok(UserPermissions {
            groups: groups.iter().cloned().collect(),
            access,
            super_admin,
        })
    }

    /// Invalidate caches after a group or rule mutation.
    ///
    /// With a principal, evicts that principal's group closure; access
    /// verdicts are keyed by group set, so the access cache is flushed
    /// wholesale either way. Safe to call concurrently with reads.
    pub fn clear_cache(&self, principal: Option<&PrincipalId>) {
        // Invalidation must go through even if a writer panicked mid-update.
        let mut groups = self
            .group_cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match principal {
            Some(id) => {
                groups.remove(id);
                tracing::debug!(principal = %id, "group-closure cache invalidated");
            }
            None => {
                groups.clear();
                tracing::debug!("group-closure cache flushed");
            }
        }
        drop(groups);

        self.access_cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    fn applicable_rules(
        &self,
        principal: &Principal,
        model: &ModelName,
        op: CrudOp,
    ) -> PolicyResult<RuleSets> {
        let groups = self.effective_groups(&principal.id)?;
        Ok(self.store.record_rules_for(model, op, &groups)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Group, ModelAccess, RecordRule};
    use crate::store::MemoryPolicyStore;
    use ledgersuite_core::{AccessId, RuleId};

    fn service() -> PolicyService<MemoryPolicyStore> {
        PolicyService::new(Arc::new(MemoryPolicyStore::new()))
    }

    fn model() -> ModelName {
        ModelName::new("contacts.partner")
    }

    fn grant_read(service: &PolicyService<MemoryPolicyStore>, group: &'static str) {
        service
            .store()
            .upsert_model_access(ModelAccess {
                id: AccessId::new(),
                model: model(),
                group: Some(GroupId::new(group)),
                perms: CrudFlags::read_only(),
                active: true,
                module: "contacts".to_string(),
            })
            .unwrap();
    }

    fn member_of(service: &PolicyService<MemoryPolicyStore>, group: &'static str) -> Principal {
        let principal = Principal::new(PrincipalId::new());
        service
            .store()
            .upsert_group(Group::new(GroupId::new(group), group))
            .unwrap();
        service
            .store()
            .assign_groups(principal.id, vec![GroupId::new(group)])
            .unwrap();
        principal
    }

    #[test]
    fn flag_signals_bypass_without_any_groups() {
        let service = service();

        let mut principal = Principal::new(PrincipalId::new());
        principal.super_admin = true;
        assert!(service.check_model_access(&principal, &model(), CrudOp::Delete).unwrap());

        let mut principal = Principal::new(PrincipalId::new());
        principal.platform_admin = true;
        assert!(service.is_super_admin(&principal).unwrap());

        let principal = Principal::new(PrincipalId::new()).with_role(OWNER_ROLE);
        assert!(service.is_super_admin(&principal).unwrap());
    }

    #[test]
    fn implied_membership_in_system_group_bypasses() {
        let service = service();
        service
            .store()
            .upsert_group(
                Group::new(GroupId::new("base.group_erp_manager"), "ERP manager")
                    .implying(GroupId::new(SYSTEM_ADMIN_GROUP)),
            )
            .unwrap();
        service
            .store()
            .upsert_group(Group::new(GroupId::new(SYSTEM_ADMIN_GROUP), "System"))
            .unwrap();
        let principal = Principal::new(PrincipalId::new());
        service
            .store()
            .assign_groups(principal.id, vec![GroupId::new("base.group_erp_manager")])
            .unwrap();

        assert!(service.is_super_admin(&principal).unwrap());
    }

    #[test]
    fn no_groups_means_no_model_access() {
        let service = service();
        grant_read(&service, "base.group_user");
        let principal = Principal::new(PrincipalId::new());
        assert!(!service.check_model_access(&principal, &model(), CrudOp::Read).unwrap());
    }

    #[test]
    fn stale_verdicts_survive_until_cache_clear() {
        let service = service();
        grant_read(&service, "base.group_user");
        let principal = member_of(&service, "base.group_manager");
        service
            .store()
            .upsert_group(Group::new(GroupId::new("base.group_user"), "User"))
            .unwrap();

        assert!(!service.check_model_access(&principal, &model(), CrudOp::Read).unwrap());

        // Reassignment alone is not visible: the closure is cached.
        service
            .store()
            .assign_groups(principal.id, vec![GroupId::new("base.group_user")])
            .unwrap();
        assert!(!service.check_model_access(&principal, &model(), CrudOp::Read).unwrap());

        service.clear_cache(Some(&principal.id));
        assert!(service.check_model_access(&principal, &model(), CrudOp::Read).unwrap());
    }

    #[test]
    fn record_rules_absent_means_record_access_granted() {
        let service = service();
        let principal = member_of(&service, "base.group_user");
        let record = Record::new();
        assert!(service
            .check_record_access(&principal, &record, &model(), CrudOp::Write)
            .unwrap());
    }

    #[test]
    fn unrestricted_group_rule_satisfies_the_or_tier() {
        let service = service();
        let principal = member_of(&service, "base.group_user");
        service
            .store()
            .upsert_record_rule(RecordRule {
                id: RuleId::new(),
                name: "own records".to_string(),
                model: model(),
                domain: r#"[["owner_id","=","user.id"]]"#.to_string(),
                global: false,
                ops: CrudFlags::ALL,
                priority: 10,
                groups: vec![GroupId::new("base.group_user")],
                module: "contacts".to_string(),
                active: true,
            })
            .unwrap();
        service
            .store()
            .upsert_record_rule(RecordRule {
                id: RuleId::new(),
                name: "managers see all".to_string(),
                model: model(),
                domain: "true".to_string(),
                global: false,
                ops: CrudFlags::ALL,
                priority: 20,
                groups: vec![GroupId::new("base.group_user")],
                module: "contacts".to_string(),
                active: true,
            })
            .unwrap();

        let query = service
            .apply_record_rules(crate::query::FilterQuery::new(), &model(), CrudOp::Read, &principal)
            .unwrap();
        assert!(query.into_filter().is_unrestricted());
    }
}
