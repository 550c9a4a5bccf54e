//! Read-only rule store boundary.
//!
//! The engine reads groups, assignments, model-access grants, and record
//! rules through the traits below; populating them (manifest parsing, CSV
//! access tables, upserts) is the rule-loading collaborator's concern.
//! [`MemoryPolicyStore`] is the default in-process implementation used by
//! hosts and tests; its write surface *is* that collaborator's boundary.

use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use ledgersuite_core::{CrudOp, GroupId, ModelName, PrincipalId};

use crate::rules::{Group, ModelAccess, RecordRule, RuleSets};

/// Result type for rule-store reads.
pub type StoreResult<T> = Result<T, StoreError>;

/// Infrastructure/configuration failures at the store boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be read (unreachable, poisoned lock, …).
    #[error("policy store unavailable: {0}")]
    Unavailable(String),

    /// A non-global record rule was declared with zero linked groups.
    ///
    /// Caught at load time so the evaluator never sees such a rule.
    #[error("record rule '{0}' is not global but has no linked groups")]
    RuleWithoutGroup(String),
}

/// Read access to group definitions and principal→group assignments.
pub trait GroupDirectory {
    /// Directly-assigned groups of a principal. Unknown principals yield an
    /// empty list, not an error.
    fn assigned_groups(&self, principal: &PrincipalId) -> StoreResult<Vec<GroupId>>;

    /// Look up a group definition by id.
    fn group(&self, id: &GroupId) -> StoreResult<Option<Group>>;
}

/// Read access to model-access grants and record rules.
pub trait RuleStore {
    /// Active grants for `model` that apply to any of `groups` or to everyone
    /// (rows with no owning group).
    fn model_access_for(
        &self,
        model: &ModelName,
        groups: &BTreeSet<GroupId>,
    ) -> StoreResult<Vec<ModelAccess>>;

    /// Active record rules for `(model, op)`, split into the global tier and
    /// the group tier (rules linked to any of `groups`), the latter in
    /// ascending priority order.
    fn record_rules_for(
        &self,
        model: &ModelName,
        op: CrudOp,
        groups: &BTreeSet<GroupId>,
    ) -> StoreResult<RuleSets>;

    /// Every model any access row or record rule mentions. Feeds the
    /// permission-summary surface; not used on the check path.
    fn known_models(&self) -> StoreResult<Vec<ModelName>>;
}

/// Everything the policy service needs from its host.
pub trait PolicyStore: GroupDirectory + RuleStore {}

impl<T: GroupDirectory + RuleStore> PolicyStore for T {}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory store
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct StoreInner {
    groups: HashMap<GroupId, Group>,
    assignments: HashMap<PrincipalId, Vec<GroupId>>,
    access: Vec<ModelAccess>,
    rules: Vec<RecordRule>,
}

/// In-memory policy store.
///
/// Reads may run concurrently from many request threads; writes are the
/// loader's (rare) path.
#[derive(Debug, Default)]
pub struct MemoryPolicyStore {
    inner: RwLock<StoreInner>,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, StoreInner>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, StoreInner>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))
    }

    // ─── Loader-facing write surface ────────────────────────────────────────

    /// Insert or replace a group definition.
    pub fn upsert_group(&self, group: Group) -> StoreResult<()> {
        let mut inner = self.write()?;
        inner.groups.insert(group.id.clone(), group);
        Ok(())
    }

    /// Replace a principal's direct group assignments.
    pub fn assign_groups(
        &self,
        principal: PrincipalId,
        groups: Vec<GroupId>,
    ) -> StoreResult<()> {
        let mut inner = self.write()?;
        inner.assignments.insert(principal, groups);
        Ok(())
    }

    /// Insert or replace a model-access grant (keyed by id).
    pub fn upsert_model_access(&self, access: ModelAccess) -> StoreResult<()> {
        let mut inner = self.write()?;
        match inner.access.iter().position(|a| a.id == access.id) {
            Some(pos) => inner.access[pos] = access,
            None => inner.access.push(access),
        }
        Ok(())
    }

    /// Insert or replace a record rule (keyed by id).
    ///
    /// Rejects the misconfiguration of a non-global rule with no linked
    /// groups: such a rule could never apply to anyone.
    pub fn upsert_record_rule(&self, rule: RecordRule) -> StoreResult<()> {
        if !rule.global && rule.groups.is_empty() {
            return Err(StoreError::RuleWithoutGroup(rule.name));
        }
        let mut inner = self.write()?;
        match inner.rules.iter().position(|r| r.id == rule.id) {
            Some(pos) => inner.rules[pos] = rule,
            None => inner.rules.push(rule),
        }
        Ok(())
    }
}

impl GroupDirectory for MemoryPolicyStore {
    fn assigned_groups(&self, principal: &PrincipalId) -> StoreResult<Vec<GroupId>> {
        Ok(self
            .read()?
            .assignments
            .get(principal)
            .cloned()
            .unwrap_or_default())
    }

    fn group(&self, id: &GroupId) -> StoreResult<Option<Group>> {
        Ok(self.read()?.groups.get(id).cloned())
    }
}

impl RuleStore for MemoryPolicyStore {
    fn model_access_for(
        &self,
        model: &ModelName,
        groups: &BTreeSet<GroupId>,
    ) -> StoreResult<Vec<ModelAccess>> {
        Ok(self
            .read()?
            .access
            .iter()
            .filter(|a| a.active && &a.model == model)
            .filter(|a| match &a.group {
                None => true,
                Some(g) => groups.contains(g),
            })
            .cloned()
            .collect())
    }

    fn record_rules_for(
        &self,
        model: &ModelName,
        op: CrudOp,
        groups: &BTreeSet<GroupId>,
    ) -> StoreResult<RuleSets> {
        let inner = self.read()?;
        let mut sets = RuleSets::default();
        for rule in inner
            .rules
            .iter()
            .filter(|r| &r.model == model && r.applies_to(op))
        {
            if rule.global {
                sets.global.push(rule.clone());
            } else if rule.groups.iter().any(|g| groups.contains(g)) {
                sets.group.push(rule.clone());
            }
        }
        // Priority orders reads within the group tier only; stable on name so
        // equal priorities keep a deterministic order.
        sets.group
            .sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        Ok(sets)
    }

    fn known_models(&self) -> StoreResult<Vec<ModelName>> {
        let inner = self.read()?;
        let mut models: BTreeSet<ModelName> = BTreeSet::new();
        for access in &inner.access {
            models.insert(access.model.clone());
        }
        for rule in &inner.rules {
            models.insert(rule.model.clone());
        }
        Ok(models.into_iter().collect())
    }
}
