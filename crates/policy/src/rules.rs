//! Persistent entity views read by the engine.
//!
//! All of these rows are owned by the external rule-loading subsystem; the
//! engine holds read-through views only.

use serde::{Deserialize, Serialize};

use ledgersuite_core::{AccessId, CrudFlags, CrudOp, GroupId, ModelName, RuleId};

/// A permission group.
///
/// # Invariants
/// - Implication is transitive; the closure over `implied` must terminate even
///   when the graph contains cycles (the resolver walks with a seen-set).
/// - Inactive groups grant nothing, directly or by implication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    /// Owning module/category, provenance only.
    pub category: Option<String>,
    pub active: bool,
    /// Groups automatically granted by holding this one.
    pub implied: Vec<GroupId>,
}

impl Group {
    pub fn new(id: GroupId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            category: None,
            active: true,
            implied: Vec::new(),
        }
    }

    pub fn implying(mut self, group: GroupId) -> Self {
        self.implied.push(group);
        self
    }
}

/// Coarse per-model CRUD grant.
///
/// Multiple rows may coexist for the same `(model, group)`; the effective
/// permission for an operation is true if **any** active applicable row grants
/// it. There is no explicit deny.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelAccess {
    pub id: AccessId,
    pub model: ModelName,
    /// `None` means the grant applies to all principals (a "global" ACL).
    pub group: Option<GroupId>,
    pub perms: CrudFlags,
    pub active: bool,
    /// Owning module, provenance only.
    pub module: String,
}

impl ModelAccess {
    pub fn grants(&self, op: CrudOp) -> bool {
        self.active && self.perms.allows(op)
    }
}

/// Row-level record rule.
///
/// # Invariants
/// - `global` rules ignore group membership and combine with AND against all
///   other global rules.
/// - Non-global rules must be linked to one or more groups (enforced at load
///   time) and combine with OR against sibling group rules.
/// - `priority` orders rules within the group bucket (ascending); it does not
///   short-circuit evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRule {
    pub id: RuleId,
    pub name: String,
    pub model: ModelName,
    /// Portable domain expression: JSON-encoded structured list or a small
    /// pattern-language string. See [`crate::domain::Domain`].
    pub domain: String,
    pub global: bool,
    /// Which CRUD operations the rule restricts.
    pub ops: CrudFlags,
    pub priority: i32,
    /// Linked groups; empty iff `global`.
    pub groups: Vec<GroupId>,
    /// Owning module, provenance only.
    pub module: String,
    pub active: bool,
}

impl RecordRule {
    pub fn applies_to(&self, op: CrudOp) -> bool {
        self.active && self.ops.allows(op)
    }
}

/// Record rules applicable to one `(model, operation, group-set)` query,
/// split into the two combination tiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSets {
    /// AND tier: every rule restricts unconditionally.
    pub global: Vec<RecordRule>,
    /// OR tier: qualifying via any one rule suffices. Ascending priority.
    pub group: Vec<RecordRule>,
}

impl RuleSets {
    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.group.is_empty()
    }
}
