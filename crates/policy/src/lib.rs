//! `ledgersuite-policy` — authorization & record-rule policy engine.
//!
//! This crate decides, for a given principal, model, and operation, which
//! coarse-grained CRUD permissions apply and which subset of rows the
//! principal may see or touch. It is intentionally decoupled from HTTP,
//! persistence, and authentication: the host supplies an authenticated
//! [`Principal`], a [`store::PolicyStore`] populated by its rule loader, and a
//! [`query::QueryBuilder`] for its storage engine.

pub mod domain;
pub mod error;
pub mod groups;
pub mod principal;
pub mod query;
pub mod rules;
pub mod service;
pub mod store;

pub use domain::Domain;
pub use error::{PolicyError, PolicyResult};
pub use groups::resolve_effective_groups;
pub use principal::{EvaluationContext, Principal, Record};
pub use query::{CmpOp, Filter, FilterQuery, QueryBuilder};
pub use rules::{Group, ModelAccess, RecordRule, RuleSets};
pub use service::{PolicyService, UserPermissions, OWNER_ROLE, SYSTEM_ADMIN_GROUP};
pub use store::{GroupDirectory, MemoryPolicyStore, PolicyStore, RuleStore, StoreError, StoreResult};
