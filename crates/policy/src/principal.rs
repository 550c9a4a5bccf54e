//! Principals and evaluation contexts.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use ledgersuite_core::PrincipalId;

/// A materialized record, as a field→value map.
///
/// Record-rule evaluation never touches storage: the caller hands the engine
/// an already-loaded row in this shape.
pub type Record = Map<String, Value>;

/// A fully resolved principal for authorization decisions.
///
/// Construction is the external auth layer's job: the engine never
/// authenticates, it only reads what the session supplies. Group assignments
/// are *not* carried here; they are read through the
/// [`GroupDirectory`](crate::store::GroupDirectory) so that reassignments
/// take effect without reissuing sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    /// Explicit super-admin flag (one of several bypass signals).
    #[serde(default)]
    pub super_admin: bool,
    /// Explicit platform-admin flag (hosting-level operator).
    #[serde(default)]
    pub platform_admin: bool,
    /// Role markers from the session (e.g. the distinguished `owner` role).
    #[serde(default)]
    pub roles: Vec<String>,
    /// Scalar/array attributes referenced by `user.<attribute>` substitutions
    /// (tenant/company ids and the like).
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl Principal {
    pub fn new(id: PrincipalId) -> Self {
        Self {
            id,
            super_admin: false,
            platform_admin: false,
            roles: Vec::new(),
            attributes: Map::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Transient substitution context for a single evaluation call.
///
/// Built fresh per call and never cached across principals.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    attrs: Map<String, Value>,
}

impl EvaluationContext {
    /// Build the context for a principal.
    ///
    /// The principal's attribute map is taken as-is; `id` is defaulted to the
    /// principal's UUID string unless the host supplied its own `id` attribute
    /// (some hosts use numeric user ids in record fields).
    pub fn for_principal(principal: &Principal) -> Self {
        let mut attrs = principal.attributes.clone();
        attrs
            .entry("id".to_string())
            .or_insert_with(|| Value::String(principal.id.to_string()));
        Self { attrs }
    }

    /// Look up a `user.<name>` attribute.
    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_defaults_id_to_principal_uuid() {
        let principal = Principal::new(PrincipalId::new());
        let ctx = EvaluationContext::for_principal(&principal);
        assert_eq!(
            ctx.attr("id"),
            Some(&Value::String(principal.id.to_string()))
        );
    }

    #[test]
    fn context_keeps_host_supplied_id() {
        let principal = Principal::new(PrincipalId::new()).with_attribute("id", 42);
        let ctx = EvaluationContext::for_principal(&principal);
        assert_eq!(ctx.attr("id"), Some(&Value::from(42)));
    }
}
