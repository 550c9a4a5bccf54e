//! Group identifiers.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Permission-group identifier.
///
/// Group ids are dotted-namespaced strings (e.g. `base.group_system`): the
/// segment before the first `.` names the owning module, the remainder names
/// the group. They are modeled as opaque strings so the engine can reference
/// groups declared by modules it has never seen a type for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(Cow<'static, str>);

impl GroupId {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Parse and validate a dotted-namespaced group id.
    pub fn parse(name: impl Into<Cow<'static, str>>) -> DomainResult<Self> {
        let name = name.into();
        let well_formed = matches!(
            name.split_once('.'),
            Some((module, group)) if !module.is_empty() && !group.is_empty()
        );
        if well_formed {
            Ok(Self(name))
        } else {
            Err(DomainError::invalid_id(format!(
                "GroupId: expected `module.group`, got '{name}'"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The owning module's namespace prefix, if the id is dotted.
    pub fn module(&self) -> Option<&str> {
        self.0.split_once('.').map(|(module, _)| module)
    }
}

impl core::fmt::Display for GroupId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
