//! Model identification and CRUD permission primitives.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Name of a target model (e.g. `invoicing.invoice`).
///
/// Models are identified by opaque string keys, not a closed type: the engine
/// must authorize models contributed by plugins/modules it has no compile-time
/// knowledge of.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelName(Cow<'static, str>);

impl ModelName {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ModelName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A coarse-grained CRUD operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrudOp {
    Read,
    Write,
    Create,
    Delete,
}

impl CrudOp {
    /// All operations, in the order they appear in access rows.
    pub const ALL: [CrudOp; 4] = [CrudOp::Read, CrudOp::Write, CrudOp::Create, CrudOp::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            CrudOp::Read => "read",
            CrudOp::Write => "write",
            CrudOp::Create => "create",
            CrudOp::Delete => "delete",
        }
    }
}

impl core::fmt::Display for CrudOp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-operation boolean grants carried by access rows and record rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CrudFlags {
    pub read: bool,
    pub write: bool,
    pub create: bool,
    pub delete: bool,
}

impl CrudFlags {
    pub const NONE: CrudFlags = CrudFlags {
        read: false,
        write: false,
        create: false,
        delete: false,
    };

    pub const ALL: CrudFlags = CrudFlags {
        read: true,
        write: true,
        create: true,
        delete: true,
    };

    pub fn read_only() -> Self {
        Self {
            read: true,
            ..Self::NONE
        }
    }

    pub fn allows(&self, op: CrudOp) -> bool {
        match op {
            CrudOp::Read => self.read,
            CrudOp::Write => self.write,
            CrudOp::Create => self.create,
            CrudOp::Delete => self.delete,
        }
    }

    pub fn with(mut self, op: CrudOp) -> Self {
        match op {
            CrudOp::Read => self.read = true,
            CrudOp::Write => self.write = true,
            CrudOp::Create => self.create = true,
            CrudOp::Delete => self.delete = true,
        }
        self
    }

    /// Union with another flag set (grants are purely additive).
    pub fn union(self, other: CrudFlags) -> Self {
        Self {
            read: self.read || other.read,
            write: self.write || other.write,
            create: self.create || other.create,
            delete: self.delete || other.delete,
        }
    }
}
