//! Type kinds and identifiers

use std::fmt;

/// Identifier of a type issued by a [`super::TypeTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    /// Position of this type in its table
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Primitive value kinds, each stored in a single cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    Int,
    Uint,
    Float,
    Str,
}

impl ScalarKind {
    /// Get a human-readable name for the scalar kind
    pub fn name(&self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int => "int",
            ScalarKind::Uint => "uint",
            ScalarKind::Float => "float",
            ScalarKind::Str => "str",
        }
    }
}

/// A named record field and its cell offset within the record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub ty: TypeId,
    pub offset: usize,
}

/// The closed set of shapes a value can take
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Plain value copied by assignment
    Scalar(ScalarKind),
    /// Nullable, possibly aliased reference to a single target
    Ref(TypeId),
    /// Window into a backing store that other views may share
    Slice(TypeId),
    /// Associative container; keys are never copied deeply
    Map { key: TypeId, value: TypeId },
    /// Fixed-size aggregate stored inline
    Array { elem: TypeId, len: usize },
    /// Struct-like composite stored inline
    Record { name: String, fields: Vec<Field> },
    /// Slot holding a value of any concrete type
    Dyn,
    /// Foreign storage whose layout cannot be read
    Opaque { name: String, size: usize },
}

impl TypeKind {
    /// Whether values of this kind are reached through indirection
    pub fn is_indirect(&self) -> bool {
        matches!(
            self,
            TypeKind::Ref(_) | TypeKind::Slice(_) | TypeKind::Map { .. } | TypeKind::Dyn
        )
    }

    /// Short label used in diagnostics
    pub fn label(&self) -> &'static str {
        match self {
            TypeKind::Scalar(kind) => kind.name(),
            TypeKind::Ref(_) => "reference",
            TypeKind::Slice(_) => "slice",
            TypeKind::Map { .. } => "map",
            TypeKind::Array { .. } => "array",
            TypeKind::Record { .. } => "record",
            TypeKind::Dyn => "dyn",
            TypeKind::Opaque { .. } => "opaque",
        }
    }
}
