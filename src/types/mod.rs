//! Type descriptions for introspectable value graphs
//!
//! Every value in a [`crate::heap::Heap`] is described by a [`TypeId`] issued
//! by a [`TypeTable`]. The table fixes each type's flat layout in cells and
//! whether the type may contain references, which is what lets both copy
//! passes skip reference-free data.

pub mod kind;
pub mod table;

pub use kind::{Field, ScalarKind, TypeId, TypeKind};
pub use table::TypeTable;
