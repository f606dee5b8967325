//! Cells, addresses and views

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{CopyError, Result};
use crate::types::{ScalarKind, TypeId};

/// Identifier of one allocation in a heap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AllocId(pub(crate) u32);

impl AllocId {
    /// Position of this allocation in its heap
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AllocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A cell position: allocation plus logical offset in cells
///
/// Addresses order by allocation first, so ranges in different allocations
/// never interleave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    pub alloc: AllocId,
    pub offset: usize,
}

impl Address {
    /// Create an address
    pub fn new(alloc: AllocId, offset: usize) -> Self {
        Self { alloc, offset }
    }

    /// Address `cells` further into the same allocation
    pub fn add(self, cells: usize) -> Self {
        Self {
            alloc: self.alloc,
            offset: self.offset + cells,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.alloc, self.offset)
    }
}

/// A window into a backing store
///
/// `len` and `cap` count elements; `base` addresses the first element of the
/// window. The backing store may extend before `base` and is shared with any
/// other view over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SliceView {
    pub base: Address,
    pub len: usize,
    pub cap: usize,
}

impl SliceView {
    /// Create a view
    pub fn new(base: Address, len: usize, cap: usize) -> Self {
        Self { base, len, cap }
    }

    /// Re-slice as `view[lo..hi]`, keeping the rest of the capacity
    ///
    /// Returns `None` when the bounds fall outside the capacity.
    pub fn reslice(&self, lo: usize, hi: usize, elem_size: usize) -> Option<SliceView> {
        if lo > hi || hi > self.cap {
            return None;
        }
        Some(SliceView {
            base: self.base.add(lo.checked_mul(elem_size)?),
            len: hi - lo,
            cap: self.cap - lo,
        })
    }

    /// Address of element `index`
    pub fn element(&self, index: usize, elem_size: usize) -> Address {
        self.base.add(index * elem_size)
    }
}

/// Contents of a dynamically-typed slot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Boxed {
    pub ty: TypeId,
    pub cells: Vec<Value>,
}

/// One cell of storage
///
/// Scalars, reference slots, slice headers, map handles and dyn slots each
/// fill one cell; arrays and records span several consecutive cells.
#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(Arc<str>),
    Ref(Option<Address>),
    Slice(Option<SliceView>),
    Map(Option<AllocId>),
    Dyn(Option<Box<Boxed>>),
    /// Uninterpreted word of opaque storage
    Raw(u64),
}

impl Value {
    /// Create a string cell
    pub fn str(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }

    /// Create a dyn slot holding `cells` of type `ty`
    pub fn boxed(ty: TypeId, cells: Vec<Value>) -> Self {
        Value::Dyn(Some(Box::new(Boxed { ty, cells })))
    }

    /// Zero value of a scalar kind
    pub fn zero_scalar(kind: ScalarKind) -> Self {
        match kind {
            ScalarKind::Bool => Value::Bool(false),
            ScalarKind::Int => Value::Int(0),
            ScalarKind::Uint => Value::Uint(0),
            ScalarKind::Float => Value::Float(0.0),
            ScalarKind::Str => Value::str(""),
        }
    }

    /// Short label of the cell's variant
    pub fn label(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Ref(_) => "reference",
            Value::Slice(_) => "slice",
            Value::Map(_) => "map",
            Value::Dyn(_) => "dyn",
            Value::Raw(_) => "raw",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Target of a non-null reference cell
    pub fn as_address(&self) -> Option<Address> {
        match self {
            Value::Ref(target) => *target,
            _ => None,
        }
    }

    /// View of a non-null slice cell
    pub fn as_view(&self) -> Option<SliceView> {
        match self {
            Value::Slice(view) => *view,
            _ => None,
        }
    }

    /// Handle of a non-null map cell
    pub fn as_map(&self) -> Option<AllocId> {
        match self {
            Value::Map(id) => *id,
            _ => None,
        }
    }

    pub(crate) fn expect_ref(&self) -> Result<Option<Address>> {
        match self {
            Value::Ref(target) => Ok(*target),
            other => Err(CopyError::type_mismatch("reference", other.label())),
        }
    }

    pub(crate) fn expect_slice(&self) -> Result<Option<SliceView>> {
        match self {
            Value::Slice(view) => Ok(*view),
            other => Err(CopyError::type_mismatch("slice", other.label())),
        }
    }

    pub(crate) fn expect_map(&self) -> Result<Option<AllocId>> {
        match self {
            Value::Map(id) => Ok(*id),
            other => Err(CopyError::type_mismatch("map", other.label())),
        }
    }

    pub(crate) fn expect_dyn(&self) -> Result<Option<&Boxed>> {
        match self {
            Value::Dyn(slot) => Ok(slot.as_deref()),
            other => Err(CopyError::type_mismatch("dyn", other.label())),
        }
    }

    pub(crate) fn expect_scalar(&self, kind: ScalarKind) -> Result<()> {
        let matches = matches!(
            (kind, self),
            (ScalarKind::Bool, Value::Bool(_))
                | (ScalarKind::Int, Value::Int(_))
                | (ScalarKind::Uint, Value::Uint(_))
                | (ScalarKind::Float, Value::Float(_))
                | (ScalarKind::Str, Value::Str(_))
        );
        if matches {
            Ok(())
        } else {
            Err(CopyError::type_mismatch(kind.name(), self.label()))
        }
    }
}

// Floats compare by bit pattern so cells can serve as map keys.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Uint(a), Value::Uint(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Ref(a), Value::Ref(b)) => a == b,
            (Value::Slice(a), Value::Slice(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Dyn(a), Value::Dyn(b)) => a == b,
            (Value::Raw(a), Value::Raw(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Bool(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Uint(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Str(v) => v.hash(state),
            Value::Ref(v) => v.hash(state),
            Value::Slice(v) => v.hash(state),
            Value::Map(v) => v.hash(state),
            Value::Dyn(v) => v.hash(state),
            Value::Raw(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Uint(v) => write!(f, "{}u", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "{:?}", v),
            Value::Ref(None) | Value::Slice(None) | Value::Map(None) | Value::Dyn(None) => {
                write!(f, "nil")
            }
            Value::Ref(Some(addr)) => write!(f, "&{}", addr),
            Value::Slice(Some(view)) => write!(f, "{}[len={} cap={}]", view.base, view.len, view.cap),
            Value::Map(Some(id)) => write!(f, "map{}", id),
            Value::Dyn(Some(boxed)) => write!(f, "any({} cells of {})", boxed.cells.len(), boxed.ty),
            Value::Raw(v) => write!(f, "raw({:#x})", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_float_cells_hash_by_bits() {
        let mut set = HashSet::new();
        set.insert(Value::Float(f64::NAN));
        assert!(set.contains(&Value::Float(f64::NAN)));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
    }

    #[test]
    fn test_reslice() {
        let base = Address::new(AllocId(0), 0);
        let full = SliceView::new(base, 5, 5);
        let right = full.reslice(2, 5, 1).unwrap();
        assert_eq!(right.base, Address::new(AllocId(0), 2));
        assert_eq!(right.len, 3);
        assert_eq!(right.cap, 3);

        let wide = SliceView::new(base, 2, 4).reslice(1, 3, 2).unwrap();
        assert_eq!(wide.base.offset, 2);
        assert_eq!(wide.cap, 3);

        assert!(full.reslice(3, 2, 1).is_none());
        assert!(full.reslice(0, 6, 1).is_none());
    }

    #[test]
    fn test_expect_helpers() {
        assert_eq!(Value::Ref(None).expect_ref().unwrap(), None);
        assert!(Value::Int(3).expect_ref().is_err());
        assert!(Value::Int(3).expect_scalar(ScalarKind::Int).is_ok());
        assert!(Value::Int(3).expect_scalar(ScalarKind::Str).is_err());
    }
}
