//! Structural comparison and reachability over value graphs

use std::collections::{BTreeSet, HashSet};

use crate::copier::discovery::{check_len, Discovery};
use crate::copier::CopyStats;
use crate::error::Result;
use crate::heap::{AllocId, Address, Heap, Value};
use crate::regions::RegionRegistry;
use crate::types::{TypeId, TypeKind, TypeTable};

/// Compare two values of type `ty` structurally
///
/// References and slice windows are compared by the data they denote, map
/// values deeply and map keys by cell equality. A nil reference, view or map
/// differs from a non-nil one. Pairs of addresses already under comparison are
/// assumed equal, so cyclic graphs terminate.
pub fn structurally_equal(heap: &Heap, types: &TypeTable, ty: TypeId, a: &[Value], b: &[Value]) -> Result<bool> {
    check_len(types, ty, a)?;
    check_len(types, ty, b)?;
    Comparison {
        heap,
        types,
        visited: HashSet::new(),
    }
    .equal(ty, a, b)
}

/// Allocations reachable from a value of type `ty`
///
/// Empty slice views reach no allocation.
pub fn reachable_allocations(heap: &Heap, types: &TypeTable, ty: TypeId, value: &[Value]) -> Result<BTreeSet<AllocId>> {
    check_len(types, ty, value)?;
    let mut registry = RegionRegistry::new();
    let mut stats = CopyStats::new();
    Discovery::new(heap, types, &mut registry, &mut stats).visit(ty, value)?;
    Ok(registry.iter().map(|entry| entry.range.alloc()).collect())
}

struct Comparison<'a> {
    heap: &'a Heap,
    types: &'a TypeTable,
    /// Address pairs under comparison, with the number of elements compared
    visited: HashSet<(Address, Address, usize, TypeId)>,
}

impl<'a> Comparison<'a> {
    fn equal(&mut self, ty: TypeId, a: &[Value], b: &[Value]) -> Result<bool> {
        let types = self.types;
        match types.kind(ty)? {
            TypeKind::Scalar(_) | TypeKind::Opaque { .. } => Ok(a == b),
            TypeKind::Ref(target) => match (a[0].expect_ref()?, b[0].expect_ref()?) {
                (None, None) => Ok(true),
                (Some(x), Some(y)) => {
                    if x == y || !self.visited.insert((x, y, 1, ty)) {
                        return Ok(true);
                    }
                    let size = types.size_of(*target)?;
                    let heap = self.heap;
                    self.equal(*target, heap.read(x, size)?, heap.read(y, size)?)
                }
                _ => Ok(false),
            },
            TypeKind::Slice(elem) => match (a[0].expect_slice()?, b[0].expect_slice()?) {
                (None, None) => Ok(true),
                (Some(x), Some(y)) => {
                    if x.len != y.len {
                        return Ok(false);
                    }
                    if x.base == y.base || x.len == 0 || !self.visited.insert((x.base, y.base, x.len, ty)) {
                        return Ok(true);
                    }
                    let size = types.size_of(*elem)?;
                    let heap = self.heap;
                    self.equal_elements(*elem, size, heap.view_cells(&x, size)?, heap.view_cells(&y, size)?)
                }
                _ => Ok(false),
            },
            TypeKind::Map { value, .. } => match (a[0].expect_map()?, b[0].expect_map()?) {
                (None, None) => Ok(true),
                (Some(x), Some(y)) => {
                    let (xa, ya) = (Address::new(x, 0), Address::new(y, 0));
                    if x == y || !self.visited.insert((xa, ya, 1, ty)) {
                        return Ok(true);
                    }
                    let heap = self.heap;
                    let (left, right) = (heap.map(x)?, heap.map(y)?);
                    if left.len() != right.len() {
                        return Ok(false);
                    }
                    for (key, lv) in left.iter() {
                        let Some(rv) = right.get(key) else {
                            return Ok(false);
                        };
                        if !self.equal(*value, lv, rv)? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                _ => Ok(false),
            },
            TypeKind::Dyn => match (a[0].expect_dyn()?, b[0].expect_dyn()?) {
                (None, None) => Ok(true),
                (Some(x), Some(y)) => {
                    if x.ty != y.ty {
                        return Ok(false);
                    }
                    check_len(types, x.ty, &x.cells)?;
                    check_len(types, y.ty, &y.cells)?;
                    self.equal(x.ty, &x.cells, &y.cells)
                }
                _ => Ok(false),
            },
            TypeKind::Array { elem, .. } => {
                let size = types.size_of(*elem)?;
                self.equal_elements(*elem, size, a, b)
            }
            TypeKind::Record { fields, .. } => {
                for field in fields {
                    let span = field.offset..field.offset + types.size_of(field.ty)?;
                    if !self.equal(field.ty, &a[span.clone()], &b[span])? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    fn equal_elements(&mut self, elem: TypeId, size: usize, a: &[Value], b: &[Value]) -> Result<bool> {
        if size == 0 {
            return Ok(true);
        }
        for (x, y) in a.chunks(size).zip(b.chunks(size)) {
            if !self.equal(elem, x, y)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
