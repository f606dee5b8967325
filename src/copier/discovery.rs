//! Discovery pass: inventory every region a value reaches

use crate::error::{CopyError, Result};
use crate::heap::{Address, Heap, Value};
use crate::regions::{allocate_sequence, allocate_single, MemoryRange, RegionRegistry};
use crate::types::{TypeId, TypeKind, TypeTable};

use super::stats::CopyStats;

/// Walks a value graph and registers its regions without allocating
pub(crate) struct Discovery<'a> {
    heap: &'a Heap,
    types: &'a TypeTable,
    registry: &'a mut RegionRegistry,
    stats: &'a mut CopyStats,
}

impl<'a> Discovery<'a> {
    pub(crate) fn new(
        heap: &'a Heap,
        types: &'a TypeTable,
        registry: &'a mut RegionRegistry,
        stats: &'a mut CopyStats,
    ) -> Self {
        Self {
            heap,
            types,
            registry,
            stats,
        }
    }

    /// Register every region reachable from `cells`, a value of type `ty`
    pub(crate) fn visit(&mut self, ty: TypeId, cells: &[Value]) -> Result<()> {
        let types = self.types;
        match types.kind(ty)? {
            TypeKind::Scalar(kind) => cells[0].expect_scalar(*kind),
            TypeKind::Opaque { name, .. } => Err(CopyError::introspection_denied(name.clone())),
            TypeKind::Ref(target) => match cells[0].expect_ref()? {
                Some(addr) => self.visit_reference(*target, addr),
                None => Ok(()),
            },
            TypeKind::Slice(elem) => match cells[0].expect_slice()? {
                Some(view) if view.cap > 0 => self.visit_backing_store(*elem, view.base, view.cap),
                _ => Ok(()),
            },
            TypeKind::Dyn => match cells[0].expect_dyn()? {
                Some(boxed) => {
                    check_len(types, boxed.ty, &boxed.cells)?;
                    self.visit(boxed.ty, &boxed.cells)
                }
                None => Ok(()),
            },
            TypeKind::Map { value, .. } => match cells[0].expect_map()? {
                Some(id) => self.visit_map(ty, *value, Address::new(id, 0)),
                None => Ok(()),
            },
            TypeKind::Array { elem, len } => {
                let size = types.size_of(*elem)?;
                for i in 0..*len {
                    self.visit(*elem, &cells[i * size..(i + 1) * size])?;
                }
                Ok(())
            }
            TypeKind::Record { fields, .. } => {
                if !types.may_contain_references(ty)? {
                    return Ok(());
                }
                for field in fields {
                    let size = types.size_of(field.ty)?;
                    self.visit(field.ty, &cells[field.offset..field.offset + size])?;
                }
                Ok(())
            }
        }
    }

    fn visit_reference(&mut self, target: TypeId, addr: Address) -> Result<()> {
        let heap = self.heap;
        let size = self.types.size_of(target)?;
        let contents = heap.read(addr, size)?;
        let range = MemoryRange::of_len(addr, size);

        if self.registry.register(range, target, Some(allocate_single))? {
            self.stats.regions_discovered += 1;
            if self.types.may_contain_references(target)? {
                self.visit(target, contents)?;
            }
        }
        Ok(())
    }

    fn visit_backing_store(&mut self, elem: TypeId, base: Address, cap: usize) -> Result<()> {
        let heap = self.heap;
        let size = self.types.size_of(elem)?;
        // The store runs from the view's base through its capacity.
        let len = cap
            .checked_mul(size)
            .ok_or_else(|| CopyError::invalid_address(base, format!("capacity {} overflows", cap)))?;
        let contents = heap.read(base, len)?;
        let range = MemoryRange::of_len(base, len);

        if self.registry.register(range, elem, Some(allocate_sequence))? {
            self.stats.regions_discovered += 1;
            if self.types.may_contain_references(elem)? {
                for i in 0..cap {
                    self.visit(elem, &contents[i * size..(i + 1) * size])?;
                }
            }
        }
        Ok(())
    }

    fn visit_map(&mut self, map_ty: TypeId, value_ty: TypeId, identity: Address) -> Result<()> {
        let heap = self.heap;
        let map = heap.map(identity.alloc)?;
        let sentinel = MemoryRange::of_len(identity, 1);

        if self.registry.register(sentinel, map_ty, None)? {
            self.stats.regions_discovered += 1;
            if self.types.may_contain_references(value_ty)? {
                for value in map.values() {
                    check_len(self.types, value_ty, value)?;
                    self.visit(value_ty, value)?;
                }
            }
        }
        Ok(())
    }
}

/// Check that `cells` is exactly one value of type `ty`
pub(crate) fn check_len(types: &TypeTable, ty: TypeId, cells: &[Value]) -> Result<()> {
    let size = types.size_of(ty)?;
    if cells.len() != size {
        return Err(CopyError::type_mismatch(
            format!("{} cells for {}", size, types.name(ty)),
            format!("{} cells", cells.len()),
        ));
    }
    Ok(())
}
