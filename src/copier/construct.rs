//! Copy pass: build the destination graph over the discovered regions

use tracing::trace;

use crate::error::{CopyError, Result};
use crate::heap::{AllocId, Address, Boxed, Heap, SliceView, Value};
use crate::regions::RegionRegistry;
use crate::types::{TypeId, TypeKind, TypeTable};

use super::config::CopyConfig;
use super::discovery::check_len;
use super::stats::CopyStats;

/// Writes copies of source values, re-linking every reference through the
/// registry
pub(crate) struct Constructor<'a> {
    heap: &'a mut Heap,
    types: &'a TypeTable,
    registry: &'a mut RegionRegistry,
    config: &'a CopyConfig,
    stats: &'a mut CopyStats,
}

impl<'a> Constructor<'a> {
    pub(crate) fn new(
        heap: &'a mut Heap,
        types: &'a TypeTable,
        registry: &'a mut RegionRegistry,
        config: &'a CopyConfig,
        stats: &'a mut CopyStats,
    ) -> Self {
        Self {
            heap,
            types,
            registry,
            config,
            stats,
        }
    }

    /// Copy `src`, a value of type `ty`, into the zeroed shell `dst`
    pub(crate) fn copy_into(&mut self, ty: TypeId, dst: &mut [Value], src: &[Value]) -> Result<()> {
        let types = self.types;
        match types.kind(ty)? {
            TypeKind::Scalar(kind) => {
                src[0].expect_scalar(*kind)?;
                dst[0] = src[0].clone();
                self.stats.cells_copied += 1;
            }
            TypeKind::Opaque { name, .. } => {
                return Err(CopyError::introspection_denied(name.clone()));
            }
            TypeKind::Ref(_) => {
                dst[0] = Value::Ref(self.relink_reference(src[0].expect_ref()?)?);
            }
            TypeKind::Slice(elem) => {
                dst[0] = Value::Slice(self.relink_view(*elem, src[0].expect_slice()?)?);
            }
            TypeKind::Dyn => {
                dst[0] = Value::Dyn(match src[0].expect_dyn()? {
                    Some(boxed) => Some(Box::new(self.copy_boxed(boxed)?)),
                    None => None,
                });
            }
            TypeKind::Map { key, value } => {
                dst[0] = Value::Map(self.relink_map(*key, *value, src[0].expect_map()?)?);
            }
            TypeKind::Array { elem, len } => {
                let size = types.size_of(*elem)?;
                if self.config.bulk_copy_plain_arrays && !types.may_contain_references(*elem)? {
                    // Reference-free elements hold only scalars.
                    dst.clone_from_slice(src);
                    self.stats.cells_copied += len * size;
                } else {
                    self.copy_elements(*elem, size, dst, src)?;
                }
            }
            TypeKind::Record { fields, .. } => {
                for field in fields {
                    let span = field.offset..field.offset + types.size_of(field.ty)?;
                    self.copy_into(field.ty, &mut dst[span.clone()], &src[span])?;
                }
            }
        }
        Ok(())
    }

    fn copy_elements(&mut self, elem: TypeId, size: usize, dst: &mut [Value], src: &[Value]) -> Result<()> {
        if size == 0 {
            return Ok(());
        }
        for (d, s) in dst.chunks_mut(size).zip(src.chunks(size)) {
            self.copy_into(elem, d, s)?;
        }
        Ok(())
    }

    fn copy_boxed(&mut self, boxed: &Boxed) -> Result<Boxed> {
        check_len(self.types, boxed.ty, &boxed.cells)?;
        let mut cells = self.types.zero_value(boxed.ty)?;
        self.copy_into(boxed.ty, &mut cells, &boxed.cells)?;
        Ok(Boxed { ty: boxed.ty, cells })
    }

    fn relink_reference(&mut self, addr: Option<Address>) -> Result<Option<Address>> {
        match addr {
            Some(addr) => Ok(Some(self.resolve(addr)?)),
            None => Ok(None),
        }
    }

    fn relink_view(&mut self, elem: TypeId, view: Option<SliceView>) -> Result<Option<SliceView>> {
        let Some(view) = view else {
            return Ok(None);
        };
        if view.cap == 0 {
            // No backing store was discovered for an empty view.
            let base = self.heap.alloc_zeroed(self.types, elem, 0)?;
            self.stats.allocations += 1;
            return Ok(Some(SliceView::new(base, 0, 0)));
        }
        let new_base = self.resolve(view.base)?;
        Ok(Some(SliceView::new(new_base, view.len, view.cap)))
    }

    fn relink_map(&mut self, key: TypeId, value: TypeId, id: Option<AllocId>) -> Result<Option<AllocId>> {
        let Some(id) = id else {
            return Ok(None);
        };
        let identity = Address::new(id, 0);
        let entry = self
            .registry
            .lookup_mut(identity)
            .ok_or_else(|| CopyError::region_not_found(identity))?;
        self.stats.references_relinked += 1;

        if entry.copied {
            return entry
                .destination
                .map(|dest| Some(dest.alloc))
                .ok_or_else(|| CopyError::region_not_found(identity));
        }

        // Publish the destination before filling it so cyclic paths re-link.
        entry.copied = true;
        let new_id = self.heap.alloc_map(key, value);
        entry.destination = Some(Address::new(new_id, 0));
        self.stats.allocations += 1;
        trace!(source = %id, destination = %new_id, "copying map");

        let source: Vec<(Vec<Value>, Vec<Value>)> = self
            .heap
            .map(id)?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (k, v) in source {
            check_len(self.types, value, &v)?;
            let mut copied = self.types.zero_value(value)?;
            self.copy_into(value, &mut copied, &v)?;
            // Keys are carried over verbatim.
            self.heap.map_mut(new_id)?.insert(k, copied);
            self.stats.map_entries_copied += 1;
        }
        Ok(Some(new_id))
    }

    /// Destination for `addr`, filling the enclosing region on first use
    ///
    /// The whole registered range is copied whichever reference reaches it
    /// first, so regions found only through interior pointers or narrower
    /// views are still populated. `copied` is set before recursing.
    fn resolve(&mut self, addr: Address) -> Result<Address> {
        let entry = self
            .registry
            .lookup_mut(addr)
            .ok_or_else(|| CopyError::region_not_found(addr))?;
        let (base, fresh) = entry.materialize(self.heap, self.types)?;
        if fresh {
            self.stats.allocations += 1;
        }
        let new_addr = entry
            .redirect(addr)
            .ok_or_else(|| CopyError::region_not_found(addr))?;
        let pending = !entry.copied;
        entry.copied = true;
        let (range, element_type) = (entry.range, entry.element_type);
        self.stats.references_relinked += 1;

        if pending {
            self.copy_region(element_type, range.start, base, range.len())?;
        }
        Ok(new_addr)
    }

    /// Copy `len` cells of consecutive `elem` values from `src` to `dst`
    fn copy_region(&mut self, elem: TypeId, src: Address, dst: Address, len: usize) -> Result<()> {
        let source = self.heap.read(src, len)?.to_vec();
        let mut cells = self.heap.read(dst, len)?.to_vec();
        if self.config.bulk_copy_plain_arrays && !self.types.may_contain_references(elem)? {
            cells.clone_from_slice(&source);
            self.stats.cells_copied += len;
        } else {
            let size = self.types.size_of(elem)?;
            self.copy_elements(elem, size, &mut cells, &source)?;
        }
        self.heap.store(dst, &cells)
    }
}
