//! Ordered registry of observed memory regions

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound::Excluded;

use tracing::trace;

use crate::error::{CopyError, Result};
use crate::heap::{Address, Heap};
use crate::types::{TypeId, TypeTable};

use super::range::MemoryRange;

/// Strategy that creates the destination allocation for a region
pub type AllocateFn = fn(&mut Heap, &TypeTable, &MemoryRange, TypeId) -> Result<Address>;

/// Allocate one zeroed value of the element type
pub fn allocate_single(
    heap: &mut Heap,
    types: &TypeTable,
    _range: &MemoryRange,
    element_type: TypeId,
) -> Result<Address> {
    heap.alloc_zeroed(types, element_type, 1)
}

/// Allocate a zeroed backing store covering the whole range
///
/// A view into a store may cover only part of it, so the element count comes
/// from the registered range rather than from any single view.
pub fn allocate_sequence(
    heap: &mut Heap,
    types: &TypeTable,
    range: &MemoryRange,
    element_type: TypeId,
) -> Result<Address> {
    let elem_size = types.size_of(element_type)?;
    let count = if elem_size == 0 { 0 } else { range.len() / elem_size };
    heap.alloc_zeroed(types, element_type, count)
}

/// One observed region and the state of its destination
#[derive(Clone)]
pub struct RegionEntry {
    pub range: MemoryRange,
    /// Type the allocation strategy lays out
    pub element_type: TypeId,
    /// `None` for opaque regions such as map sentinels
    pub allocate: Option<AllocateFn>,
    /// Base of the destination allocation once materialized
    pub destination: Option<Address>,
    /// Set when the copy pass starts filling the range
    pub copied: bool,
}

impl RegionEntry {
    /// Create an entry with no destination yet
    pub fn new(range: MemoryRange, element_type: TypeId, allocate: Option<AllocateFn>) -> Self {
        Self {
            range,
            element_type,
            allocate,
            destination: None,
            copied: false,
        }
    }

    /// Allocate the destination if absent and return its base
    ///
    /// The flag is true when this call performed the allocation.
    pub fn materialize(&mut self, heap: &mut Heap, types: &TypeTable) -> Result<(Address, bool)> {
        if let Some(base) = self.destination {
            return Ok((base, false));
        }
        let allocate = self.allocate.ok_or_else(|| {
            CopyError::type_mismatch("region with an allocation strategy", "opaque region")
        })?;
        let base = allocate(heap, types, &self.range, self.element_type)?;
        trace!(range = %self.range, destination = %base, "materialized region");
        self.destination = Some(base);
        Ok((base, true))
    }

    /// Destination address corresponding to `addr` inside this region
    pub fn redirect(&self, addr: Address) -> Option<Address> {
        self.destination
            .map(|base| base.add(self.range.offset_of(addr)))
    }
}

impl fmt::Debug for RegionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionEntry")
            .field("range", &self.range)
            .field("element_type", &self.element_type)
            .field("allocates", &self.allocate.is_some())
            .field("destination", &self.destination)
            .field("copied", &self.copied)
            .finish()
    }
}

/// Non-overlapping regions ordered by start address
///
/// Every address belongs to at most one entry, so each piece of source memory
/// maps to exactly one destination allocation.
#[derive(Debug, Default)]
pub struct RegionRegistry {
    entries: BTreeMap<Address, RegionEntry>,
    limit: Option<usize>,
    evicted: usize,
}

impl RegionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that refuses to hold more than `limit` entries
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Insert a range unless an existing entry already covers it
    ///
    /// Returns `Ok(false)` when an entry contains `range`. Otherwise entries
    /// nested inside `range` are evicted, the new entry is inserted and
    /// `Ok(true)` is returned. A partial overlap is an
    /// [`CopyError::OverlapViolation`] and leaves the registry untouched.
    pub fn register(
        &mut self,
        range: MemoryRange,
        element_type: TypeId,
        allocate: Option<AllocateFn>,
    ) -> Result<bool> {
        let mut subsumed = Vec::new();

        if let Some((start, prev)) = self.entries.range(..=range.start).next_back() {
            if prev.range.contains(&range) {
                trace!(range = %range, owner = %prev.range, "range already registered");
                return Ok(false);
            }
            if range.contains(&prev.range) {
                subsumed.push(*start);
            } else if prev.range.overlaps(&range) {
                return Err(CopyError::overlap(prev.range, range));
            }
        }

        if !range.is_empty() {
            let later = self.entries.range((Excluded(range.start), Excluded(range.end)));
            for (start, entry) in later {
                if !range.contains(&entry.range) {
                    return Err(CopyError::overlap(entry.range, range));
                }
                subsumed.push(*start);
            }
        }

        if let Some(limit) = self.limit {
            if self.entries.len() - subsumed.len() + 1 > limit {
                return Err(CopyError::RegionLimitExceeded { limit });
            }
        }

        for start in &subsumed {
            if let Some(evicted) = self.entries.remove(start) {
                trace!(evicted = %evicted.range, by = %range, "evicted nested region");
            }
        }
        self.evicted += subsumed.len();

        trace!(range = %range, element_type = %element_type, "registered region");
        self.entries
            .insert(range.start, RegionEntry::new(range, element_type, allocate));
        Ok(true)
    }

    /// Entry whose range contains `addr`
    pub fn lookup(&self, addr: Address) -> Option<&RegionEntry> {
        self.entries
            .range(..=addr)
            .next_back()
            .map(|(_, entry)| entry)
            .filter(|entry| entry.range.contains_address(addr))
    }

    /// Mutable entry whose range contains `addr`
    pub fn lookup_mut(&mut self, addr: Address) -> Option<&mut RegionEntry> {
        self.entries
            .range_mut(..=addr)
            .next_back()
            .map(|(_, entry)| entry)
            .filter(|entry| entry.range.contains_address(addr))
    }

    /// Number of registered regions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries replaced by larger ranges so far
    pub fn evicted_count(&self) -> usize {
        self.evicted
    }

    /// Entries in address order
    pub fn iter(&self) -> impl Iterator<Item = &RegionEntry> {
        self.entries.values()
    }
}

impl fmt::Display for RegionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "RegionRegistry ({} regions, {} evicted)", self.len(), self.evicted)?;
        for entry in self.iter() {
            write!(f, "  {} {}", entry.range, entry.element_type)?;
            if entry.allocate.is_none() {
                write!(f, " opaque")?;
            }
            match entry.destination {
                Some(base) => write!(f, " -> {}", base)?,
                None => write!(f, " -> (unallocated)")?,
            }
            if entry.copied {
                write!(f, " copied")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::AllocId;

    fn range(alloc: u32, start: usize, end: usize) -> MemoryRange {
        MemoryRange::new(Address::new(AllocId(alloc), start), Address::new(AllocId(alloc), end))
    }

    fn int_type() -> (TypeTable, TypeId) {
        let mut types = TypeTable::new();
        let int = types.int();
        (types, int)
    }

    #[test]
    fn test_register_and_reject_contained() {
        let (_, int) = int_type();
        let mut registry = RegionRegistry::new();

        assert!(registry.register(range(0, 0, 5), int, Some(allocate_sequence)).unwrap());
        assert!(!registry.register(range(0, 2, 5), int, Some(allocate_sequence)).unwrap());
        assert!(!registry.register(range(0, 0, 5), int, Some(allocate_single)).unwrap());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_larger_range_evicts_nested() {
        let (_, int) = int_type();
        let mut registry = RegionRegistry::new();

        registry.register(range(0, 2, 3), int, Some(allocate_single)).unwrap();
        registry.register(range(0, 3, 5), int, Some(allocate_sequence)).unwrap();
        registry.register(range(1, 0, 1), int, Some(allocate_single)).unwrap();
        assert_eq!(registry.len(), 3);

        assert!(registry.register(range(0, 0, 5), int, Some(allocate_sequence)).unwrap());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.evicted_count(), 2);
        assert_eq!(registry.lookup(Address::new(AllocId(0), 4)).unwrap().range, range(0, 0, 5));
    }

    #[test]
    fn test_partial_overlap_is_rejected() {
        let (_, int) = int_type();
        let mut registry = RegionRegistry::new();
        registry.register(range(0, 0, 4), int, Some(allocate_sequence)).unwrap();

        let err = registry
            .register(range(0, 2, 6), int, Some(allocate_sequence))
            .unwrap_err();
        assert!(matches!(err, CopyError::OverlapViolation { .. }));

        assert!(!registry.register(range(0, 0, 0), int, None).unwrap());
        let err = registry.register(range(0, 3, 8), int, None).unwrap_err();
        assert!(matches!(err, CopyError::OverlapViolation { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup() {
        let (_, int) = int_type();
        let mut registry = RegionRegistry::new();
        registry.register(range(0, 2, 4), int, Some(allocate_sequence)).unwrap();

        assert!(registry.lookup(Address::new(AllocId(0), 1)).is_none());
        assert!(registry.lookup(Address::new(AllocId(0), 2)).is_some());
        assert!(registry.lookup(Address::new(AllocId(0), 3)).is_some());
        assert!(registry.lookup(Address::new(AllocId(0), 4)).is_none());
        assert!(registry.lookup(Address::new(AllocId(1), 3)).is_none());
    }

    #[test]
    fn test_empty_ranges_register_once() {
        let (_, int) = int_type();
        let mut registry = RegionRegistry::new();

        assert!(registry.register(range(0, 2, 2), int, Some(allocate_single)).unwrap());
        assert!(!registry.register(range(0, 2, 2), int, Some(allocate_single)).unwrap());
        assert!(registry.lookup(Address::new(AllocId(0), 2)).is_some());

        assert!(registry.register(range(0, 0, 4), int, Some(allocate_sequence)).unwrap());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_limit() {
        let (_, int) = int_type();
        let mut registry = RegionRegistry::with_limit(Some(1));
        registry.register(range(0, 0, 1), int, Some(allocate_single)).unwrap();
        let err = registry
            .register(range(1, 0, 1), int, Some(allocate_single))
            .unwrap_err();
        assert!(matches!(err, CopyError::RegionLimitExceeded { limit: 1 }));

        // Replacing the only entry keeps the count at the limit.
        assert!(registry.register(range(0, 0, 3), int, Some(allocate_sequence)).unwrap());
    }

    #[test]
    fn test_materialize_and_redirect() {
        let (types, int) = int_type();
        let mut heap = Heap::new();
        let mut entry = RegionEntry::new(range(0, 0, 4), int, Some(allocate_sequence));

        let (base, fresh) = entry.materialize(&mut heap, &types).unwrap();
        assert!(fresh);
        assert_eq!(heap.cell_len(base.alloc).unwrap(), 4);
        let (again, fresh) = entry.materialize(&mut heap, &types).unwrap();
        assert_eq!(again, base);
        assert!(!fresh);

        assert_eq!(entry.redirect(Address::new(AllocId(0), 3)), Some(base.add(3)));

        let mut sentinel = RegionEntry::new(range(1, 0, 1), int, None);
        assert!(sentinel.materialize(&mut heap, &types).is_err());
    }

    #[test]
    fn test_display_dump() {
        let (_, int) = int_type();
        let mut registry = RegionRegistry::new();
        registry.register(range(0, 0, 2), int, Some(allocate_sequence)).unwrap();
        registry.register(range(1, 0, 1), int, None).unwrap();

        let dump = registry.to_string();
        assert!(dump.contains("2 regions"));
        assert!(dump.contains("#0+0..#0+2"));
        assert!(dump.contains("opaque"));
    }
}
