//! Half-open cell ranges

use std::fmt;

use crate::heap::{AllocId, Address};

/// Half-open interval `[start, end)` of cells inside one allocation
///
/// Two ranges are disjoint, equal, nested, or partially overlapping; only the
/// last is illegal for a registry. An empty range (the target of a reference
/// to a zero-sized type) sits at a single address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryRange {
    pub start: Address,
    pub end: Address,
}

impl MemoryRange {
    /// Create a range
    pub fn new(start: Address, end: Address) -> Self {
        debug_assert_eq!(start.alloc, end.alloc, "range spans allocations");
        debug_assert!(start.offset <= end.offset, "range ends before it starts");
        Self { start, end }
    }

    /// Range of `len` cells starting at `start`
    pub fn of_len(start: Address, len: usize) -> Self {
        Self {
            start,
            end: start.add(len),
        }
    }

    /// Allocation holding the range
    pub fn alloc(&self) -> AllocId {
        self.start.alloc
    }

    /// Number of cells covered
    pub fn len(&self) -> usize {
        self.end.offset - self.start.offset
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `addr` belongs to this range
    pub fn contains_address(&self, addr: Address) -> bool {
        if addr.alloc != self.alloc() {
            return false;
        }
        if self.is_empty() {
            return addr == self.start;
        }
        self.start.offset <= addr.offset && addr.offset < self.end.offset
    }

    /// Whether `other` lies entirely within this range (equal ranges included)
    pub fn contains(&self, other: &MemoryRange) -> bool {
        if other.is_empty() {
            return self.contains_address(other.start);
        }
        other.alloc() == self.alloc()
            && self.start.offset <= other.start.offset
            && other.end.offset <= self.end.offset
    }

    /// Whether the two ranges share at least one address
    pub fn overlaps(&self, other: &MemoryRange) -> bool {
        if self.is_empty() {
            return other.contains_address(self.start);
        }
        if other.is_empty() {
            return self.contains_address(other.start);
        }
        other.alloc() == self.alloc()
            && self.start.offset < other.end.offset
            && other.start.offset < self.end.offset
    }

    /// Offset of `addr` from the start of the range
    pub fn offset_of(&self, addr: Address) -> usize {
        addr.offset - self.start.offset
    }
}

impl fmt::Display for MemoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(alloc: u32, start: usize, end: usize) -> MemoryRange {
        MemoryRange::new(Address::new(AllocId(alloc), start), Address::new(AllocId(alloc), end))
    }

    #[test]
    fn test_nesting() {
        let outer = range(0, 0, 5);
        assert!(outer.contains(&range(0, 2, 5)));
        assert!(outer.contains(&outer));
        assert!(!range(0, 2, 5).contains(&outer));
        assert!(!outer.contains(&range(1, 0, 5)));
    }

    #[test]
    fn test_overlap() {
        assert!(range(0, 0, 4).overlaps(&range(0, 2, 6)));
        assert!(!range(0, 0, 2).overlaps(&range(0, 2, 4)));
        assert!(!range(0, 0, 4).overlaps(&range(1, 0, 4)));
    }

    #[test]
    fn test_empty_ranges() {
        let empty = range(0, 2, 2);
        assert!(range(0, 0, 4).contains(&empty));
        assert!(!range(0, 0, 2).contains(&empty));
        assert!(empty.contains(&empty));
        assert!(empty.contains_address(Address::new(AllocId(0), 2)));
        assert!(!range(0, 0, 2).overlaps(&empty));
    }

    #[test]
    fn test_display() {
        assert_eq!(range(3, 1, 4).to_string(), "#3+1..#3+4");
        assert_eq!(range(3, 1, 4).offset_of(Address::new(AllocId(3), 3)), 2);
    }
}
