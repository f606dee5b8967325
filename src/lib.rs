//! # aliascopy - Aliasing-Preserving Deep Copy
//!
//! aliascopy duplicates an arbitrary value graph held in an introspectable
//! heap. Every reachable allocation is duplicated, yet two references that
//! shared an allocation in the source share one new allocation in the copy,
//! and views into the middle of a larger backing store keep their offsets.
//!
//! ## Features
//!
//! - **Closed value model**: scalars, references, slice views, maps, arrays,
//!   records, dynamically-typed slots and opaque foreign storage
//! - **Region registry**: ordered, non-overlapping ranges of source memory,
//!   each resolving to exactly one destination allocation
//! - **Two-pass copy**: discovery inventories regions, the copy pass allocates
//!   and re-links by offset
//! - **All-or-nothing**: a failed copy leaves the heap as it was
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────────┐   ┌──────────────────┐
//! │  Discovery   │──▶│  Region Registry  │◀──│   Copy Pass      │
//! │  (read-only) │   │  range → dest     │   │  allocate/relink │
//! └──────────────┘   └───────────────────┘   └──────────────────┘
//!        │                                            │
//!        ▼                                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Heap (arena of allocations)                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use aliascopy::{deep_copy, Heap, TypeTable, Value};
//!
//! let mut types = TypeTable::new();
//! let int = types.int();
//! let ptr = types.reference(int).unwrap();
//! let pair = types.record("Pair", &[("a", ptr), ("b", ptr)]).unwrap();
//!
//! let mut heap = Heap::new();
//! let shared = heap.alloc_value(&types, int, vec![Value::Int(42)]).unwrap();
//! let root = [Value::Ref(Some(shared)), Value::Ref(Some(shared))];
//!
//! let copy = deep_copy(&mut heap, &types, pair, &root).unwrap();
//! assert_eq!(copy[0], copy[1]);
//! assert_ne!(copy[0], root[0]);
//! ```

pub mod copier;
pub mod error;
pub mod heap;
pub mod inspect;
pub mod regions;
pub mod types;

pub use copier::{Copier, CopyConfig, CopyConfigBuilder, CopyStats};
pub use error::{CopyError, Result};
pub use heap::{AllocId, Address, Boxed, Heap, HeapMark, MapObject, SliceView, Value};
pub use inspect::{reachable_allocations, structurally_equal};
pub use regions::{MemoryRange, RegionEntry, RegionRegistry};
pub use types::{Field, ScalarKind, TypeId, TypeKind, TypeTable};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 3;
pub const VERSION_PATCH: u32 = 0;

/// Default configuration constants
pub mod defaults {
    /// Label used by copiers built from the default configuration
    pub const COPIER_NAME: &str = "deep-copy";
}

/// Deep copy `value`, a value of type `ty`, with the default configuration
///
/// The copy's allocations are made in `heap`. The returned cells form a value
/// of type `ty` sharing no allocation with `value`.
pub fn deep_copy(heap: &mut Heap, types: &TypeTable, ty: TypeId, value: &[Value]) -> Result<Vec<Value>> {
    Copier::default().copy(heap, types, ty, value)
}

/// Deep copy with an explicit configuration
pub fn deep_copy_with_config(
    heap: &mut Heap,
    types: &TypeTable,
    ty: TypeId,
    value: &[Value],
    config: &CopyConfig,
) -> Result<Vec<Value>> {
    Copier::new(config.clone())?.copy(heap, types, ty, value)
}

/// Deep copy and report what the copy did
pub fn deep_copy_with_stats(
    heap: &mut Heap,
    types: &TypeTable,
    ty: TypeId,
    value: &[Value],
) -> Result<(Vec<Value>, CopyStats)> {
    let mut copier = Copier::default();
    let output = copier.copy(heap, types, ty, value)?;
    Ok((output, copier.stats().clone()))
}
