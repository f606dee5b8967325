//! Introspectable heap holding the value graphs being copied
//!
//! Allocations live in an arena and are addressed by `(allocation, offset)`
//! pairs, so a reference into the middle of an allocation is plain integer
//! arithmetic over cell offsets.

pub mod arena;
pub mod value;

pub use arena::{Allocation, Heap, HeapMark, MapObject, Storage};
pub use value::{AllocId, Address, Boxed, SliceView, Value};
