//! Region registry shared by the discovery and copy passes
//!
//! A region is one contiguous piece of source memory: the target of a
//! reference, the backing store of a slice, or the identity of a map. The
//! registry keeps regions ordered and non-overlapping so that every source
//! address resolves to a single destination allocation.

pub mod range;
pub mod registry;

pub use range::MemoryRange;
pub use registry::{allocate_sequence, allocate_single, AllocateFn, RegionEntry, RegionRegistry};
