//! Aliasing-preserving deep copy
//!
//! A copy runs in two passes over the same value graph. Discovery registers
//! every reachable region in a fresh [`RegionRegistry`]; the copy pass then
//! allocates one destination per region and re-links each reference, view and
//! map handle by its offset into that region. References that shared memory
//! in the source share the corresponding destination memory.

pub mod config;
pub mod stats;

mod construct;
pub(crate) mod discovery;

use tracing::{debug, debug_span, trace};

use crate::error::Result;
use crate::heap::{Heap, Value};
use crate::regions::RegionRegistry;
use crate::types::{TypeId, TypeTable};

pub use config::{CopyConfig, CopyConfigBuilder};
pub use stats::CopyStats;

use construct::Constructor;
use discovery::{check_len, Discovery};

/// Reusable deep copier
///
/// Each call to [`Copier::copy`] builds and discards its own registry, so
/// nothing carries over between copies except the configuration and the
/// statistics of the last call.
#[derive(Debug, Clone, Default)]
pub struct Copier {
    config: CopyConfig,
    stats: CopyStats,
}

impl Copier {
    /// Create a copier with a validated configuration
    pub fn new(config: CopyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            stats: CopyStats::new(),
        })
    }

    pub fn config(&self) -> &CopyConfig {
        &self.config
    }

    /// Statistics of the most recent copy
    pub fn stats(&self) -> &CopyStats {
        &self.stats
    }

    /// Deep copy `value`, a value of type `ty`, allocating the copy in `heap`
    ///
    /// On error every allocation made by this call is discarded and the heap
    /// is left as it was.
    pub fn copy(&mut self, heap: &mut Heap, types: &TypeTable, ty: TypeId, value: &[Value]) -> Result<Vec<Value>> {
        check_len(types, ty, value)?;
        self.stats.reset();

        let span = debug_span!("deep_copy", copier = %self.config.name, ty = %types.name(ty));
        let _enter = span.enter();

        let mark = heap.mark();
        match self.run(heap, types, ty, value) {
            Ok(output) => {
                debug!(stats = %self.stats.summary(), "deep copy complete");
                Ok(output)
            }
            Err(err) => {
                heap.rollback(mark);
                debug!(error = %err, "deep copy failed");
                Err(err)
            }
        }
    }

    fn run(&mut self, heap: &mut Heap, types: &TypeTable, ty: TypeId, value: &[Value]) -> Result<Vec<Value>> {
        let mut registry = RegionRegistry::with_limit(self.config.max_regions);

        Discovery::new(heap, types, &mut registry, &mut self.stats).visit(ty, value)?;
        self.stats.regions_evicted = registry.evicted_count();
        trace!(regions = registry.len(), "discovery complete\n{}", registry);

        let mut output = types.zero_value(ty)?;
        Constructor::new(heap, types, &mut registry, &self.config, &mut self.stats)
            .copy_into(ty, &mut output, value)?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CopyError;

    #[test]
    fn test_copier_rejects_invalid_config() {
        assert!(Copier::new(CopyConfig::new("")).is_err());
        assert!(Copier::new(CopyConfig::default()).is_ok());
    }

    #[test]
    fn test_root_length_checked() {
        let mut types = TypeTable::new();
        let int = types.int();
        let mut heap = Heap::new();
        let mut copier = Copier::default();

        let err = copier
            .copy(&mut heap, &types, int, &[Value::Int(1), Value::Int(2)])
            .unwrap_err();
        assert!(matches!(err, CopyError::TypeMismatch { .. }));
    }

    #[test]
    fn test_stats_track_last_copy() {
        let mut types = TypeTable::new();
        let int = types.int();
        let ptr = types.reference(int).unwrap();
        let pair = types.record("Pair", &[("a", ptr), ("b", ptr)]).unwrap();
        let mut heap = Heap::new();
        let target = heap.alloc_value(&types, int, vec![Value::Int(42)]).unwrap();

        let mut copier = Copier::default();
        let root = [Value::Ref(Some(target)), Value::Ref(Some(target))];
        copier.copy(&mut heap, &types, pair, &root).unwrap();

        let stats = copier.stats();
        assert_eq!(stats.regions_discovered, 1);
        assert_eq!(stats.allocations, 1);
        assert_eq!(stats.references_relinked, 2);
        assert_eq!(stats.cells_copied, 1);

        copier.copy(&mut heap, &types, int, &[Value::Int(7)]).unwrap();
        assert_eq!(copier.stats().allocations, 0);
        assert_eq!(copier.stats().cells_copied, 1);
    }

    #[test]
    fn test_failed_copy_rolls_back_heap() {
        let mut types = TypeTable::new();
        let int = types.int();
        let handle = types.opaque("Handle", 2);
        let ptr = types.reference(int).unwrap();
        let holder = types.record("Holder", &[("value", ptr), ("handle", handle)]).unwrap();
        let mut heap = Heap::new();
        let target = heap.alloc_value(&types, int, vec![Value::Int(1)]).unwrap();
        let before = heap.allocation_count();

        let root = [Value::Ref(Some(target)), Value::Raw(1), Value::Raw(2)];
        let err = Copier::default().copy(&mut heap, &types, holder, &root).unwrap_err();
        assert!(matches!(err, CopyError::IntrospectionDenied { .. }));
        assert_eq!(heap.allocation_count(), before);
    }
}
