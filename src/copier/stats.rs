//! Copy statistics

use serde::{Deserialize, Serialize};

/// Counters collected during one deep copy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyStats {
    /// Regions newly registered by the discovery pass
    pub regions_discovered: usize,
    /// Registered regions later replaced by an enclosing range
    pub regions_evicted: usize,
    /// Destination allocations created
    pub allocations: usize,
    /// Cells written by value assignment
    pub cells_copied: usize,
    /// Non-null references, views and map handles re-linked
    pub references_relinked: usize,
    /// Map entries inserted into destination maps
    pub map_entries_copied: usize,
}

impl CopyStats {
    /// Create new statistics instance
    pub fn new() -> Self {
        Default::default()
    }

    /// Regions left in the registry after discovery
    pub fn regions_retained(&self) -> usize {
        self.regions_discovered - self.regions_evicted
    }

    /// Get a summary string of the statistics
    pub fn summary(&self) -> String {
        format!(
            "CopyStats {{ regions: {} ({} evicted), allocations: {}, cells: {}, \
             relinked: {}, map_entries: {} }}",
            self.regions_retained(),
            self.regions_evicted,
            self.allocations,
            self.cells_copied,
            self.references_relinked,
            self.map_entries_copied
        )
    }

    /// Reset all statistics
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary() {
        let stats = CopyStats {
            regions_discovered: 3,
            regions_evicted: 1,
            allocations: 2,
            cells_copied: 10,
            references_relinked: 4,
            map_entries_copied: 0,
        };
        assert_eq!(stats.regions_retained(), 2);
        let summary = stats.summary();
        assert!(summary.contains("regions: 2 (1 evicted)"));
        assert!(summary.contains("cells: 10"));
    }

    #[test]
    fn test_reset() {
        let mut stats = CopyStats {
            allocations: 5,
            ..Default::default()
        };
        stats.reset();
        assert_eq!(stats, CopyStats::new());
    }
}
