//! Error types and handling for aliascopy

use crate::heap::Address;
use crate::regions::MemoryRange;

/// Result type alias for aliascopy operations
pub type Result<T> = std::result::Result<T, CopyError>;

/// Errors raised while building, inspecting or copying a value graph
///
/// `OverlapViolation`, `RegionNotFound` and `IntrospectionDenied` are internal
/// consistency failures: they must never occur for a well-typed graph and abort
/// the whole copy. No partial result is ever returned alongside them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CopyError {
    /// A newly observed range partially overlaps a registered one without nesting
    #[error("Overlapping regions: {incoming} partially overlaps registered {existing}")]
    OverlapViolation {
        existing: MemoryRange,
        incoming: MemoryRange,
    },

    /// The copy pass reached an address the discovery pass never registered
    #[error("Region not found for address {address}")]
    RegionNotFound { address: Address },

    /// The graph contains data whose layout cannot be read
    #[error("Introspection denied: type {type_name} is opaque")]
    IntrospectionDenied { type_name: String },

    /// An address does not denote valid storage in the heap
    #[error("Invalid address {address}: {message}")]
    InvalidAddress { address: Address, message: String },

    /// A cell or allocation does not have the shape its type requires
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// A type id that was never issued by the type table
    #[error("Unknown type id {id}")]
    UnknownType { id: u32 },

    /// A forward-declared record that was never defined
    #[error("Type {name} was declared but never defined")]
    UndefinedType { name: String },

    /// A record would contain itself without indirection
    #[error("Type {name} contains itself inline and has no finite layout")]
    LayoutCycle { name: String },

    /// Invalid parameters or configuration
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// The registry grew beyond the configured limit
    #[error("Region limit exceeded: {limit} regions")]
    RegionLimitExceeded { limit: usize },
}

impl CopyError {
    /// Create an overlap violation error
    pub fn overlap(existing: MemoryRange, incoming: MemoryRange) -> Self {
        Self::OverlapViolation { existing, incoming }
    }

    /// Create a region not found error
    pub fn region_not_found(address: Address) -> Self {
        Self::RegionNotFound { address }
    }

    /// Create an introspection denied error
    pub fn introspection_denied(type_name: impl Into<String>) -> Self {
        Self::IntrospectionDenied {
            type_name: type_name.into(),
        }
    }

    /// Create an invalid address error
    pub fn invalid_address(address: Address, message: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address,
            message: message.into(),
        }
    }

    /// Create a type mismatch error
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Whether this error signals a traversal defect or a broken layout
    /// assumption rather than a misuse of the public API
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::OverlapViolation { .. }
                | Self::RegionNotFound { .. }
                | Self::IntrospectionDenied { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::AllocId;

    #[test]
    fn test_error_creation() {
        let addr = Address::new(AllocId(3), 2);
        let err = CopyError::region_not_found(addr);
        assert!(matches!(err, CopyError::RegionNotFound { .. }));
        assert!(err.is_internal());

        let err = CopyError::invalid_parameter("max_regions", "must be positive");
        assert!(matches!(err, CopyError::InvalidParameter { .. }));
        assert!(!err.is_internal());

        let err = CopyError::introspection_denied("Handle");
        assert!(err.is_internal());
    }

    #[test]
    fn test_error_display() {
        let a = MemoryRange::new(Address::new(AllocId(1), 0), Address::new(AllocId(1), 4));
        let b = MemoryRange::new(Address::new(AllocId(1), 2), Address::new(AllocId(1), 6));
        let display = format!("{}", CopyError::overlap(a, b));
        assert!(display.contains("Overlapping regions"));
        assert!(display.contains("#1+2..#1+6"));
        assert!(display.contains("#1+0..#1+4"));
    }
}
