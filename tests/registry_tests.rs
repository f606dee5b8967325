//! Integration tests for the region registry and the object model

use aliascopy::{
    regions::{allocate_sequence, allocate_single},
    Address, CopyError, Heap, MemoryRange, RegionRegistry, TypeKind, TypeTable, Value,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn store(heap: &mut Heap, types: &mut TypeTable, len: i64) -> Address {
        let int = types.int();
        heap.alloc_array(types, int, (0..len).map(Value::Int).collect())
            .unwrap()
            .base
    }

    #[test]
    fn test_registry_keeps_regions_disjoint() {
        let mut types = TypeTable::new();
        let int = types.int();
        let mut heap = Heap::new();
        let a = store(&mut heap, &mut types, 8);
        let b = store(&mut heap, &mut types, 2);

        let mut registry = RegionRegistry::new();
        assert!(registry.register(MemoryRange::of_len(a.add(4), 2), int, Some(allocate_sequence)).unwrap());
        assert!(registry.register(MemoryRange::of_len(b, 2), int, Some(allocate_sequence)).unwrap());
        assert!(registry.register(MemoryRange::of_len(a, 2), int, Some(allocate_sequence)).unwrap());
        assert_eq!(registry.len(), 3);

        // Covers both regions of `a` but leaves `b` alone
        assert!(registry.register(MemoryRange::of_len(a, 8), int, Some(allocate_sequence)).unwrap());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.evicted_count(), 2);

        let ranges: Vec<MemoryRange> = registry.iter().map(|entry| entry.range).collect();
        for (i, x) in ranges.iter().enumerate() {
            for y in &ranges[i + 1..] {
                assert!(!x.overlaps(y));
            }
        }
        assert!(ranges.windows(2).all(|pair| pair[0].start < pair[1].start));
    }

    #[test]
    fn test_overlap_leaves_registry_untouched() {
        let mut types = TypeTable::new();
        let int = types.int();
        let mut heap = Heap::new();
        let a = store(&mut heap, &mut types, 6);

        let mut registry = RegionRegistry::new();
        registry.register(MemoryRange::of_len(a.add(1), 2), int, Some(allocate_sequence)).unwrap();
        registry.register(MemoryRange::of_len(a.add(4), 2), int, Some(allocate_sequence)).unwrap();

        let err = registry
            .register(MemoryRange::of_len(a, 5), int, Some(allocate_sequence))
            .unwrap_err();
        match err {
            CopyError::OverlapViolation { existing, incoming } => {
                assert_eq!(existing, MemoryRange::of_len(a.add(4), 2));
                assert_eq!(incoming, MemoryRange::of_len(a, 5));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.evicted_count(), 0);
    }

    #[test]
    fn test_entry_materializes_once_and_redirects() {
        let mut types = TypeTable::new();
        let int = types.int();
        let mut heap = Heap::new();
        let a = store(&mut heap, &mut types, 5);

        let mut registry = RegionRegistry::new();
        registry.register(MemoryRange::of_len(a, 5), int, Some(allocate_sequence)).unwrap();

        let entry = registry.lookup_mut(a.add(3)).unwrap();
        let (base, fresh) = entry.materialize(&mut heap, &types).unwrap();
        assert!(fresh);
        assert_eq!(heap.cell_len(base.alloc).unwrap(), 5);
        assert_eq!(entry.materialize(&mut heap, &types).unwrap(), (base, false));
        assert_eq!(entry.redirect(a.add(3)), Some(base.add(3)));
        assert_eq!(entry.redirect(a), Some(base));
    }

    #[test]
    fn test_single_strategy_allocates_one_value() {
        let mut types = TypeTable::new();
        let int = types.int();
        let pair = types.array(int, 2).unwrap();
        let mut heap = Heap::new();
        let a = store(&mut heap, &mut types, 4);

        let range = MemoryRange::of_len(a, 2);
        let single = allocate_single(&mut heap, &types, &range, pair).unwrap();
        assert_eq!(heap.load(&types, single, pair).unwrap(), vec![Value::Int(0), Value::Int(0)]);

        let range = MemoryRange::of_len(a, 4);
        let sequence = allocate_sequence(&mut heap, &types, &range, int).unwrap();
        assert_eq!(heap.cell_len(sequence.alloc).unwrap(), 4);
    }

    #[test]
    fn test_sentinel_without_strategy_cannot_materialize() {
        let mut types = TypeTable::new();
        let int = types.int();
        let table = types.map(int, int).unwrap();
        let mut heap = Heap::new();
        let id = heap.alloc_map(int, int);

        let mut registry = RegionRegistry::new();
        let sentinel = MemoryRange::of_len(Address::new(id, 0), 1);
        assert!(registry.register(sentinel, table, None).unwrap());
        let entry = registry.lookup_mut(Address::new(id, 0)).unwrap();
        assert!(entry.materialize(&mut heap, &types).is_err());
    }

    #[test]
    fn test_registry_limit() {
        let mut types = TypeTable::new();
        let int = types.int();
        let mut heap = Heap::new();
        let a = store(&mut heap, &mut types, 4);

        let mut registry = RegionRegistry::with_limit(Some(2));
        registry.register(MemoryRange::of_len(a, 1), int, Some(allocate_single)).unwrap();
        registry.register(MemoryRange::of_len(a.add(1), 1), int, Some(allocate_single)).unwrap();
        let err = registry
            .register(MemoryRange::of_len(a.add(3), 1), int, Some(allocate_single))
            .unwrap_err();
        assert_eq!(err, CopyError::RegionLimitExceeded { limit: 2 });

        // Replacing nested regions does not grow the registry
        assert!(registry.register(MemoryRange::of_len(a, 4), int, Some(allocate_sequence)).unwrap());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_dump() {
        let mut types = TypeTable::new();
        let int = types.int();
        let mut heap = Heap::new();
        let a = store(&mut heap, &mut types, 3);

        let mut registry = RegionRegistry::new();
        registry.register(MemoryRange::of_len(a, 3), int, Some(allocate_sequence)).unwrap();
        let dump = registry.to_string();
        assert!(dump.starts_with("RegionRegistry (1 regions, 0 evicted)"));
        assert!(dump.contains("(unallocated)"));
    }

    #[test]
    fn test_type_names_and_layouts() {
        let mut types = TypeTable::new();
        let int = types.int();
        let text = types.string();
        let ptr = types.reference(int).unwrap();
        let ints = types.slice(int).unwrap();
        let table = types.map(text, ptr).unwrap();
        let triple = types.array(int, 3).unwrap();
        let point = types.record("Point", &[("x", int), ("tags", ints), ("xyz", triple)]).unwrap();

        assert_eq!(types.name(ptr), "*int");
        assert_eq!(types.name(ints), "[]int");
        assert_eq!(types.name(triple), "[3]int");
        assert_eq!(types.name(point), "Point");
        assert!(types.name(table).starts_with("map["));

        assert_eq!(types.size_of(point).unwrap(), 5);
        assert_eq!(types.field(point, "xyz").unwrap().offset, 2);
        assert!(types.may_contain_references(point).unwrap());
        assert!(!types.may_contain_references(triple).unwrap());
        assert!(matches!(types.kind(table).unwrap(), TypeKind::Map { .. }));

        // Interned types compare equal
        assert_eq!(types.reference(int).unwrap(), ptr);
    }

    #[test]
    fn test_recursive_record_rules() {
        let mut types = TypeTable::new();
        let int = types.int();
        let tree = types.declare_record("Tree");
        let child = types.reference(tree).unwrap();
        let children = types.slice(tree).unwrap();

        // Undefined records cannot be laid out inline
        assert!(matches!(types.array(tree, 2), Err(CopyError::UndefinedType { .. })));
        assert!(matches!(
            types.define_record(tree, &[("value", int), ("self", tree)]),
            Err(CopyError::LayoutCycle { .. })
        ));

        types
            .define_record(tree, &[("value", int), ("left", child), ("children", children)])
            .unwrap();
        assert_eq!(types.size_of(tree).unwrap(), 3);
        assert_eq!(
            types.zero_value(tree).unwrap(),
            vec![Value::Int(0), Value::Ref(None), Value::Slice(None)]
        );
    }
}
