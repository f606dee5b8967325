//! Allocation arena

use std::collections::HashMap;

use crate::error::{CopyError, Result};
use crate::types::{TypeId, TypeTable};

use super::value::{AllocId, Address, SliceView, Value};

/// An unordered associative container stored in the heap
///
/// Keys are the cells of a key value; values are the cells of a value.
#[derive(Debug, Clone, PartialEq)]
pub struct MapObject {
    key_type: TypeId,
    value_type: TypeId,
    entries: HashMap<Vec<Value>, Vec<Value>>,
}

impl MapObject {
    /// Create an empty map
    pub fn new(key_type: TypeId, value_type: TypeId) -> Self {
        Self {
            key_type,
            value_type,
            entries: HashMap::new(),
        }
    }

    pub fn key_type(&self) -> TypeId {
        self.key_type
    }

    pub fn value_type(&self) -> TypeId {
        self.value_type
    }

    /// Insert an entry, returning the previous value for the key
    pub fn insert(&mut self, key: Vec<Value>, value: Vec<Value>) -> Option<Vec<Value>> {
        self.entries.insert(key, value)
    }

    pub fn get(&self, key: &[Value]) -> Option<&Vec<Value>> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = (&Vec<Value>, &Vec<Value>)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Vec<Value>> {
        self.entries.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Vec<Value>> {
        self.entries.values()
    }
}

/// Backing storage of one allocation
#[derive(Debug, Clone, PartialEq)]
pub enum Storage {
    /// Contiguous run of cells
    Cells(Vec<Value>),
    /// Associative container
    Map(MapObject),
}

/// One allocation and the type of the elements it was created for
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub element_type: TypeId,
    pub storage: Storage,
}

/// Position in the allocation log, used to undo a failed copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapMark(usize);

/// Arena of allocations addressed by [`AllocId`]
///
/// Allocations are never freed individually; a [`HeapMark`] lets a caller
/// discard everything allocated after a point.
#[derive(Debug, Clone, Default)]
pub struct Heap {
    allocations: Vec<Allocation>,
}

impl Heap {
    /// Create an empty heap
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live allocations
    pub fn allocation_count(&self) -> usize {
        self.allocations.len()
    }

    /// Allocate `count` zeroed elements of `elem`
    pub fn alloc_zeroed(&mut self, types: &TypeTable, elem: TypeId, count: usize) -> Result<Address> {
        let zero = types.zero_value(elem)?;
        let mut cells = Vec::with_capacity(zero.len() * count);
        for _ in 0..count {
            cells.extend(zero.iter().cloned());
        }
        Ok(self.push_cells(elem, cells))
    }

    /// Allocate a single value of type `ty`
    pub fn alloc_value(&mut self, types: &TypeTable, ty: TypeId, cells: Vec<Value>) -> Result<Address> {
        let size = types.size_of(ty)?;
        if cells.len() != size {
            return Err(CopyError::type_mismatch(
                format!("{} cells for {}", size, types.name(ty)),
                format!("{} cells", cells.len()),
            ));
        }
        Ok(self.push_cells(ty, cells))
    }

    /// Allocate a backing store holding `cells` and return a full view of it
    pub fn alloc_array(&mut self, types: &TypeTable, elem: TypeId, cells: Vec<Value>) -> Result<SliceView> {
        let size = types.size_of(elem)?;
        let count = match size {
            0 if cells.is_empty() => 0,
            0 => {
                return Err(CopyError::type_mismatch("no cells for a zero-sized element", format!("{} cells", cells.len())))
            }
            _ if cells.len() % size != 0 => {
                return Err(CopyError::type_mismatch(
                    format!("a multiple of {} cells", size),
                    format!("{} cells", cells.len()),
                ))
            }
            _ => cells.len() / size,
        };
        let base = self.push_cells(elem, cells);
        Ok(SliceView::new(base, count, count))
    }

    /// Allocate an empty map
    pub fn alloc_map(&mut self, key: TypeId, value: TypeId) -> AllocId {
        let id = self.next_id();
        self.allocations.push(Allocation {
            element_type: key,
            storage: Storage::Map(MapObject::new(key, value)),
        });
        id
    }

    /// Get an allocation
    pub fn allocation(&self, id: AllocId) -> Result<&Allocation> {
        self.allocations
            .get(id.index())
            .ok_or_else(|| CopyError::invalid_address(Address::new(id, 0), "no such allocation"))
    }

    /// Number of cells in a cell allocation
    pub fn cell_len(&self, id: AllocId) -> Result<usize> {
        Ok(self.cells(id)?.len())
    }

    /// Read `len` cells starting at `addr`
    pub fn read(&self, addr: Address, len: usize) -> Result<&[Value]> {
        let cells = self.cells(addr.alloc)?;
        let end = addr.offset.checked_add(len).filter(|end| *end <= cells.len());
        match end {
            Some(end) => Ok(&cells[addr.offset..end]),
            None => Err(CopyError::invalid_address(
                addr,
                format!("{} cells out of bounds of {}", len, cells.len()),
            )),
        }
    }

    /// Read one cell
    pub fn read_cell(&self, addr: Address) -> Result<&Value> {
        Ok(&self.read(addr, 1)?[0])
    }

    /// Read a copy of the value of type `ty` stored at `addr`
    pub fn load(&self, types: &TypeTable, addr: Address, ty: TypeId) -> Result<Vec<Value>> {
        Ok(self.read(addr, types.size_of(ty)?)?.to_vec())
    }

    /// Overwrite cells starting at `addr`
    pub fn store(&mut self, addr: Address, values: &[Value]) -> Result<()> {
        let cells = self.cells_mut(addr.alloc)?;
        let available = cells.len();
        let end = addr.offset.checked_add(values.len()).filter(|end| *end <= available);
        match end {
            Some(end) => {
                cells[addr.offset..end].clone_from_slice(values);
                Ok(())
            }
            None => Err(CopyError::invalid_address(
                addr,
                format!("{} cells out of bounds of {}", values.len(), available),
            )),
        }
    }

    /// Cells covered by a view's length
    pub fn view_cells(&self, view: &SliceView, elem_size: usize) -> Result<&[Value]> {
        let len = view
            .len
            .checked_mul(elem_size)
            .ok_or_else(|| CopyError::invalid_address(view.base, format!("length {} overflows", view.len)))?;
        self.read(view.base, len)
    }

    /// Get a map
    pub fn map(&self, id: AllocId) -> Result<&MapObject> {
        match &self.allocation(id)?.storage {
            Storage::Map(map) => Ok(map),
            Storage::Cells(_) => Err(CopyError::type_mismatch("map allocation", "cell allocation")),
        }
    }

    /// Get a map for modification
    pub fn map_mut(&mut self, id: AllocId) -> Result<&mut MapObject> {
        match &mut self.allocation_mut(id)?.storage {
            Storage::Map(map) => Ok(map),
            Storage::Cells(_) => Err(CopyError::type_mismatch("map allocation", "cell allocation")),
        }
    }

    /// Record the current allocation position
    pub fn mark(&self) -> HeapMark {
        HeapMark(self.allocations.len())
    }

    /// Drop every allocation made after `mark`
    pub fn rollback(&mut self, mark: HeapMark) {
        self.allocations.truncate(mark.0);
    }

    fn next_id(&self) -> AllocId {
        AllocId(self.allocations.len() as u32)
    }

    fn push_cells(&mut self, element_type: TypeId, cells: Vec<Value>) -> Address {
        let id = self.next_id();
        self.allocations.push(Allocation {
            element_type,
            storage: Storage::Cells(cells),
        });
        Address::new(id, 0)
    }

    fn allocation_mut(&mut self, id: AllocId) -> Result<&mut Allocation> {
        self.allocations
            .get_mut(id.index())
            .ok_or_else(|| CopyError::invalid_address(Address::new(id, 0), "no such allocation"))
    }

    fn cells(&self, id: AllocId) -> Result<&Vec<Value>> {
        match &self.allocation(id)?.storage {
            Storage::Cells(cells) => Ok(cells),
            Storage::Map(_) => Err(CopyError::type_mismatch("cell allocation", "map allocation")),
        }
    }

    fn cells_mut(&mut self, id: AllocId) -> Result<&mut Vec<Value>> {
        match &mut self.allocation_mut(id)?.storage {
            Storage::Cells(cells) => Ok(cells),
            Storage::Map(_) => Err(CopyError::type_mismatch("cell allocation", "map allocation")),
        }
    }
}
