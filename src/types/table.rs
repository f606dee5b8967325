//! Type table: definitions, layouts and reference-containment facts

use std::collections::HashMap;

use crate::error::{CopyError, Result};
use crate::heap::Value;

use super::kind::{Field, ScalarKind, TypeId, TypeKind};

/// Layout facts computed once when a type is defined
#[derive(Debug, Clone)]
struct TypeInfo {
    kind: TypeKind,
    /// Size in cells
    size: usize,
    /// Whether a value of this type may hold a reference anywhere inside
    has_refs: bool,
}

#[derive(Debug, Clone)]
enum TypeDef {
    Declared { name: String },
    Defined(TypeInfo),
}

/// Registry of every type a heap's values may have
///
/// Structural types (scalars, references, slices, maps, arrays, dyn) are
/// interned so that building the same shape twice yields the same id.
/// Records and opaque types are nominal. Records may be declared first and
/// defined later, which is how self-referential types are expressed.
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    defs: Vec<TypeDef>,
    interned: HashMap<TypeKind, TypeId>,
}

impl TypeTable {
    /// Create an empty type table
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of issued type ids
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Check if no types have been issued
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Get or create a scalar type
    pub fn scalar(&mut self, kind: ScalarKind) -> TypeId {
        self.intern(TypeInfo {
            kind: TypeKind::Scalar(kind),
            size: 1,
            has_refs: false,
        })
    }

    pub fn bool(&mut self) -> TypeId {
        self.scalar(ScalarKind::Bool)
    }

    pub fn int(&mut self) -> TypeId {
        self.scalar(ScalarKind::Int)
    }

    pub fn uint(&mut self) -> TypeId {
        self.scalar(ScalarKind::Uint)
    }

    pub fn float(&mut self) -> TypeId {
        self.scalar(ScalarKind::Float)
    }

    pub fn string(&mut self) -> TypeId {
        self.scalar(ScalarKind::Str)
    }

    /// Get or create the dynamically-typed slot type
    pub fn dynamic(&mut self) -> TypeId {
        self.intern(TypeInfo {
            kind: TypeKind::Dyn,
            size: 1,
            has_refs: true,
        })
    }

    /// Get or create a reference type; the target may still be undefined
    pub fn reference(&mut self, target: TypeId) -> Result<TypeId> {
        self.check_issued(target)?;
        Ok(self.intern(TypeInfo {
            kind: TypeKind::Ref(target),
            size: 1,
            has_refs: true,
        }))
    }

    /// Get or create a slice type; the element may still be undefined
    pub fn slice(&mut self, elem: TypeId) -> Result<TypeId> {
        self.check_issued(elem)?;
        Ok(self.intern(TypeInfo {
            kind: TypeKind::Slice(elem),
            size: 1,
            has_refs: true,
        }))
    }

    /// Get or create a map type
    pub fn map(&mut self, key: TypeId, value: TypeId) -> Result<TypeId> {
        self.info(key)?;
        self.check_issued(value)?;
        Ok(self.intern(TypeInfo {
            kind: TypeKind::Map { key, value },
            size: 1,
            has_refs: true,
        }))
    }

    /// Get or create a fixed-size array type; the element must be defined
    pub fn array(&mut self, elem: TypeId, len: usize) -> Result<TypeId> {
        let elem_info = self.info(elem)?;
        let size = elem_info.size * len;
        let has_refs = len > 0 && elem_info.has_refs;
        Ok(self.intern(TypeInfo {
            kind: TypeKind::Array { elem, len },
            size,
            has_refs,
        }))
    }

    /// Create an opaque type of the given size in cells
    pub fn opaque(&mut self, name: impl Into<String>, size: usize) -> TypeId {
        // Opaque storage may hide references, so both passes must reach it.
        self.push(TypeDef::Defined(TypeInfo {
            kind: TypeKind::Opaque {
                name: name.into(),
                size,
            },
            size,
            has_refs: true,
        }))
    }

    /// Declare a record whose fields are supplied later
    pub fn declare_record(&mut self, name: impl Into<String>) -> TypeId {
        self.push(TypeDef::Declared { name: name.into() })
    }

    /// Define a previously declared record
    pub fn define_record(&mut self, id: TypeId, fields: &[(&str, TypeId)]) -> Result<()> {
        let name = match self.def(id)? {
            TypeDef::Declared { name } => name.clone(),
            TypeDef::Defined(_) => {
                return Err(CopyError::invalid_parameter(
                    "id",
                    format!("type {} is already defined", self.name(id)),
                ))
            }
        };

        let mut laid_out = Vec::with_capacity(fields.len());
        let mut offset = 0;
        let mut has_refs = false;
        for (field_name, ty) in fields {
            let info = match self.def(*ty)? {
                TypeDef::Defined(info) => info,
                TypeDef::Declared { .. } if *ty == id => {
                    return Err(CopyError::LayoutCycle { name });
                }
                TypeDef::Declared { name } => {
                    return Err(CopyError::UndefinedType { name: name.clone() });
                }
            };
            laid_out.push(Field {
                name: (*field_name).to_string(),
                ty: *ty,
                offset,
            });
            offset += info.size;
            has_refs |= info.has_refs;
        }

        self.defs[id.index()] = TypeDef::Defined(TypeInfo {
            kind: TypeKind::Record {
                name,
                fields: laid_out,
            },
            size: offset,
            has_refs,
        });
        Ok(())
    }

    /// Declare and define a record in one step
    pub fn record(&mut self, name: impl Into<String>, fields: &[(&str, TypeId)]) -> Result<TypeId> {
        let id = self.declare_record(name);
        self.define_record(id, fields)?;
        Ok(id)
    }

    /// Get the kind of a defined type
    pub fn kind(&self, id: TypeId) -> Result<&TypeKind> {
        Ok(&self.info(id)?.kind)
    }

    /// Size of a value of this type in cells
    pub fn size_of(&self, id: TypeId) -> Result<usize> {
        Ok(self.info(id)?.size)
    }

    /// Whether a value of this type may contain references anywhere in its
    /// field closure
    pub fn may_contain_references(&self, id: TypeId) -> Result<bool> {
        Ok(self.info(id)?.has_refs)
    }

    /// Look up a record field by name
    pub fn field(&self, id: TypeId, name: &str) -> Result<&Field> {
        match self.kind(id)? {
            TypeKind::Record { fields, .. } => fields
                .iter()
                .find(|field| field.name == name)
                .ok_or_else(|| {
                    CopyError::invalid_parameter("field", format!("{} has no field {}", self.name(id), name))
                }),
            other => Err(CopyError::type_mismatch("record", other.label())),
        }
    }

    /// Human-readable name of a type
    pub fn name(&self, id: TypeId) -> String {
        match self.defs.get(id.index()) {
            None => format!("<unknown {}>", id),
            Some(TypeDef::Declared { name }) => name.clone(),
            Some(TypeDef::Defined(info)) => match &info.kind {
                TypeKind::Scalar(kind) => kind.name().to_string(),
                TypeKind::Ref(target) => format!("*{}", self.name(*target)),
                TypeKind::Slice(elem) => format!("[]{}", self.name(*elem)),
                TypeKind::Map { key, value } => {
                    format!("map[{}]{}", self.name(*key), self.name(*value))
                }
                TypeKind::Array { elem, len } => format!("[{}]{}", len, self.name(*elem)),
                TypeKind::Record { name, .. } => name.clone(),
                TypeKind::Dyn => "any".to_string(),
                TypeKind::Opaque { name, .. } => name.clone(),
            },
        }
    }

    /// Zero value of a type, laid out as cells
    pub fn zero_value(&self, id: TypeId) -> Result<Vec<Value>> {
        let mut cells = Vec::with_capacity(self.size_of(id)?);
        self.push_zero(id, &mut cells)?;
        Ok(cells)
    }

    fn push_zero(&self, id: TypeId, out: &mut Vec<Value>) -> Result<()> {
        match self.kind(id)? {
            TypeKind::Scalar(kind) => out.push(Value::zero_scalar(*kind)),
            TypeKind::Ref(_) => out.push(Value::Ref(None)),
            TypeKind::Slice(_) => out.push(Value::Slice(None)),
            TypeKind::Map { .. } => out.push(Value::Map(None)),
            TypeKind::Dyn => out.push(Value::Dyn(None)),
            TypeKind::Opaque { size, .. } => out.extend((0..*size).map(|_| Value::Raw(0))),
            TypeKind::Array { elem, len } => {
                for _ in 0..*len {
                    self.push_zero(*elem, out)?;
                }
            }
            TypeKind::Record { fields, .. } => {
                for field in fields {
                    self.push_zero(field.ty, out)?;
                }
            }
        }
        Ok(())
    }

    fn intern(&mut self, info: TypeInfo) -> TypeId {
        if let Some(id) = self.interned.get(&info.kind) {
            return *id;
        }
        let kind = info.kind.clone();
        let id = self.push(TypeDef::Defined(info));
        self.interned.insert(kind, id);
        id
    }

    fn push(&mut self, def: TypeDef) -> TypeId {
        let id = TypeId(self.defs.len() as u32);
        self.defs.push(def);
        id
    }

    fn def(&self, id: TypeId) -> Result<&TypeDef> {
        self.defs
            .get(id.index())
            .ok_or(CopyError::UnknownType { id: id.0 })
    }

    fn check_issued(&self, id: TypeId) -> Result<()> {
        self.def(id).map(|_| ())
    }

    fn info(&self, id: TypeId) -> Result<&TypeInfo> {
        match self.def(id)? {
            TypeDef::Defined(info) => Ok(info),
            TypeDef::Declared { name } => Err(CopyError::UndefinedType { name: name.clone() }),
        }
    }
}
