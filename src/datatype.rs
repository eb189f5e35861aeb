//! The type model: the shape every [`crate::item::Item`] conforms to.
//!
//! Types are compared structurally. Named structs live in a [`Registry`]
//! (an arena of struct shapes plus a name to index map) and are referenced
//! by index, which lets a struct mention itself or a struct declared later
//! in the schema without building an ownership cycle.

// used for the name -> index map of the registry
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::error::{Result, SiphonError};
use crate::hashmap::OtherHasher;

/// Name of the synthetic struct holding the top level fields of a schema.
pub const ROOT_STRUCT: &str = "db";

#[derive(Clone, Debug)]
pub enum Type {
    Bool,
    Int,
    Int32,
    Int16,
    Int8,
    Uint,
    Uint32,
    Uint16,
    Uint8,
    Float,
    Float32,
    String,
    Regexp,
    List(Box<Type>),
    Map(Box<Type>, Box<Type>),
    Struct(StructType),
    Any,
}

impl Type {
    /// Looks up a primitive type by the name used for it in schemas.
    pub fn primitive(name: &str) -> Option<Type> {
        let ty = match name {
            "bool" => Type::Bool,
            "int" | "int64" => Type::Int,
            "int32" => Type::Int32,
            "int16" => Type::Int16,
            "int8" => Type::Int8,
            "uint" | "uint64" => Type::Uint,
            "uint32" => Type::Uint32,
            "uint16" => Type::Uint16,
            "uint8" => Type::Uint8,
            "float" | "float64" => Type::Float,
            "float32" => Type::Float32,
            "string" => Type::String,
            "regexp" => Type::Regexp,
            _ => return None,
        };
        Some(ty)
    }

    pub fn list(elem: Type) -> Type {
        Type::List(Box::new(elem))
    }

    pub fn map(key: Type, val: Type) -> Type {
        Type::Map(Box::new(key), Box::new(val))
    }

    /// Structural equality. `Any` equals every type, in both directions.
    pub fn equals(&self, other: &Type) -> bool {
        let mut assumed = Vec::new();
        self.equals_assuming(other, &mut assumed)
    }

    // `assumed` holds struct pairs currently being compared further up the
    // stack; a pair seen again is taken as equal so cyclic types terminate.
    fn equals_assuming(&self, other: &Type, assumed: &mut Vec<(StructKey, StructKey)>) -> bool {
        match (self, other) {
            (Type::Any, _) | (_, Type::Any) => true,
            (Type::List(a), Type::List(b)) => a.equals_assuming(b, assumed),
            (Type::Map(ak, av), Type::Map(bk, bv)) => {
                ak.equals_assuming(bk, assumed) && av.equals_assuming(bv, assumed)
            }
            (Type::Struct(a), Type::Struct(b)) => a.equals_assuming(b, assumed),
            (Type::List(_) | Type::Map(..) | Type::Struct(_), _) => false,
            (_, Type::List(_) | Type::Map(..) | Type::Struct(_)) => false,
            // scalars compare by their canonical form
            (a, b) => a.to_string() == b.to_string(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Bool => write!(f, "bool"),
            Type::Int => write!(f, "int"),
            Type::Int32 => write!(f, "int32"),
            Type::Int16 => write!(f, "int16"),
            Type::Int8 => write!(f, "int8"),
            Type::Uint => write!(f, "uint"),
            Type::Uint32 => write!(f, "uint32"),
            Type::Uint16 => write!(f, "uint16"),
            Type::Uint8 => write!(f, "uint8"),
            Type::Float => write!(f, "float"),
            Type::Float32 => write!(f, "float32"),
            Type::String => write!(f, "string"),
            Type::Regexp => write!(f, "regexp"),
            Type::List(elem) => write!(f, "[{}]", elem),
            Type::Map(key, val) => write!(f, "<{}:{}>", key, val),
            Type::Struct(st) => write!(f, "{}", st.name()),
            Type::Any => write!(f, "any"),
        }
    }
}

// ------------- Structs -------------
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StructId(pub(crate) usize);

// identifies a struct across registries: (registry address, index)
type StructKey = (usize, usize);

/// A reference to a named struct shape held by a [`Registry`].
///
/// The handle is weak so that shapes may refer to themselves; the registry
/// is kept alive by whoever built it (normally the `Database`).
#[derive(Clone, Debug)]
pub struct StructType {
    id: StructId,
    name: Arc<str>,
    registry: Weak<Registry>,
}

impl StructType {
    pub fn id(&self) -> StructId {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn registry(&self) -> Result<Arc<Registry>> {
        self.registry.upgrade().ok_or_else(|| {
            SiphonError::Internal(format!("the registry holding struct {} was dropped", self.name))
        })
    }
    /// The declared fields, in declaration order.
    pub fn fields(&self) -> Result<Vec<(String, Type)>> {
        let registry = self.registry()?;
        Ok(registry.shape(self.id).fields.clone())
    }
    /// The declared type of a single field.
    pub fn field_type(&self, field: &str) -> Result<Option<Type>> {
        let registry = self.registry()?;
        Ok(registry.shape(self.id).field(field).cloned())
    }

    fn key(&self) -> StructKey {
        (self.registry.as_ptr() as usize, self.id.0)
    }

    fn equals_assuming(&self, other: &StructType, assumed: &mut Vec<(StructKey, StructKey)>) -> bool {
        let pair = (self.key(), other.key());
        if pair.0 == pair.1 || assumed.contains(&pair) {
            return true;
        }
        let (Some(ours), Some(theirs)) = (self.registry.upgrade(), other.registry.upgrade()) else {
            return false;
        };
        let (ours, theirs) = (ours.shape(self.id), theirs.shape(other.id));
        if ours.fields.len() != theirs.fields.len() {
            return false;
        }
        assumed.push(pair);
        let equal = ours.fields.iter().all(|(name, ty)| {
            theirs
                .field(name)
                .is_some_and(|other_ty| ty.equals_assuming(other_ty, assumed))
        });
        assumed.pop();
        equal
    }
}

#[derive(Debug)]
pub struct StructShape {
    name: String,
    fields: Vec<(String, Type)>,
}

impl StructShape {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn fields(&self) -> &[(String, Type)] {
        &self.fields
    }
    pub fn field(&self, name: &str) -> Option<&Type> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, ty)| ty)
    }
}

/// Arena of struct shapes produced by the schema resolver.
#[derive(Debug)]
pub struct Registry {
    shapes: Vec<StructShape>,
    names: HashMap<String, StructId, OtherHasher>,
    root: StructId,
}

impl Registry {
    /// Builds a registry in one go. `build` receives a handle factory so the
    /// field types it produces can point back into the registry under
    /// construction; it returns the shapes (indexed by `StructId`), the
    /// name lookup and the root struct.
    pub(crate) fn new_cyclic<F>(build: F) -> Arc<Registry>
    where
        F: FnOnce(&dyn Fn(StructId, &str) -> StructType) -> (Vec<StructShape>, HashMap<String, StructId, OtherHasher>, StructId),
    {
        Arc::new_cyclic(|weak: &Weak<Registry>| {
            let handle = |id: StructId, name: &str| StructType {
                id,
                name: Arc::from(name),
                registry: weak.clone(),
            };
            let (shapes, names, root) = build(&handle);
            Registry { shapes, names, root }
        })
    }

    pub(crate) fn shape_of(name: String, fields: Vec<(String, Type)>) -> StructShape {
        StructShape { name, fields }
    }

    pub fn shape(&self, id: StructId) -> &StructShape {
        &self.shapes[id.0]
    }

    pub fn lookup(&self, name: &str) -> Option<StructId> {
        self.names.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// A handle to one of the kept shapes.
    pub fn struct_type(self: &Arc<Self>, id: StructId) -> StructType {
        StructType {
            id,
            name: Arc::from(self.shape(id).name()),
            registry: Arc::downgrade(self),
        }
    }

    /// The type of the whole database.
    pub fn root(self: &Arc<Self>) -> Type {
        Type::Struct(self.struct_type(self.root))
    }

    /// A named struct type as declared in the schema.
    pub fn named(self: &Arc<Self>, name: &str) -> Option<Type> {
        self.lookup(name).map(|id| Type::Struct(self.struct_type(id)))
    }
}
