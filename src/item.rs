//! Runtime values.
//!
//! An [`Item`] is a closed sum over every kind of value a database can hold.
//! Each operation is matched exhaustively per variant; variant/operation
//! pairs that make no sense fall through to [`unsupported`], so every
//! refusal reads the same way.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

// the "standard" regular expression package
use regex::Regex;
use serde_json::{Map as JsonMap, Number, Value};

use crate::datatype::{StructType, Type};
use crate::error::{Result, SiphonError};
use crate::hashmap::{digest, Digest, Hashmap};

// lists longer than this are abbreviated by Display
const DISPLAY_LIMIT: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    NotEqual,
    Less,
    More,
    LessOrEqual,
    MoreOrEqual,
    RegexpMatch,
}

impl Comparison {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::Equal => "=",
            Comparison::NotEqual => "!=",
            Comparison::Less => "<",
            Comparison::More => ">",
            Comparison::LessOrEqual => "<=",
            Comparison::MoreOrEqual => ">=",
            Comparison::RegexpMatch => "~",
        }
    }

    fn holds(&self, ordering: Option<Ordering>) -> bool {
        match self {
            Comparison::Equal => ordering == Some(Ordering::Equal),
            Comparison::NotEqual => ordering != Some(Ordering::Equal),
            Comparison::Less => ordering == Some(Ordering::Less),
            Comparison::More => ordering == Some(Ordering::Greater),
            Comparison::LessOrEqual => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            Comparison::MoreOrEqual => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            Comparison::RegexpMatch => false,
        }
    }

    fn is_equality(&self) -> bool {
        matches!(self, Comparison::Equal | Comparison::NotEqual)
    }
}

impl FromStr for Comparison {
    type Err = SiphonError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "=" => Ok(Comparison::Equal),
            "!=" => Ok(Comparison::NotEqual),
            "<" => Ok(Comparison::Less),
            ">" => Ok(Comparison::More),
            "<=" => Ok(Comparison::LessOrEqual),
            ">=" => Ok(Comparison::MoreOrEqual),
            "~" => Ok(Comparison::RegexpMatch),
            other => Err(SiphonError::Noop(format!("undefined comparison operator {}", other))),
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Where an element sits inside a list or map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Position {
    Index(usize),
    Key(Digest),
}

#[derive(Clone, Debug)]
pub enum Item {
    Bool(bool),
    Int(i64),
    Int32(i32),
    Int16(i16),
    Int8(i8),
    Uint(u64),
    Uint32(u32),
    Uint16(u16),
    Uint8(u8),
    Float(f64),
    Float32(f32),
    String(String),
    Regexp(Regex),
    List(List),
    Map(Hashmap),
    Struct(Struct),
}

/// The shared refusal for operations a variant does not define.
pub fn unsupported<T>(operation: &str, item: &Item) -> Result<T> {
    Err(SiphonError::Noop(format!(
        "{} is not supported on values of type {}",
        operation,
        item.type_of()
    )))
}

impl Item {
    // ------------- construction -------------

    /// The zero value of a type: false, 0, "", an empty collection, or a
    /// struct with every field zero valued.
    pub fn zero(ty: &Type) -> Result<Item> {
        let item = match ty {
            Type::Bool => Item::Bool(false),
            Type::Int => Item::Int(0),
            Type::Int32 => Item::Int32(0),
            Type::Int16 => Item::Int16(0),
            Type::Int8 => Item::Int8(0),
            Type::Uint => Item::Uint(0),
            Type::Uint32 => Item::Uint32(0),
            Type::Uint16 => Item::Uint16(0),
            Type::Uint8 => Item::Uint8(0),
            Type::Float => Item::Float(0.0),
            Type::Float32 => Item::Float32(0.0),
            Type::String => Item::String(String::new()),
            Type::Regexp => Item::regexp("")?,
            Type::List(elem) => Item::List(List::empty((**elem).clone())),
            Type::Map(key, val) => Item::Map(Hashmap::new((**key).clone(), (**val).clone())),
            Type::Struct(st) => Item::Struct(Struct::zero(st)?),
            Type::Any => {
                return Err(SiphonError::TypeMismatch("no value can be of type any".into()));
            }
        };
        Ok(item)
    }

    pub fn regexp(pattern: &str) -> Result<Item> {
        Regex::new(pattern).map(Item::Regexp).map_err(|e| {
            SiphonError::TypeMismatch(format!("invalid regular expression /{}/: {}", pattern, e))
        })
    }

    /// Decodes a generic JSON value into an item of the given type. Decoding
    /// never coerces: fractional or out of range numbers, missing struct
    /// fields and the like are all type mismatches.
    pub fn from_json(ty: &Type, value: &Value) -> Result<Item> {
        let item = match ty {
            Type::Bool => Item::Bool(value.as_bool().ok_or_else(|| mismatch(ty, value))?),
            Type::Int => Item::Int(integer(ty, value)?),
            Type::Int32 => Item::Int32(integer(ty, value)?),
            Type::Int16 => Item::Int16(integer(ty, value)?),
            Type::Int8 => Item::Int8(integer(ty, value)?),
            Type::Uint => Item::Uint(integer(ty, value)?),
            Type::Uint32 => Item::Uint32(integer(ty, value)?),
            Type::Uint16 => Item::Uint16(integer(ty, value)?),
            Type::Uint8 => Item::Uint8(integer(ty, value)?),
            Type::Float => Item::Float(value.as_f64().ok_or_else(|| mismatch(ty, value))?),
            Type::Float32 => {
                let wide = value.as_f64().ok_or_else(|| mismatch(ty, value))?;
                let narrow = wide as f32;
                if narrow.is_infinite() {
                    return Err(SiphonError::TypeMismatch(format!("{} does not fit in a float32", wide)));
                }
                Item::Float32(narrow)
            }
            Type::String => Item::String(value.as_str().ok_or_else(|| mismatch(ty, value))?.to_owned()),
            Type::Regexp => Item::regexp(value.as_str().ok_or_else(|| mismatch(ty, value))?)?,
            Type::List(elem) => {
                let values = value.as_array().ok_or_else(|| mismatch(ty, value))?;
                let items = values
                    .iter()
                    .map(|v| Item::from_json(elem, v))
                    .collect::<Result<Vec<_>>>()?;
                Item::List(List { elem: (**elem).clone(), items })
            }
            Type::Map(key, val) => {
                let object = value.as_object().ok_or_else(|| mismatch(ty, value))?;
                let mut map = Hashmap::new((**key).clone(), (**val).clone());
                for (k, v) in object {
                    map.insert(object_key(key, k)?, Item::from_json(val, v)?)?;
                }
                Item::Map(map)
            }
            Type::Struct(st) => Item::Struct(Struct::from_json(st, value)?),
            Type::Any => {
                return Err(SiphonError::TypeMismatch("no value can be decoded as any".into()));
            }
        };
        Ok(item)
    }

    // ------------- identity and rendering -------------

    pub fn type_of(&self) -> Type {
        match self {
            Item::Bool(_) => Type::Bool,
            Item::Int(_) => Type::Int,
            Item::Int32(_) => Type::Int32,
            Item::Int16(_) => Type::Int16,
            Item::Int8(_) => Type::Int8,
            Item::Uint(_) => Type::Uint,
            Item::Uint32(_) => Type::Uint32,
            Item::Uint16(_) => Type::Uint16,
            Item::Uint8(_) => Type::Uint8,
            Item::Float(_) => Type::Float,
            Item::Float32(_) => Type::Float32,
            Item::String(_) => Type::String,
            Item::Regexp(_) => Type::Regexp,
            Item::List(list) => Type::list(list.elem.clone()),
            Item::Map(map) => Type::map(map.key_type().clone(), map.val_type().clone()),
            Item::Struct(s) => Type::Struct(s.ty.clone()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Item::Bool(b) => Value::Bool(*b),
            Item::Int(v) => Value::from(*v),
            Item::Int32(v) => Value::from(*v),
            Item::Int16(v) => Value::from(*v),
            Item::Int8(v) => Value::from(*v),
            Item::Uint(v) => Value::from(*v),
            Item::Uint32(v) => Value::from(*v),
            Item::Uint16(v) => Value::from(*v),
            Item::Uint8(v) => Value::from(*v),
            Item::Float(v) => float_json(*v),
            // go through the shortest decimal form so 0.1f32 stays 0.1
            Item::Float32(v) => float_json(v.to_string().parse().unwrap_or(f64::from(*v))),
            Item::String(s) => Value::String(s.clone()),
            Item::Regexp(re) => Value::String(re.as_str().to_owned()),
            Item::List(list) => Value::Array(list.items.iter().map(Item::to_json).collect()),
            Item::Map(map) => {
                let mut object = JsonMap::new();
                for (k, v) in map.iter() {
                    object.insert(k.key_string(), v.to_json());
                }
                Value::Object(object)
            }
            Item::Struct(s) => {
                let mut object = JsonMap::new();
                for (name, v) in &s.fields {
                    object.insert(name.clone(), v.to_json());
                }
                Value::Object(object)
            }
        }
    }

    /// The JSON encoding of this item as text.
    pub fn json(&self) -> String {
        self.to_json().to_string()
    }

    // map keys in JSON objects must be strings
    fn key_string(&self) -> String {
        match self {
            Item::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// The common projection used to compare numbers of different kinds.
    /// 64 bit integers beyond 2^53 lose precision here.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Item::Int(v) => Some(*v as f64),
            Item::Int32(v) => Some(f64::from(*v)),
            Item::Int16(v) => Some(f64::from(*v)),
            Item::Int8(v) => Some(f64::from(*v)),
            Item::Uint(v) => Some(*v as f64),
            Item::Uint32(v) => Some(f64::from(*v)),
            Item::Uint16(v) => Some(f64::from(*v)),
            Item::Uint8(v) => Some(f64::from(*v)),
            Item::Float(v) => Some(*v),
            Item::Float32(v) => Some(f64::from(*v)),
            _ => None,
        }
    }

    // integral value of a numeric item, exact for every integer width
    pub(crate) fn as_integer(&self) -> Option<i128> {
        match self {
            Item::Int(v) => Some(i128::from(*v)),
            Item::Int32(v) => Some(i128::from(*v)),
            Item::Int16(v) => Some(i128::from(*v)),
            Item::Int8(v) => Some(i128::from(*v)),
            Item::Uint(v) => Some(i128::from(*v)),
            Item::Uint32(v) => Some(i128::from(*v)),
            Item::Uint16(v) => Some(i128::from(*v)),
            Item::Uint8(v) => Some(i128::from(*v)),
            Item::Float(_) | Item::Float32(_) => self.as_f64().and_then(integral),
            _ => None,
        }
    }

    // ------------- mutation -------------

    /// Overwrites this item from decoded JSON. The new value is decoded in
    /// full before anything is replaced, so a failure leaves the item as it was.
    pub fn set_json(&mut self, value: &Value) -> Result<()> {
        let next = Item::from_json(&self.type_of(), value)?;
        *self = next;
        Ok(())
    }

    pub fn get_field(&self, name: &str) -> Result<&Item> {
        match self {
            Item::Struct(s) => s.get(name),
            other => unsupported("field access", other),
        }
    }

    pub fn get_field_mut(&mut self, name: &str) -> Result<&mut Item> {
        match self {
            Item::Struct(s) => s.get_mut(name),
            other => unsupported("field access", other),
        }
    }

    pub fn set_field(&mut self, name: &str, to: Item) -> Result<()> {
        match self {
            Item::Struct(s) => s.set(name, to),
            other => unsupported("setting a field", other),
        }
    }

    pub fn get_key(&self, key: &Item) -> Result<&Item> {
        match self {
            Item::List(list) => {
                let index = list.index_of(key)?;
                Ok(&list.items[index])
            }
            Item::Map(map) => map.get(key),
            other => unsupported("key access", other),
        }
    }

    pub fn get_key_mut(&mut self, key: &Item) -> Result<&mut Item> {
        match self {
            Item::List(list) => {
                let index = list.index_of(key)?;
                Ok(&mut list.items[index])
            }
            Item::Map(map) => map.get_mut(key),
            other => unsupported("key access", other),
        }
    }

    pub fn set_key(&mut self, key: Item, to: Item) -> Result<()> {
        match self {
            Item::List(list) => {
                let index = list.index_of(&key)?;
                list.check(&to)?;
                list.items[index] = to;
                Ok(())
            }
            Item::Map(map) => map.insert(key, to),
            other => unsupported("setting a key", other),
        }
    }

    /// Removes a map key, or the list element at an index. Returns what was removed.
    pub fn unset_key(&mut self, key: &Item) -> Result<Item> {
        match self {
            Item::List(list) => {
                let index = list.index_of(key)?;
                Ok(list.items.remove(index))
            }
            Item::Map(map) => map.remove(key),
            other => unsupported("removing a key", other),
        }
    }

    pub fn set_key_json(&mut self, key: &Value, to: &Value) -> Result<()> {
        let (key, to) = match self {
            Item::List(list) => (Item::from_json(&Type::Int, key)?, Item::from_json(&list.elem, to)?),
            Item::Map(map) => (
                Item::from_json(map.key_type(), key)?,
                Item::from_json(map.val_type(), to)?,
            ),
            other => return unsupported("setting a key", other),
        };
        self.set_key(key, to)
    }

    pub fn unset_key_json(&mut self, key: &Value) -> Result<Item> {
        let key = match self {
            Item::List(_) => Item::from_json(&Type::Int, key)?,
            Item::Map(map) => Item::from_json(map.key_type(), key)?,
            other => return unsupported("removing a key", other),
        };
        self.unset_key(&key)
    }

    pub fn append(&mut self, items: Vec<Item>) -> Result<()> {
        match self {
            Item::List(list) => list.append(items),
            other => unsupported("append", other),
        }
    }

    /// Places `items` before the existing elements, keeping their order:
    /// prepending [4, 5, 6] to [1, 2, 3] gives [4, 5, 6, 1, 2, 3].
    pub fn prepend(&mut self, items: Vec<Item>) -> Result<()> {
        match self {
            Item::List(list) => list.prepend(items),
            other => unsupported("prepend", other),
        }
    }

    /// Appends a single element decoded from JSON.
    pub fn append_json(&mut self, value: &Value) -> Result<()> {
        let item = self.element_from_json("append", value)?;
        self.append(vec![item])
    }

    /// Prepends a single element decoded from JSON.
    pub fn prepend_json(&mut self, value: &Value) -> Result<()> {
        let item = self.element_from_json("prepend", value)?;
        self.prepend(vec![item])
    }

    fn element_from_json(&self, operation: &str, value: &Value) -> Result<Item> {
        match self {
            Item::List(list) => Item::from_json(&list.elem, value),
            other => unsupported(operation, other),
        }
    }

    /// Clears a list or map in place.
    pub fn empty(&mut self) -> Result<()> {
        match self {
            Item::List(list) => {
                list.items.clear();
                Ok(())
            }
            Item::Map(map) => {
                map.clear();
                Ok(())
            }
            other => unsupported("empty", other),
        }
    }

    // ------------- comparison and filtering -------------

    /// Compares this item (on the left) with `other` (on the right).
    ///
    /// Numbers of every kind compare with each other through [`Item::as_f64`].
    /// Strings order lexicographically and match regexps with `~`. Values of
    /// different kinds are simply unequal under `=` and `!=`; any other
    /// operator that is not defined for the pair is an error, never `false`.
    pub fn compare(&self, kind: Comparison, other: &Item) -> Result<bool> {
        if kind == Comparison::RegexpMatch {
            return match (self, other) {
                (Item::String(s), Item::Regexp(re)) => Ok(re.is_match(s)),
                _ => Err(SiphonError::Noop(format!(
                    "~ needs a string on the left and a regexp on the right, got {} and {}",
                    self.type_of(),
                    other.type_of()
                ))),
            };
        }
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            return Ok(kind.holds(a.partial_cmp(&b)));
        }
        match (self, other) {
            (Item::String(a), Item::String(b)) => Ok(kind.holds(Some(a.cmp(b)))),
            (Item::Bool(a), Item::Bool(b)) if kind.is_equality() => Ok(kind.holds(Some(a.cmp(b)))),
            (Item::Regexp(a), Item::Regexp(b)) if kind.is_equality() => {
                Ok(kind.holds(Some(a.as_str().cmp(b.as_str()))))
            }
            (Item::List(_), Item::List(_))
            | (Item::Map(_), Item::Map(_))
            | (Item::Struct(_), Item::Struct(_))
                if kind.is_equality() =>
            {
                let same = self.type_of().equals(&other.type_of()) && digest(self) == digest(other);
                Ok(same == (kind == Comparison::Equal))
            }
            (a, b) if kind.is_equality() && std::mem::discriminant(a) != std::mem::discriminant(b) => {
                Ok(kind == Comparison::NotEqual)
            }
            _ => Err(SiphonError::Noop(format!(
                "{} is not defined between {} and {}",
                kind,
                self.type_of(),
                other.type_of()
            ))),
        }
    }

    /// Whether the value at `path` below this item (the item itself for an
    /// empty path) satisfies the comparison.
    pub fn matches(&self, path: &[String], kind: Comparison, other: &Item) -> Result<bool> {
        let mut target = self;
        for name in path {
            target = target.get_field(name)?;
        }
        target.compare(kind, other)
    }

    /// A new collection of the same shape holding only the elements that
    /// satisfy the comparison. The first failing comparison aborts the filter.
    pub fn filter(&self, path: &[String], kind: Comparison, other: &Item) -> Result<Item> {
        match self {
            Item::List(list) => {
                let mut items = Vec::new();
                for item in &list.items {
                    if item.matches(path, kind, other)? {
                        items.push(item.clone());
                    }
                }
                Ok(Item::List(List { elem: list.elem.clone(), items }))
            }
            Item::Map(map) => Ok(Item::Map(map.retained(|v| v.matches(path, kind, other))?)),
            other => unsupported("filter", other),
        }
    }

    /// Like [`Item::filter`], but returns where the matching elements are
    /// instead of copying them.
    pub fn positions(&self, path: &[String], kind: Comparison, other: &Item) -> Result<Vec<Position>> {
        let mut found = Vec::new();
        match self {
            Item::List(list) => {
                for (i, item) in list.items.iter().enumerate() {
                    if item.matches(path, kind, other)? {
                        found.push(Position::Index(i));
                    }
                }
            }
            Item::Map(map) => {
                for d in map.digests() {
                    if let Some(v) = map.get_by_digest(d) {
                        if v.matches(path, kind, other)? {
                            found.push(Position::Key(*d));
                        }
                    }
                }
            }
            other => return unsupported("filter", other),
        }
        Ok(found)
    }

    pub fn at(&self, position: &Position) -> Result<&Item> {
        let found = match (self, position) {
            (Item::List(list), Position::Index(i)) => list.items.get(*i),
            (Item::Map(map), Position::Key(d)) => map.get_by_digest(d),
            (other, _) => return unsupported("positional access", other),
        };
        found.ok_or_else(|| SiphonError::Index("the selected element no longer exists".into()))
    }

    pub fn at_mut(&mut self, position: &Position) -> Result<&mut Item> {
        let found = match (self, position) {
            (Item::List(list), Position::Index(i)) => list.items.get_mut(*i),
            (Item::Map(map), Position::Key(d)) => map.get_by_digest_mut(d),
            (other, _) => return unsupported("positional access", other),
        };
        found.ok_or_else(|| SiphonError::Index("the selected element no longer exists".into()))
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Item::Bool(b) => write!(f, "{}", b),
            Item::Int(v) => write!(f, "{}", v),
            Item::Int32(v) => write!(f, "{}", v),
            Item::Int16(v) => write!(f, "{}", v),
            Item::Int8(v) => write!(f, "{}", v),
            Item::Uint(v) => write!(f, "{}", v),
            Item::Uint32(v) => write!(f, "{}", v),
            Item::Uint16(v) => write!(f, "{}", v),
            Item::Uint8(v) => write!(f, "{}", v),
            Item::Float(v) => write!(f, "{}", v),
            Item::Float32(v) => write!(f, "{}", v),
            Item::String(s) => write!(f, "{}", Value::String(s.clone())),
            Item::Regexp(re) => write!(f, "/{}/", re.as_str()),
            Item::List(list) => {
                write!(f, "[")?;
                for (i, item) in list.items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if i > DISPLAY_LIMIT {
                        write!(f, "...")?;
                        break;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Item::Map(map) => {
                write!(f, "<")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, ">")
            }
            Item::Struct(s) => {
                write!(f, "{}{{", s.name())?;
                for (i, (name, v)) in s.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

// ------------- List -------------
#[derive(Clone, Debug)]
pub struct List {
    elem: Type,
    items: Vec<Item>,
}

impl List {
    /// A list of `items`, all of which must be of type `elem`.
    pub fn new(elem: Type, items: Vec<Item>) -> Result<Self> {
        let mut list = Self::empty(elem);
        list.append(items)?;
        Ok(list)
    }
    pub fn empty(elem: Type) -> Self {
        Self { elem, items: Vec::new() }
    }
    pub fn len(&self) -> usize {
        self.items.len()
    }
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.items.iter()
    }

    fn check(&self, item: &Item) -> Result<()> {
        let ty = item.type_of();
        if ty.equals(&self.elem) {
            Ok(())
        } else {
            Err(SiphonError::TypeMismatch(format!(
                "expected an element of type {}, got {}",
                self.elem, ty
            )))
        }
    }

    fn append(&mut self, items: Vec<Item>) -> Result<()> {
        for item in &items {
            self.check(item)?;
        }
        self.items.extend(items);
        Ok(())
    }

    fn prepend(&mut self, items: Vec<Item>) -> Result<()> {
        for item in &items {
            self.check(item)?;
        }
        self.items.splice(0..0, items);
        Ok(())
    }

    fn index_of(&self, key: &Item) -> Result<usize> {
        let index = key.as_integer().ok_or_else(|| {
            SiphonError::TypeMismatch(format!("lists are indexed by whole numbers, not {}", key))
        })?;
        usize::try_from(index)
            .ok()
            .filter(|i| *i < self.items.len())
            .ok_or_else(|| {
                SiphonError::Index(format!(
                    "index {} is out of bounds for a list of length {}",
                    index,
                    self.items.len()
                ))
            })
    }
}

// ------------- Struct -------------
#[derive(Clone, Debug)]
pub struct Struct {
    ty: StructType,
    fields: Vec<(String, Item)>,
}

impl Struct {
    pub fn zero(ty: &StructType) -> Result<Self> {
        let fields = ty
            .fields()?
            .into_iter()
            .map(|(name, field_ty)| Ok((name, Item::zero(&field_ty)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { ty: ty.clone(), fields })
    }

    // every declared field must be present and no others
    fn from_json(ty: &StructType, value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| mismatch(&Type::Struct(ty.clone()), value))?;
        let declared = ty.fields()?;
        if let Some(unknown) = object.keys().find(|k| !declared.iter().any(|(name, _)| name == *k)) {
            return Err(SiphonError::Index(format!("struct {} has no field {}", ty.name(), unknown)));
        }
        let mut fields = Vec::with_capacity(declared.len());
        for (name, field_ty) in declared {
            let v = object.get(&name).ok_or_else(|| {
                SiphonError::TypeMismatch(format!("missing field {} for struct {}", name, ty.name()))
            })?;
            let item = Item::from_json(&field_ty, v)?;
            fields.push((name, item));
        }
        Ok(Self { ty: ty.clone(), fields })
    }

    pub fn name(&self) -> &str {
        self.ty.name()
    }
    /// Fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Item)> {
        self.fields.iter().map(|(name, v)| (name, v))
    }

    pub fn get(&self, name: &str) -> Result<&Item> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| self.no_field(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut Item> {
        match self.fields.iter().position(|(n, _)| n == name) {
            Some(i) => Ok(&mut self.fields[i].1),
            None => Err(self.no_field(name)),
        }
    }

    pub fn set(&mut self, name: &str, to: Item) -> Result<()> {
        let declared = self.ty.field_type(name)?.ok_or_else(|| self.no_field(name))?;
        let ty = to.type_of();
        if !ty.equals(&declared) {
            return Err(SiphonError::TypeMismatch(format!(
                "field {} of struct {} is {}, got {}",
                name,
                self.name(),
                declared,
                ty
            )));
        }
        *self.get_mut(name)? = to;
        Ok(())
    }

    fn no_field(&self, name: &str) -> SiphonError {
        SiphonError::Index(format!("struct {} has no field {}", self.name(), name))
    }
}

// ------------- JSON helpers -------------

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

fn mismatch(ty: &Type, value: &Value) -> SiphonError {
    SiphonError::TypeMismatch(format!("expected a value of type {}, got {}", ty, describe(value)))
}

fn integral(v: f64) -> Option<i128> {
    // 2^127 is exactly representable, so the bound check is exact
    (v.is_finite() && v.fract() == 0.0 && v.abs() < 2f64.powi(127)).then(|| v as i128)
}

fn json_integer(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
        .or_else(|| n.as_f64().and_then(integral))
}

fn integer<T: TryFrom<i128>>(ty: &Type, value: &Value) -> Result<T> {
    let Value::Number(n) = value else {
        return Err(mismatch(ty, value));
    };
    let wide = json_integer(n)
        .ok_or_else(|| SiphonError::TypeMismatch(format!("expected a whole number for {}, got {}", ty, n)))?;
    T::try_from(wide)
        .map_err(|_| SiphonError::TypeMismatch(format!("{} is out of range for {}", wide, ty)))
}

fn float_json(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

// JSON object keys are always strings; other key types are written as JSON text
fn object_key(ty: &Type, key: &str) -> Result<Item> {
    match ty {
        Type::String => Ok(Item::String(key.to_owned())),
        Type::Regexp => {
            let pattern = key
                .strip_prefix('/')
                .and_then(|k| k.strip_suffix('/'))
                .unwrap_or(key);
            Item::regexp(pattern)
        }
        _ => {
            let parsed: Value = serde_json::from_str(key).map_err(|_| {
                SiphonError::TypeMismatch(format!("map key {:?} is not a valid {}", key, ty))
            })?;
            Item::from_json(ty, &parsed)
        }
    }
}
