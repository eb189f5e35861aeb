//! Schema definition language and the resolver that turns a parsed schema
//! into a [`Registry`] of struct shapes.
//!
//! A schema is a list of sections, each either a top level field or a named
//! struct declaration. Struct names may be used before they are declared and
//! a struct may refer to itself, as long as the reference goes through a list
//! or a map (otherwise the struct would have no finite zero value).

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;
use tracing::{debug, info};

use crate::datatype::{ROOT_STRUCT, Registry, StructId, StructType, Type};
use crate::error::{Result, SiphonError};
use crate::hashmap::OtherHasher;

#[derive(Parser)]
#[grammar = "schema.pest"]
struct SchemaParser;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeExpr {
    Named(String),
    List(Box<TypeExpr>),
    Map(Box<TypeExpr>, Box<TypeExpr>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeExpr,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Section {
    Field(FieldDecl),
    Struct(StructDecl),
}

/// A parsed schema, sections in source order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchemaDoc {
    pub sections: Vec<Section>,
}

impl SchemaDoc {
    pub fn fields(&self) -> impl Iterator<Item = &FieldDecl> {
        self.sections.iter().filter_map(|s| match s {
            Section::Field(f) => Some(f),
            Section::Struct(_) => None,
        })
    }

    pub fn structs(&self) -> impl Iterator<Item = &StructDecl> {
        self.sections.iter().filter_map(|s| match s {
            Section::Struct(d) => Some(d),
            Section::Field(_) => None,
        })
    }
}

impl FromStr for SchemaDoc {
    type Err = SiphonError;
    fn from_str(text: &str) -> Result<Self> {
        let mut pairs = SchemaParser::parse(Rule::schema, text).map_err(SiphonError::from_pest)?;
        let schema = pairs.next().ok_or_else(|| malformed("schema"))?;
        let mut sections = Vec::new();
        for pair in schema.into_inner() {
            match pair.as_rule() {
                Rule::field => sections.push(Section::Field(field_decl(pair)?)),
                Rule::struct_decl => sections.push(Section::Struct(struct_decl(pair)?)),
                _ => {}
            }
        }
        Ok(SchemaDoc { sections })
    }
}

fn malformed(what: &str) -> SiphonError {
    SiphonError::Internal(format!("malformed {} in schema parse tree", what))
}

fn struct_decl(pair: Pair<Rule>) -> Result<StructDecl> {
    let mut name = None;
    let mut fields = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = Some(inner.as_str().to_owned()),
            Rule::field => fields.push(field_decl(inner)?),
            _ => {}
        }
    }
    let name = name.ok_or_else(|| malformed("struct declaration"))?;
    Ok(StructDecl { name, fields })
}

fn field_decl(pair: Pair<Rule>) -> Result<FieldDecl> {
    let mut inner = pair.into_inner();
    let name = inner.next().ok_or_else(|| malformed("field"))?.as_str().to_owned();
    let ty = type_expr(inner.next().ok_or_else(|| malformed("field"))?)?;
    Ok(FieldDecl { name, ty })
}

fn type_expr(pair: Pair<Rule>) -> Result<TypeExpr> {
    let inner = pair.into_inner().next().ok_or_else(|| malformed("type"))?;
    match inner.as_rule() {
        Rule::ident => Ok(TypeExpr::Named(inner.as_str().to_owned())),
        Rule::list_type => {
            let elem = inner.into_inner().next().ok_or_else(|| malformed("list type"))?;
            Ok(TypeExpr::List(Box::new(type_expr(elem)?)))
        }
        Rule::map_type => {
            let mut parts = inner.into_inner();
            let key = parts.next().ok_or_else(|| malformed("map type"))?;
            let val = parts.next().ok_or_else(|| malformed("map type"))?;
            Ok(TypeExpr::Map(Box::new(type_expr(key)?), Box::new(type_expr(val)?)))
        }
        _ => Err(malformed("type")),
    }
}

// ------------- Resolution -------------

// a type expression with every name looked up
enum Resolved {
    Primitive(Type),
    List(Box<Resolved>),
    Map(Box<Resolved>, Box<Resolved>),
    Struct(StructId),
}

impl Resolved {
    fn build(&self, handle: &dyn Fn(StructId, &str) -> StructType, names: &[String]) -> Type {
        match self {
            Resolved::Primitive(ty) => ty.clone(),
            Resolved::List(elem) => Type::list(elem.build(handle, names)),
            Resolved::Map(key, val) => Type::map(key.build(handle, names), val.build(handle, names)),
            Resolved::Struct(id) => Type::Struct(handle(*id, &names[id.0])),
        }
    }
}

type Symbols = HashMap<String, StructId, OtherHasher>;

fn lookup(expr: &TypeExpr, symbols: &Symbols) -> Result<Resolved> {
    match expr {
        TypeExpr::Named(name) => {
            if let Some(ty) = Type::primitive(name) {
                Ok(Resolved::Primitive(ty))
            } else if let Some(id) = symbols.get(name) {
                Ok(Resolved::Struct(*id))
            } else {
                Err(SiphonError::UndefinedType(name.clone()))
            }
        }
        TypeExpr::List(elem) => Ok(Resolved::List(Box::new(lookup(elem, symbols)?))),
        TypeExpr::Map(key, val) => Ok(Resolved::Map(
            Box::new(lookup(key, symbols)?),
            Box::new(lookup(val, symbols)?),
        )),
    }
}

fn lookup_fields<'a>(
    owner: &str,
    fields: impl Iterator<Item = &'a FieldDecl>,
    symbols: &Symbols,
) -> Result<Vec<(String, Resolved)>> {
    let mut resolved: Vec<(String, Resolved)> = Vec::new();
    for field in fields {
        if resolved.iter().any(|(name, _)| *name == field.name) {
            return Err(SiphonError::Schema(format!("field {} is declared twice in {}", field.name, owner)));
        }
        resolved.push((field.name.clone(), lookup(&field.ty, symbols)?));
    }
    Ok(resolved)
}

// a struct reaching itself through plain struct fields would be infinitely large
fn check_finite(shapes: &[(String, Vec<(String, Resolved)>)]) -> Result<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        Visiting,
        Done,
    }
    fn visit(id: usize, shapes: &[(String, Vec<(String, Resolved)>)], marks: &mut [Mark]) -> Result<()> {
        match marks[id] {
            Mark::Done => return Ok(()),
            Mark::Visiting => {
                return Err(SiphonError::Schema(format!(
                    "struct {} contains itself without a list or map in between",
                    shapes[id].0
                )));
            }
            Mark::Unvisited => {}
        }
        marks[id] = Mark::Visiting;
        for (_, ty) in &shapes[id].1 {
            if let Resolved::Struct(next) = ty {
                visit(next.0, shapes, marks)?;
            }
        }
        marks[id] = Mark::Done;
        Ok(())
    }
    let mut marks = vec![Mark::Unvisited; shapes.len()];
    for id in 0..shapes.len() {
        visit(id, shapes, &mut marks)?;
    }
    Ok(())
}

/// Resolves a parsed schema into a registry whose root struct holds the top
/// level fields.
pub fn resolve(doc: &SchemaDoc) -> Result<Arc<Registry>> {
    // first pass: every struct name is known before any field is looked at
    let mut symbols = Symbols::default();
    for (i, decl) in doc.structs().enumerate() {
        if Type::primitive(&decl.name).is_some() || decl.name == "any" {
            return Err(SiphonError::Schema(format!("struct {} shadows a primitive type", decl.name)));
        }
        if symbols.insert(decl.name.clone(), StructId(i)).is_some() {
            return Err(SiphonError::Schema(format!("struct {} is declared twice", decl.name)));
        }
    }

    let mut shapes = Vec::with_capacity(symbols.len() + 1);
    for decl in doc.structs() {
        let fields = lookup_fields(&decl.name, decl.fields.iter(), &symbols)?;
        debug!(name = %decl.name, fields = fields.len(), "struct resolved");
        shapes.push((decl.name.clone(), fields));
    }
    check_finite(&shapes)?;

    let root = StructId(shapes.len());
    let top = lookup_fields(ROOT_STRUCT, doc.fields(), &symbols)?;
    shapes.push((ROOT_STRUCT.to_owned(), top));

    let names: Vec<String> = shapes.iter().map(|(name, _)| name.clone()).collect();
    let registry = Registry::new_cyclic(|handle| {
        let built = shapes
            .iter()
            .map(|(name, fields)| {
                let fields = fields
                    .iter()
                    .map(|(field, ty)| (field.clone(), ty.build(handle, &names)))
                    .collect();
                Registry::shape_of(name.clone(), fields)
            })
            .collect();
        (built, symbols, root)
    });
    info!(
        structs = registry.len(),
        fields = registry.shape(root).fields().len(),
        "schema resolved"
    );
    Ok(registry)
}

/// Parses and resolves schema text in one step.
pub fn load(text: &str) -> Result<Arc<Registry>> {
    let doc: SchemaDoc = text.parse()?;
    resolve(&doc)
}
