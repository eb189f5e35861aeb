//! Selectors address an item inside the database.
//!
//! A selector is a dot separated list of clauses. Each clause names a struct
//! field and may be followed by bracketed filters: a literal indexes a list
//! or looks up a map key, a comparison narrows a list or map to the elements
//! satisfying it. Evaluation walks the clauses in order and stops at the
//! first failure.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

use crate::error::{Result, SiphonError};
use crate::item::{unsupported, Comparison, Item, Position};

#[derive(Parser)]
#[grammar = "selector.pest"]
struct SelectorParser;

#[derive(Clone, Debug)]
pub enum Filter {
    /// `[2]`, `["key"]`
    Index(Item),
    /// `[age >= 18]`, `[address.city = "Oslo"]`, `[~ /^A/]`
    Comparison {
        path: Vec<String>,
        op: Comparison,
        value: Item,
    },
}

#[derive(Clone, Debug)]
pub struct Clause {
    pub ident: String,
    pub filters: Vec<Filter>,
}

#[derive(Clone, Debug, Default)]
pub struct Selector {
    pub clauses: Vec<Clause>,
}

impl FromStr for Selector {
    type Err = SiphonError;
    fn from_str(text: &str) -> Result<Self> {
        let mut pairs = SelectorParser::parse(Rule::selector, text).map_err(SiphonError::from_pest)?;
        let selector = pairs.next().ok_or_else(|| malformed("selector"))?;
        let clauses = selector
            .into_inner()
            .filter(|p| p.as_rule() == Rule::clause)
            .map(clause)
            .collect::<Result<Vec<_>>>()?;
        Ok(Selector { clauses })
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", clause.ident)?;
            for filter in &clause.filters {
                match filter {
                    Filter::Index(key) => write!(f, "[{}]", key)?,
                    Filter::Comparison { path, op, value } if path.is_empty() => {
                        write!(f, "[{} {}]", op, value)?
                    }
                    Filter::Comparison { path, op, value } => {
                        write!(f, "[{} {} {}]", path.join("."), op, value)?
                    }
                }
            }
        }
        Ok(())
    }
}

fn malformed(what: &str) -> SiphonError {
    SiphonError::Internal(format!("malformed {} in selector parse tree", what))
}

fn clause(pair: Pair<Rule>) -> Result<Clause> {
    let mut inner = pair.into_inner();
    let ident = inner.next().ok_or_else(|| malformed("clause"))?.as_str().to_owned();
    let mut filters = Vec::new();
    for filter in inner {
        match filter.as_rule() {
            Rule::literal => filters.push(Filter::Index(literal(filter)?)),
            Rule::comparison => filters.push(comparison(filter)?),
            _ => return Err(malformed("filter")),
        }
    }
    Ok(Clause { ident, filters })
}

fn comparison(pair: Pair<Rule>) -> Result<Filter> {
    let mut path = Vec::new();
    let mut op = None;
    let mut value = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::path => path = inner.into_inner().map(|p| p.as_str().to_owned()).collect(),
            Rule::operator => op = Some(inner.as_str().parse()?),
            Rule::literal => value = Some(literal(inner)?),
            _ => return Err(malformed("comparison")),
        }
    }
    match (op, value) {
        (Some(op), Some(value)) => Ok(Filter::Comparison { path, op, value }),
        _ => Err(malformed("comparison")),
    }
}

fn literal(pair: Pair<Rule>) -> Result<Item> {
    let (line, col) = pair.line_col();
    let token = pair.into_inner().next().ok_or_else(|| malformed("literal"))?;
    let parse_error = |message: String| SiphonError::Parse {
        message,
        line: Some(line),
        col: Some(col),
    };
    match token.as_rule() {
        Rule::number => {
            let text = token.as_str();
            if text.contains('.') {
                text.parse::<f64>()
                    .map(Item::Float)
                    .map_err(|e| parse_error(format!("bad number {}: {}", text, e)))
            } else if let Ok(v) = text.parse::<i64>() {
                Ok(Item::Int(v))
            } else {
                text.parse::<u64>()
                    .map(Item::Uint)
                    .map_err(|e| parse_error(format!("bad number {}: {}", text, e)))
            }
        }
        Rule::dq_string | Rule::sq_string => {
            let content = token.into_inner().next().map(|c| c.as_str()).unwrap_or("");
            Ok(Item::String(unescape(content)))
        }
        Rule::regexp => {
            let content = token.into_inner().next().map(|c| c.as_str()).unwrap_or("");
            let pattern = content.replace("\\/", "/");
            Item::regexp(&pattern).map_err(|e| parse_error(e.to_string()))
        }
        _ => Err(malformed("literal")),
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

// ------------- Evaluation -------------

// an index literal decoded into the key type of the collection it indexes
fn coerce_key(target: &Item, literal: &Item) -> Result<Item> {
    if let Item::Regexp(_) = literal {
        return unsupported("indexing", literal);
    }
    match target {
        Item::Map(map) => Item::from_json(map.key_type(), &literal.to_json()),
        _ => Ok(literal.clone()),
    }
}

fn step<'a, F>(current: Cow<'a, Item>, f: F) -> Result<Cow<'a, Item>>
where
    F: for<'b> FnOnce(&'b Item) -> Result<&'b Item>,
{
    match current {
        Cow::Borrowed(item) => Ok(Cow::Borrowed(f(item)?)),
        Cow::Owned(item) => Ok(Cow::Owned(f(&item)?.clone())),
    }
}

// where a mutation is pointing while its selector is walked
enum Cursor<'a> {
    Item(&'a mut Item),
    // positions inside a collection left by one or more comparison filters
    View(&'a mut Item, Vec<Position>),
}

impl Selector {
    /// Whether this is the empty selector, which addresses the whole database.
    pub fn is_root(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Resolves the selector for reading. Comparison filters produce new
    /// collections, so the result is borrowed from `root` only when no
    /// filter was involved.
    pub fn evaluate<'a>(&self, root: &'a Item) -> Result<Cow<'a, Item>> {
        let mut current = Cow::Borrowed(root);
        for clause in &self.clauses {
            current = step(current, |item| item.get_field(&clause.ident))?;
            for filter in &clause.filters {
                current = match filter {
                    Filter::Index(literal) => {
                        let key = coerce_key(&current, literal)?;
                        step(current, |item| item.get_key(&key))?
                    }
                    Filter::Comparison { path, op, value } => {
                        Cow::Owned(current.filter(path, *op, value)?)
                    }
                };
            }
        }
        Ok(current)
    }

    /// Resolves the selector for writing. Filters narrow a view over the
    /// real collection, so a later index reaches the stored element rather
    /// than a copy; a selector that ends on a view cannot be mutated.
    pub fn evaluate_mut<'a>(&self, root: &'a mut Item) -> Result<&'a mut Item> {
        let mut cursor = Cursor::Item(root);
        for clause in &self.clauses {
            cursor = match cursor {
                Cursor::Item(item) => Cursor::Item(item.get_field_mut(&clause.ident)?),
                Cursor::View(collection, _) => return unsupported("field access", collection),
            };
            for filter in &clause.filters {
                cursor = match (cursor, filter) {
                    (Cursor::Item(item), Filter::Index(literal)) => {
                        let key = coerce_key(item, literal)?;
                        Cursor::Item(item.get_key_mut(&key)?)
                    }
                    (Cursor::Item(item), Filter::Comparison { path, op, value }) => {
                        let positions = item.positions(path, *op, value)?;
                        Cursor::View(item, positions)
                    }
                    (Cursor::View(collection, positions), Filter::Index(literal)) => {
                        let position = view_position(collection, &positions, literal)?;
                        Cursor::Item(collection.at_mut(&position)?)
                    }
                    (Cursor::View(collection, positions), Filter::Comparison { path, op, value }) => {
                        let mut kept = Vec::with_capacity(positions.len());
                        for position in positions {
                            if collection.at(&position)?.matches(path, *op, value)? {
                                kept.push(position);
                            }
                        }
                        Cursor::View(collection, kept)
                    }
                };
            }
        }
        match cursor {
            Cursor::Item(item) => Ok(item),
            Cursor::View(collection, _) => Err(SiphonError::Noop(format!(
                "cannot modify a filtered view of a {}; select one element with an index",
                collection.type_of()
            ))),
        }
    }
}

// indexing a view addresses the n:th match of a list, or a matching map key
fn view_position(collection: &Item, positions: &[Position], literal: &Item) -> Result<Position> {
    match collection {
        Item::Map(map) => {
            let key = coerce_key(collection, literal)?;
            let digest = map.digest_of(&key)?;
            positions
                .iter()
                .find(|p| **p == Position::Key(digest))
                .copied()
                .ok_or_else(|| SiphonError::Index(format!("no such key: {}", key)))
        }
        _ => {
            let index = literal.as_integer().ok_or_else(|| {
                SiphonError::TypeMismatch(format!("lists are indexed by whole numbers, not {}", literal))
            })?;
            usize::try_from(index)
                .ok()
                .and_then(|i| positions.get(i))
                .copied()
                .ok_or_else(|| {
                    SiphonError::Index(format!(
                        "index {} is out of bounds for a view of length {}",
                        literal,
                        positions.len()
                    ))
                })
        }
    }
}
