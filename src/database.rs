//! The database: a resolved schema plus the root item it describes.
//!
//! The root sits behind a single reader/writer lock. Reads resolve their
//! selector and copy the result out under the read lock; mutations resolve
//! and apply under the write lock, so no other request can slip in between
//! finding the target and changing it.

use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::debug;

use crate::datatype::{Registry, Type};
use crate::error::Result;
use crate::item::Item;
use crate::schema;
use crate::selector::Selector;

#[derive(Debug)]
pub struct Database {
    registry: Arc<Registry>,
    root: RwLock<Item>,
}

impl Database {
    /// Builds a zero valued database from schema text.
    pub fn new(schema_text: &str) -> Result<Self> {
        Self::from_registry(schema::load(schema_text)?)
    }

    pub fn from_registry(registry: Arc<Registry>) -> Result<Self> {
        let root = Item::zero(&registry.root())?;
        Ok(Self { registry, root: RwLock::new(root) })
    }

    pub fn root_type(&self) -> Type {
        self.registry.root()
    }

    /// A copy of the item addressed by `selector`.
    pub fn query(&self, selector: &str) -> Result<Item> {
        let selector: Selector = selector.parse()?;
        self.query_selector(&selector)
    }

    pub fn query_selector(&self, selector: &Selector) -> Result<Item> {
        debug!(%selector, "query");
        let root = self.root.read()?;
        Ok(selector.evaluate(&root)?.into_owned())
    }

    /// The JSON rendering of the item addressed by `selector`.
    pub fn json(&self, selector: &str) -> Result<Value> {
        let selector: Selector = selector.parse()?;
        debug!(%selector, "json");
        let root = self.root.read()?;
        Ok(selector.evaluate(&root)?.to_json())
    }

    /// Replaces the addressed item with a value decoded from JSON.
    pub fn set(&self, selector: &str, value: &Value) -> Result<()> {
        self.mutate("set", selector, |target| target.set_json(value))
    }

    pub fn append(&self, selector: &str, value: &Value) -> Result<()> {
        self.mutate("append", selector, |target| target.append_json(value))
    }

    pub fn prepend(&self, selector: &str, value: &Value) -> Result<()> {
        self.mutate("prepend", selector, |target| target.prepend_json(value))
    }

    pub fn set_key(&self, selector: &str, key: &Value, value: &Value) -> Result<()> {
        self.mutate("key", selector, |target| target.set_key_json(key, value))
    }

    pub fn unset_key(&self, selector: &str, key: &Value) -> Result<()> {
        self.mutate("unset", selector, |target| target.unset_key_json(key).map(|_| ()))
    }

    pub fn empty(&self, selector: &str) -> Result<()> {
        self.mutate("empty", selector, Item::empty)
    }

    fn mutate<F>(&self, action: &str, selector: &str, apply: F) -> Result<()>
    where
        F: FnOnce(&mut Item) -> Result<()>,
    {
        let selector: Selector = selector.parse()?;
        debug!(action, %selector, "mutation");
        let mut root = self.root.write()?;
        let target = selector.evaluate_mut(&mut root)?;
        apply(target)
    }
}
