//! Request vocabulary shared by transports.
//!
//! A request is an [`Action`], a selector string and an optional JSON body.
//! [`Interface`] hands out request ids, runs the action against the shared
//! database and reports how long it took, so a transport only has to deal
//! with decoding and encoding.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::Value;

use crate::database::Database;
use crate::error::{Result, SiphonError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Json,
    Set,
    Unset,
    Append,
    Prepend,
    Key,
    Empty,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::Json,
        Action::Set,
        Action::Unset,
        Action::Append,
        Action::Prepend,
        Action::Key,
        Action::Empty,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Action::Json => "json",
            Action::Set => "set",
            Action::Unset => "unset",
            Action::Append => "append",
            Action::Prepend => "prepend",
            Action::Key => "key",
            Action::Empty => "empty",
        }
    }

    /// Whether the action reads a JSON body.
    pub fn needs_body(&self) -> bool {
        !matches!(self, Action::Json | Action::Empty)
    }

    pub fn is_mutation(&self) -> bool {
        *self != Action::Json
    }

    /// Runs the action. `json` answers with the rendered item, every other
    /// action with `None`.
    pub fn perform(&self, db: &Database, selector: &str, body: Option<&Value>) -> Result<Option<Value>> {
        let null = Value::Null;
        let body = match (self.needs_body(), body) {
            (true, Some(body)) => body,
            (true, None) => {
                return Err(SiphonError::Json(format!("{} needs a JSON body", self)));
            }
            (false, _) => &null,
        };
        match self {
            Action::Json => return db.json(selector).map(Some),
            Action::Set => db.set(selector, body)?,
            Action::Unset => db.unset_key(selector, body)?,
            Action::Append => db.append(selector, body)?,
            Action::Prepend => db.prepend(selector, body)?,
            Action::Key => {
                let KeyValue { key, value } = KeyValue::deserialize(body)?;
                db.set_key(selector, &key, &value)?
            }
            Action::Empty => db.empty(selector)?,
        }
        Ok(None)
    }
}

impl FromStr for Action {
    type Err = SiphonError;
    fn from_str(s: &str) -> Result<Self> {
        Action::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| SiphonError::Noop(format!("unknown action {}", s)))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Body of the `key` action.
#[derive(Deserialize)]
struct KeyValue {
    key: Value,
    value: Value,
}

/// Opaque request identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

/// What came back from a submitted request.
#[derive(Debug)]
pub struct Outcome {
    pub id: RequestId,
    pub action: Action,
    pub elapsed: Duration,
    pub result: Result<Option<Value>>,
}

/// Shared entry point for transports.
pub struct Interface {
    db: Arc<Database>,
    next_id: AtomicU64,
}

impl Interface {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db, next_id: AtomicU64::new(0) }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    fn allocate_id(&self) -> RequestId {
        RequestId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Runs a request to completion on the calling thread.
    pub fn submit(&self, action: Action, selector: &str, body: Option<&Value>) -> Outcome {
        let id = self.allocate_id();
        let started = Instant::now();
        let result = action.perform(&self.db, selector, body);
        Outcome { id, action, elapsed: started.elapsed(), result }
    }
}
