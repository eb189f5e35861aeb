//! Siphon – an embeddable, schema typed, in-memory document store.
//!
//! A schema declares the top level fields of the database and any named
//! structs they use:
//!
//! ```text
//! todos: [todo]
//! owners: <string:person>
//! struct todo { title: string  completed: bool }
//! struct person { name: string  age: int  friends: [person] }
//! ```
//!
//! The resolved schema yields a zero valued root [`item::Item`] (the
//! database). Items are addressed with selectors such as `todos[2].completed`
//! or `owners[age >= 18]`, read back as JSON and mutated from JSON.
//!
//! ## Modules
//! * [`datatype`] – The type model: [`datatype::Type`], struct shapes and their registry.
//! * [`item`] – Runtime values and their per-variant operations.
//! * [`hashmap`] – Maps keyed by arbitrary items through structural digests.
//! * [`schema`] – Schema language parser and resolver.
//! * [`selector`] – Selector language parser and evaluator.
//! * [`database`] – The lock guarded root with query and mutation entry points.
//! * [`interface`] – Actions shared by transports.
//! * [`server`] – HTTP transport (axum).
//! * [`settings`] – Layered configuration.
//!
//! ## Quick Start
//! ```
//! use siphon::database::Database;
//! use serde_json::json;
//! let db = Database::new("todos: [todo]\nstruct todo { title: string done: bool }").unwrap();
//! db.append("todos", &json!({"title": "write docs", "done": false})).unwrap();
//! db.set("todos[0].done", &json!(true)).unwrap();
//! assert_eq!(db.json("todos[title ~ /docs/][0].done").unwrap(), json!(true));
//! ```

pub mod datatype;
pub mod item;
pub mod hashmap;
pub mod schema;
pub mod selector;
pub mod database;
pub mod interface;
pub mod server;
pub mod settings;
pub mod error;

pub use error::{Result, SiphonError};
