//! An in-process, path-addressed data store.
//!
//! Data lives in named sources (`$people`, `$albums`) holding JSON values,
//! XML documents, or remote payloads fetched on first use. Nodes are
//! addressed with [`DataPath`] expressions and observed through listeners
//! registered on paths; a change at `$people/42/name` reaches listeners on
//! that path and on any ancestor whose scope covers it.
//!
//! # Example
//!
//! ```
//! use datastore::{Scope, Store};
//! use serde_json::json;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let store = Store::new();
//! store
//!     .add_json("albums", json!([
//!         {"id": "a1", "title": "Lisbon", "photos": []},
//!         {"id": "a2", "title": "Porto", "photos": []}
//!     ]))
//!     .unwrap();
//!
//! let changes = Rc::new(Cell::new(0));
//! let counter = changes.clone();
//! store
//!     .register_pattern(move |_: &str, _: &str| counter.set(counter.get() + 1), "$albums/...", "grid")
//!     .unwrap();
//!
//! store.set("$albums/a2/title", json!("Porto at night")).unwrap();
//! store
//!     .node("$albums/a1/photos", false)
//!     .unwrap()
//!     .unwrap()
//!     .append(json!({"id": "p1"}))
//!     .unwrap();
//!
//! assert_eq!(changes.get(), 2);
//! assert_eq!(store.value("$albums/count()").unwrap(), Some(json!(2)));
//! assert_eq!(store.value("$albums/a1/photos/count()").unwrap(), Some(json!(1)));
//! ```

pub mod cli;
mod config;
mod error;
mod listener;
mod node;
mod remote;
mod store;

pub use config::StoreConfig;
pub use error::{ConfigError, LoadError, StoreError};
pub use listener::{Listener, Scope, Subscription};
pub use node::{DataNode, NodeType};
pub use remote::{
    Envelope, FetchCallback, FetchRequest, HttpTransport, LoadState, NullTransport,
    QueuedTransport, RemoteConfig, Transport, TransportKind,
};
pub use store::{Store, StoreOptions};

pub use datastore_path::{DataPath, MissingNode, PathFunction, PathSyntaxError, Segment};
