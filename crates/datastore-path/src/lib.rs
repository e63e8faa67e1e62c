//! Path expressions for the datastore node graph.
//!
//! Paths are slash-delimited addresses such as `$people/42/name`,
//! `$albums/*/title`, `photo/@width` or `$albums/count()`. They are compiled
//! once, interned for the lifetime of the thread, and evaluated against any
//! node graph implementing [`PathTarget`].
//!
//! # Example
//!
//! ```
//! use datastore_path::{DataPath, ValueCursor};
//! use serde_json::json;
//!
//! let doc = json!({
//!     "albums": [
//!         {"id": "a1", "title": "Lisbon"},
//!         {"id": "a2", "title": "Porto"}
//!     ]
//! });
//! let root = ValueCursor::new(&doc);
//!
//! let count = DataPath::compile("$albums/count()").unwrap();
//! assert_eq!(count.get(&root), Some(json!(2)));
//!
//! let titles = DataPath::compile("$albums/*/title").unwrap();
//! let values: Vec<_> = titles
//!     .get_node_list(&root, false)
//!     .iter()
//!     .map(|node| node.get().clone())
//!     .collect();
//! assert_eq!(values, vec![json!("Lisbon"), json!("Porto")]);
//! ```

mod types;
pub use types::*;

mod parser;
pub use parser::{PathParser, PathSyntaxError};

mod expr;
pub use expr::{DataPath, MissingNode};

mod target;
pub use target::{PathTarget, ValueCursor};

mod util;
pub use util::{
    ancestors, attribute_key, child_path, element_id, element_name, id_string, is_absolute,
    is_composite, parent_path, parse_index, parse_position, position_name, split_path,
};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::rc::Rc;

    #[test]
    fn test_compile_interns() {
        let a = DataPath::compile("x/y/z").unwrap();
        let b = DataPath::compile("x/y/z").unwrap();
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_compile_distinguishes_exact_text() {
        let a = DataPath::compile("x/y").unwrap();
        let b = DataPath::compile("x/y?").unwrap();
        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(a.node_path(), b.node_path());
    }

    #[test]
    fn test_parent_and_rest_are_memoized() {
        let path = DataPath::compile("$people/42/name").unwrap();
        let parent = path.parent().unwrap();
        let rest = path.rest().unwrap();
        assert_eq!(parent.as_str(), "$people/42");
        assert_eq!(rest.as_str(), "42/name");
        assert!(Rc::ptr_eq(&parent, &path.parent().unwrap()));
        assert!(Rc::ptr_eq(&rest, &path.rest().unwrap()));
        assert!(Rc::ptr_eq(&parent, &DataPath::compile("$people/42").unwrap()));
    }

    #[test]
    fn test_single_segment_has_no_parent_or_rest() {
        let path = DataPath::compile("$people").unwrap();
        assert!(path.parent().is_none());
        assert!(path.rest().is_none());
        assert!(path.is_absolute());
        assert_eq!(path.source_name(), Some("people"));
    }

    #[test]
    fn test_rest_keeps_optional_parent_drops_it() {
        let path = DataPath::compile("a/b/c?").unwrap();
        assert_eq!(path.rest().unwrap().as_str(), "b/c?");
        assert_eq!(path.parent().unwrap().as_str(), "a/b");
    }

    #[test]
    fn test_parent_drops_function() {
        let path = DataPath::compile("a/b/count()").unwrap();
        assert_eq!(path.function(), Some(PathFunction::Count));
        assert_eq!(path.parent().unwrap().as_str(), "a");
        assert_eq!(path.node_path(), "a/b");
    }

    #[test]
    fn test_get_scalar() {
        let doc = json!({"a": {"b": 42}});
        let path = DataPath::compile("a/b").unwrap();
        assert_eq!(path.get(&ValueCursor::new(&doc)), Some(json!(42)));
    }

    #[test]
    fn test_get_missing_is_none() {
        let doc = json!({"a": {"b": 42}});
        let path = DataPath::compile("a/missing/deeper").unwrap();
        assert_eq!(path.get(&ValueCursor::new(&doc)), None);
    }

    #[test]
    fn test_absolute_ignores_given_root() {
        let doc = json!({"people": {"ada": {"age": 36}}, "other": {}});
        let root = ValueCursor::new(&doc);
        let other = DataPath::compile("other").unwrap().get_node(&root, false).unwrap();
        let path = DataPath::compile("$people/ada/age").unwrap();
        assert_eq!(path.get(&other), Some(json!(36)));
    }

    #[test]
    fn test_functions() {
        let doc = json!({"people": [{"id": 7, "name": "Ada"}, {"id": 9, "name": "Grace"}]});
        let root = ValueCursor::new(&doc);
        assert_eq!(DataPath::compile("$people/count()").unwrap().get(&root), Some(json!(2)));
        assert_eq!(DataPath::compile("$people/9/name()").unwrap().get(&root), Some(json!("9")));
        assert_eq!(DataPath::compile("$people/9/position()").unwrap().get(&root), Some(json!(1)));
        assert_eq!(DataPath::compile("$people/[0]/name").unwrap().get(&root), Some(json!("Ada")));
    }

    #[test]
    fn test_count_of_missing_is_zero() {
        let doc = json!({});
        let path = DataPath::compile("$nothing/count()").unwrap();
        assert_eq!(path.get(&ValueCursor::new(&doc)), Some(json!(0)));
    }

    #[test]
    fn test_attributes() {
        let doc = json!({"photo": {"width": 640, "height": 480, "tags": ["a"]}});
        let root = ValueCursor::new(&doc);
        assert_eq!(DataPath::compile("photo/@width").unwrap().get(&root), Some(json!(640)));
        let attrs = DataPath::compile("photo/@*").unwrap().get_node_list(&root, false);
        let names: Vec<String> = attrs.iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["width", "height"]);
    }

    #[test]
    fn test_wildcard_fans_out() {
        let doc = json!({"albums": [
            {"photos": [{"t": 1}, {"t": 2}]},
            {"photos": [{"t": 3}]}
        ]});
        let root = ValueCursor::new(&doc);
        let path = DataPath::compile("albums/*/photos").unwrap();
        let values: Vec<_> = path
            .get_node_list(&root, false)
            .iter()
            .map(|n| n.get().clone())
            .collect();
        assert_eq!(values, vec![json!({"t": 1}), json!({"t": 2}), json!({"t": 3})]);
    }

    #[test]
    fn test_require_node() {
        let doc = json!({"a": 1});
        let root = ValueCursor::new(&doc);
        assert!(DataPath::compile("a").unwrap().require_node(&root).unwrap().is_some());
        assert!(DataPath::compile("b?").unwrap().require_node(&root).unwrap().is_none());
        let err = DataPath::compile("b").unwrap().require_node(&root).unwrap_err();
        assert_eq!(err.to_string(), "No node at 'b'");
    }
}
