//! # path-expr
//!
//! A small `$`-rooted path-expression language for locating and rewriting
//! fields inside [`serde_json::Value`] trees.
//!
//! Supported syntax:
//!
//! | form              | meaning                                     |
//! |-------------------|---------------------------------------------|
//! | `$`               | the root                                    |
//! | `.name` / `.*`    | a named child / any child                   |
//! | `['name']`        | a named child, `\\` and `\'` escaped        |
//! | `['a','b']`       | any of the listed children                  |
//! | `..name`          | `name` at any depth                         |
//! | `[n]`, `[s:e:st]` | sequence positions (negative from the end)  |
//! | `[*]`             | every sequence position                     |
//!
//! ## Quick start
//!
//! ```rust
//! use path_expr::PathExpr;
//! use serde_json::json;
//!
//! let expr = PathExpr::parse("$..password").unwrap();
//! let mut body = json!({"user": {"name": "admin", "password": "hunter2"}});
//! expr.set(&mut body, &json!("[redacted]"));
//! assert_eq!(body, json!({"user": {"name": "admin", "password": "[redacted]"}}));
//! ```

mod parser;
mod path;
mod selector;

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

pub use parser::ParseError;
pub use path::{Path, PathBuilder, Segment};
pub use selector::{ChildName, Selector, Subscript};

/// A parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    source: String,
    selectors: Vec<Selector>,
}

impl PathExpr {
    pub fn parse(expr: &str) -> Result<Self, ParseError> {
        Ok(Self {
            source: expr.to_string(),
            selectors: parser::parse(expr)?,
        })
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `path` is exactly the location described by this expression.
    ///
    /// Selectors consume segments left to right; the path matches when every
    /// selector succeeds and no segments are left over.
    pub fn matches(&self, path: &Path) -> bool {
        let segments = path.segments();
        let mut offset = 0;
        for selector in &self.selectors {
            match selector.consume(&segments[offset..]) {
                Some(taken) => offset += taken,
                None => return false,
            }
        }
        offset == segments.len()
    }

    /// Replace every node of `tree` matched by this expression with `value`.
    ///
    /// The walk is depth-first over object members and then sequence
    /// elements. A replaced node is not descended into.
    pub fn set(&self, tree: &mut Value, value: &Value) {
        let mut path = PathBuilder::new();
        self.walk(tree, value, &mut path);
    }

    fn walk(&self, node: &mut Value, value: &Value, path: &mut PathBuilder) {
        match node {
            Value::Object(members) => {
                for (key, child) in members.iter_mut() {
                    path.push_key(key.as_str());
                    self.visit(child, value, path);
                    path.pop();
                }
            }
            Value::Array(items) => {
                let len = items.len();
                for (index, child) in items.iter_mut().enumerate() {
                    path.push_index(index, len);
                    self.visit(child, value, path);
                    path.pop();
                }
            }
            _ => {}
        }
    }

    fn visit(&self, child: &mut Value, value: &Value, path: &mut PathBuilder) {
        if self.matches(path.current()) {
            *child = value.clone();
        } else {
            self.walk(child, value, path);
        }
    }
}

impl FromStr for PathExpr {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    const MARK: &str = "[redacted]";

    fn redact(expr: &str, mut tree: Value) -> Value {
        PathExpr::parse(expr).unwrap().set(&mut tree, &json!(MARK));
        tree
    }

    // -- matching -------------------------------------------------------------

    #[test]
    fn nested_child_matches_only_its_exact_path() {
        let expr = PathExpr::parse("$.a.b").unwrap();
        let exact = PathBuilder::new().key("a").key("b").build();
        let prefix = PathBuilder::new().key("a").build();
        let sibling = PathBuilder::new().key("a").key("c").build();
        let deeper = PathBuilder::new().key("a").key("b").key("c").build();

        assert!(expr.matches(&exact));
        assert!(!expr.matches(&prefix), "proper prefix must not match");
        assert!(!expr.matches(&sibling), "sibling must not match");
        assert!(!expr.matches(&deeper), "descendant must not match");
        assert!(!expr.matches(&Path::root()));
    }

    #[test]
    fn root_expression_matches_root_path() {
        assert!(PathExpr::parse("$").unwrap().matches(&Path::root()));
    }

    #[test]
    fn recursive_descent_matches_at_any_depth() {
        let expr = PathExpr::parse("$..token").unwrap();
        assert!(expr.matches(&PathBuilder::new().key("token").build()));
        assert!(expr.matches(&PathBuilder::new().key("a").index(3, 4).key("token").build()));
        assert!(!expr.matches(&PathBuilder::new().key("a").build()));
    }

    // -- set ------------------------------------------------------------------

    #[test]
    fn set_replaces_a_top_level_field() {
        let out = redact("$.config", json!({"config": "apiVersion: v1", "type": "x"}));
        assert_eq!(out, json!({"config": MARK, "type": "x"}));
    }

    #[test]
    fn set_does_not_descend_into_replaced_subtree() {
        let out = redact(
            "$..secret",
            json!({"secret": {"secret": "inner"}, "other": {"secret": 1}}),
        );
        assert_eq!(out, json!({"secret": MARK, "other": {"secret": MARK}}));
    }

    #[test]
    fn set_walks_sequences() {
        let out = redact(
            "$.users[*].password",
            json!({"users": [{"password": "a"}, {"password": "b", "name": "n"}]}),
        );
        assert_eq!(
            out,
            json!({"users": [{"password": MARK}, {"password": MARK, "name": "n"}]})
        );
    }

    #[test]
    fn set_with_slices_and_negative_index() {
        let out = redact("$.args[-1]", json!({"args": ["a", "b", "c"]}));
        assert_eq!(out, json!({"args": ["a", "b", MARK]}));

        let out = redact("$.args[0::2]", json!({"args": [1, 2, 3, 4, 5]}));
        assert_eq!(out, json!({"args": [MARK, 2, MARK, 4, MARK]}));
    }

    #[test]
    fn set_subscript_on_non_sequence_is_a_no_op() {
        let tree = json!({"args": {"0": "x"}});
        assert_eq!(redact("$.args[0]", tree.clone()), tree);
    }

    #[test]
    fn set_union_of_keys() {
        let out = redact(
            "$..['token','key']",
            json!({"a": {"token": 1, "key": 2, "keep": 3}}),
        );
        assert_eq!(out, json!({"a": {"token": MARK, "key": MARK, "keep": 3}}));
    }

    #[test]
    fn set_on_scalar_root_is_a_no_op() {
        assert_eq!(redact("$..a", json!("plain")), json!("plain"));
    }

    // -- properties -----------------------------------------------------------

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i32>().prop_map(Value::from),
            "[a-z]{0,4}".prop_map(Value::from),
        ];
        leaf.prop_recursive(4, 48, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[abc]", inner, 0..4)
                    .prop_map(|members| Value::Object(members.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn set_is_idempotent(
            tree in arb_json(),
            expr in prop::sample::select(vec![
                "$.a", "$.a.b", "$..b", "$.*", "$..*", "$.a[*]", "$.c[-1]", "$..['a','c']", "$..a[1:3]",
            ]),
        ) {
            let expr = PathExpr::parse(expr).unwrap();
            let mut once = tree.clone();
            expr.set(&mut once, &json!(MARK));
            let mut twice = once.clone();
            expr.set(&mut twice, &json!(MARK));
            prop_assert_eq!(once, twice);
        }
    }
}
