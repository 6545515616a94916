//! Property-based tests for route path resolution.
//!
//! These tests use proptest to generate random route paths and verify that
//! resolution invariants hold for all of them.

#[cfg(test)]
mod proptest_tests {
    use crate::error::Error;
    use crate::path::{resource_logical_id, PathResolver};
    use proptest::prelude::*;

    /// A literal segment made only of lowercase letters and digits.
    fn literal() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9]{0,8}"
    }

    /// A literal or `{param}` segment.
    fn segment() -> impl Strategy<Value = String> {
        prop_oneof![
            3 => literal(),
            1 => "[a-z][a-zA-Z0-9]{0,6}".prop_map(|p| format!("{{{}}}", p)),
        ]
    }

    fn path() -> impl Strategy<Value = String> {
        prop::collection::vec(segment(), 0..6).prop_map(|segments| segments.join("/"))
    }

    proptest! {
        /// Property: resolving the same path twice yields identical ids and fragments
        #[test]
        fn resolve_is_idempotent(input in path()) {
            let mut resolver = PathResolver::new();
            match resolver.resolve(&input) {
                Ok(first) => {
                    let second = resolver.resolve(&input).unwrap();
                    prop_assert_eq!(first, second);
                }
                // Two segments of one generated path may clash with each other
                Err(Error::PathConflict { .. }) | Err(Error::FragmentConflict { .. }) => {}
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
        }

        /// Property: every node gets exactly one routing resource named after it
        #[test]
        fn every_node_has_a_resource(input in path()) {
            let mut resolver = PathResolver::new();
            if let Ok(resolved) = resolver.resolve(&input) {
                for node in &resolved.nodes {
                    let id = resource_logical_id(&node.logical_name);
                    prop_assert!(resolved.fragment.contains(&id));
                }
                prop_assert!(resolved.fragment.len() <= resolved.nodes.len());
            }
        }

        /// Property: the terminal name is the last non-empty segment's name
        #[test]
        fn terminal_matches_last_node(input in path()) {
            let mut resolver = PathResolver::new();
            if let Ok(resolved) = resolver.resolve(&input) {
                let expected = resolved.nodes.last().map(|n| n.logical_name.clone());
                prop_assert_eq!(resolved.terminal().map(str::to_string), expected);
                prop_assert_eq!(resolved.nodes.is_empty(), input.is_empty());
            }
        }

        /// Property: inserting punctuation that cleans to the same identifier conflicts
        #[test]
        fn punctuation_variants_conflict(
            head in "[a-z]{1,5}",
            tail in "[a-z0-9]{1,5}",
            first in "[-_.~]",
            second in "[-_.~]",
        ) {
            prop_assume!(first != second);
            let mut resolver = PathResolver::new();
            resolver.resolve(&format!("{}{}{}", head, first, tail)).unwrap();
            let result = resolver.resolve(&format!("root/{}{}{}", head, second, tail));
            let is_conflict = matches!(result, Err(Error::PathConflict { .. }));
            prop_assert!(is_conflict);
        }

        /// Property: every parent index points at an earlier node
        #[test]
        fn parents_point_backwards(input in path()) {
            let mut resolver = PathResolver::new();
            if let Ok(resolved) = resolver.resolve(&input) {
                for (index, node) in resolved.nodes.iter().enumerate() {
                    match node.parent {
                        Some(parent) => prop_assert_eq!(parent + 1, index),
                        None => prop_assert_eq!(index, 0),
                    }
                }
            }
        }
    }
}
