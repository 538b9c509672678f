//! File trees as values.
//!
//! A tree encodes as a list of `[nameString, child]` pairs sorted by name;
//! a file is a blob. Because the encoding is itself a value, a tree's hash is
//! a function of its sorted entries and nothing else.

use bytes::Bytes;
use thiserror::Error;

use crate::pine::value::{Value, string_from_value, string_value};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeNode {
    Blob(Bytes),
    Tree(Vec<(String, TreeNode)>),
}

#[derive(Debug, Error)]
pub enum TreeParseError {
    #[error("tree entry is not a [name, child] pair")]
    EntryNotAPair,
    #[error("tree entry name is not a string value")]
    NameNotAString,
    #[error("failed to parse child '{name}': {source}")]
    Child {
        name: String,
        #[source]
        source: Box<TreeParseError>,
    },
}

impl TreeNode {
    pub fn blob(bytes: impl Into<Bytes>) -> Self {
        TreeNode::Blob(bytes.into())
    }

    pub fn tree(entries: Vec<(impl Into<String>, TreeNode)>) -> Self {
        TreeNode::Tree(
            entries
                .into_iter()
                .map(|(name, child)| (name.into(), child))
                .collect(),
        )
    }

    /// Look up a direct child by name.
    pub fn get(&self, name: &str) -> Option<&TreeNode> {
        match self {
            TreeNode::Blob(_) => None,
            TreeNode::Tree(entries) => entries
                .iter()
                .find(|(entry_name, _)| entry_name == name)
                .map(|(_, child)| child),
        }
    }

    pub fn entries(&self) -> &[(String, TreeNode)] {
        match self {
            TreeNode::Blob(_) => &[],
            TreeNode::Tree(entries) => entries,
        }
    }

    /// Encode as a value, entries sorted by name at every level.
    pub fn to_value(&self) -> Value {
        match self {
            TreeNode::Blob(bytes) => Value::Blob(bytes.clone()),
            TreeNode::Tree(entries) => {
                let mut sorted: Vec<&(String, TreeNode)> = entries.iter().collect();
                sorted.sort_by(|a, b| a.0.cmp(&b.0));
                Value::list(
                    sorted
                        .into_iter()
                        .map(|(name, child)| {
                            Value::list(vec![string_value(name), child.to_value()])
                        })
                        .collect(),
                )
            }
        }
    }

    /// Parse a value as a tree; the inverse of [`TreeNode::to_value`] on
    /// well-formed encodings.
    pub fn from_value(value: &Value) -> Result<Self, TreeParseError> {
        match value {
            Value::Blob(bytes) => Ok(TreeNode::Blob(bytes.clone())),
            Value::List(items) => {
                let mut entries = Vec::with_capacity(items.len());
                for item in items.iter() {
                    let pair = item.as_list().ok_or(TreeParseError::EntryNotAPair)?;
                    let [name, child] = pair else {
                        return Err(TreeParseError::EntryNotAPair);
                    };
                    let name = string_from_value(name).ok_or(TreeParseError::NameNotAString)?;
                    let child = TreeNode::from_value(child).map_err(|source| {
                        TreeParseError::Child {
                            name: name.clone(),
                            source: Box::new(source),
                        }
                    })?;
                    entries.push((name, child));
                }
                Ok(TreeNode::Tree(entries))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_value_roundtrip() {
        let tree = TreeNode::tree(vec![
            ("b.txt", TreeNode::blob(b"bee".as_ref())),
            (
                "a",
                TreeNode::tree(vec![("inner", TreeNode::blob(b"x".as_ref()))]),
            ),
        ]);
        let value = tree.to_value();
        let parsed = TreeNode::from_value(&value).expect("parse");
        // entries come back sorted
        assert_eq!(parsed.entries()[0].0, "a");
        assert_eq!(parsed.entries()[1].0, "b.txt");
        assert_eq!(parsed.get("b.txt"), Some(&TreeNode::blob(b"bee".as_ref())));
        assert_eq!(parsed.to_value(), value);
    }

    #[test]
    fn tree_hash_ignores_entry_order() {
        let forward = TreeNode::tree(vec![
            ("a", TreeNode::blob(b"1".as_ref())),
            ("b", TreeNode::blob(b"2".as_ref())),
        ]);
        let backward = TreeNode::tree(vec![
            ("b", TreeNode::blob(b"2".as_ref())),
            ("a", TreeNode::blob(b"1".as_ref())),
        ]);
        assert_eq!(forward.to_value().hash(), backward.to_value().hash());
    }

    #[test]
    fn parse_rejects_malformed_entries() {
        let not_a_pair = Value::list(vec![Value::list(vec![string_value("only-name")])]);
        assert!(matches!(
            TreeNode::from_value(&not_a_pair),
            Err(TreeParseError::EntryNotAPair)
        ));

        let bad_name = Value::list(vec![Value::list(vec![
            Value::blob(vec![1u8, 2]),
            Value::blob(vec![3u8]),
        ])]);
        assert!(matches!(
            TreeNode::from_value(&bad_name),
            Err(TreeParseError::NameNotAString)
        ));
    }

    #[test]
    fn empty_list_is_an_empty_tree() {
        let parsed = TreeNode::from_value(&Value::empty_list()).expect("parse");
        assert_eq!(parsed, TreeNode::Tree(Vec::new()));
    }
}
