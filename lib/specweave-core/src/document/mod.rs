//! In-memory document tree.
//!
//! A document is a tree of [`Node`]s: mappings (insertion ordered), sequences and scalars.
//! Key order is kept from decoding to encoding so that bundling the same inputs always
//! produces the same bytes.

use indexmap::IndexMap;

mod serialize;

/// The key that marks a mapping as a pointer node.
pub const REF_KEY: &str = "$ref";

/// An insertion-ordered mapping with unique keys.
///
/// Inserting an existing key replaces the value and keeps the key at its original position.
pub type Mapping = IndexMap<String, Node>;

/// A node of a document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Ordered key/value pairs.
    Mapping(Mapping),
    /// Ordered list of nodes.
    Sequence(Vec<Node>),
    /// A leaf value.
    Scalar(Scalar),
}

/// A leaf value, tagged with its literal type.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// `null` / `~`
    Null,
    /// `true` / `false`
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// String.
    String(String),
}

impl Node {
    /// Creates an empty mapping node.
    pub fn mapping() -> Self {
        Self::Mapping(Mapping::new())
    }

    /// Creates a pointer node `{ "$ref": target }`.
    pub fn reference(target: impl Into<String>) -> Self {
        let mut mapping = Mapping::with_capacity(1);
        mapping.insert(REF_KEY.to_string(), Node::from(target.into()));
        Self::Mapping(mapping)
    }

    /// Returns the pointer target if this node is a pointer node.
    ///
    /// A pointer node is a mapping holding a `$ref` key with a string value.
    pub fn as_reference(&self) -> Option<&str> {
        match self {
            Self::Mapping(mapping) => match mapping.get(REF_KEY) {
                Some(Self::Scalar(Scalar::String(target))) => Some(target),
                _ => None,
            },
            Self::Sequence(_) | Self::Scalar(_) => None,
        }
    }

    /// Returns the inner mapping, if any.
    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Mapping(mapping) => Some(mapping),
            Self::Sequence(_) | Self::Scalar(_) => None,
        }
    }

    /// Returns the inner mapping mutably, if any.
    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Self::Mapping(mapping) => Some(mapping),
            Self::Sequence(_) | Self::Scalar(_) => None,
        }
    }

    /// Returns the inner sequence, if any.
    pub fn as_sequence(&self) -> Option<&[Node]> {
        match self {
            Self::Sequence(items) => Some(items),
            Self::Mapping(_) | Self::Scalar(_) => None,
        }
    }

    /// Returns the string value of a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::String(value)) => Some(value),
            Self::Mapping(_) | Self::Sequence(_) | Self::Scalar(_) => None,
        }
    }

    /// Looks up a key when this node is a mapping.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_mapping().and_then(|mapping| mapping.get(key))
    }

    /// Walks (and creates if missing) nested mappings along `path`.
    ///
    /// Returns `None` when a node on the way exists but is not a plain mapping. Pointer
    /// nodes count as such: keys added next to a `$ref` would be ignored.
    pub fn ensure_mapping_at<S: AsRef<str>>(&mut self, path: &[S]) -> Option<&mut Mapping> {
        if self.as_reference().is_some() {
            return None;
        }
        let mut current = self.as_mapping_mut()?;
        for key in path {
            let child = current
                .entry(key.as_ref().to_string())
                .or_insert_with(Node::mapping);
            if child.as_reference().is_some() {
                return None;
            }
            current = child.as_mapping_mut()?;
        }
        Some(current)
    }

    /// Visits this node and all its descendants, pre-order.
    pub fn visit(&self, visitor: &mut impl FnMut(&Node)) {
        visitor(self);
        match self {
            Self::Mapping(mapping) => {
                for child in mapping.values() {
                    child.visit(visitor);
                }
            }
            Self::Sequence(items) => {
                for child in items {
                    child.visit(visitor);
                }
            }
            Self::Scalar(_) => {}
        }
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::Scalar(Scalar::Null)
    }
}

impl From<Scalar> for Node {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

impl From<Mapping> for Node {
    fn from(value: Mapping) -> Self {
        Self::Mapping(value)
    }
}

impl From<Vec<Node>> for Node {
    fn from(value: Vec<Node>) -> Self {
        Self::Sequence(value)
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Self::Scalar(Scalar::String(value))
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Self::Scalar(Scalar::String(value.to_string()))
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Self::Scalar(Scalar::Integer(value))
    }
}

impl From<f64> for Node {
    fn from(value: f64) -> Self {
        Self::Scalar(Scalar::Float(value))
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Self::Scalar(Scalar::Bool(value))
    }
}

impl<K: Into<String>> FromIterator<(K, Node)> for Node {
    fn from_iter<I: IntoIterator<Item = (K, Node)>>(iter: I) -> Self {
        Self::Mapping(iter.into_iter().map(|(key, value)| (key.into(), value)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_detect_pointer_node() {
        let pointer = Node::reference("./user.yaml#/User");
        assert_eq!(pointer.as_reference(), Some("./user.yaml#/User"));

        let not_a_string = Node::from_iter([(REF_KEY, Node::from(42_i64))]);
        assert_eq!(not_a_string.as_reference(), None);

        let scalar = Node::from("$ref");
        assert_eq!(scalar.as_reference(), None);
    }

    #[test]
    fn should_keep_position_on_replace() {
        let mut mapping = Mapping::new();
        mapping.insert("a".to_string(), Node::from(1_i64));
        mapping.insert("b".to_string(), Node::from(2_i64));
        mapping.insert("a".to_string(), Node::from(3_i64));

        let keys = mapping.keys().map(String::as_str).collect::<Vec<_>>();
        assert_eq!(keys, ["a", "b"]);
        assert_eq!(mapping.get("a"), Some(&Node::from(3_i64)));
    }

    #[test]
    fn should_ensure_nested_mapping() {
        let mut root = Node::from_iter([("openapi", Node::from("3.0.0"))]);

        let schemas = root
            .ensure_mapping_at(&["components", "schemas"])
            .expect("should create mappings");
        schemas.insert("User".to_string(), Node::mapping());

        assert!(root.get("components").and_then(|it| it.get("schemas")).is_some());
    }

    #[test]
    fn should_not_ensure_mapping_through_scalar() {
        let mut root = Node::from_iter([("components", Node::from("oops"))]);

        assert!(root.ensure_mapping_at(&["components", "schemas"]).is_none());
    }

    #[test]
    fn should_not_ensure_mapping_through_pointer() {
        let mut root = Node::from_iter([("components", Node::reference("#/components/schemas/Components"))]);

        assert!(root.ensure_mapping_at(&["components", "schemas"]).is_none());
        assert_eq!(
            root.get("components").and_then(Node::as_mapping).map(Mapping::len),
            Some(1)
        );
    }

    #[test]
    fn should_visit_pre_order() {
        let root = Node::from_iter([
            ("a", Node::from(vec![Node::from(1_i64), Node::from(2_i64)])),
            ("b", Node::from(true)),
        ]);

        let mut count = 0;
        root.visit(&mut |_| count += 1);

        assert_eq!(count, 5);
    }
}
