//! Typed document tree plus the two generic walks over it: `find` and
//! `flatten`.

use std::collections::HashMap;

use crate::model::Amount;

/// One node of a parsed document.
///
/// A composite keeps its entries in document order and may hold the same key
/// more than once (repeated XML elements such as `<Section>` or `<Item>`).
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Leaf(String),
    Composite(Vec<(String, Node)>),
}

impl Node {
    pub fn leaf(value: impl Into<String>) -> Self {
        Node::Leaf(value.into())
    }

    pub fn composite<K: Into<String>>(entries: impl IntoIterator<Item = (K, Node)>) -> Self {
        Node::Composite(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Entries of a composite; empty for a leaf.
    pub fn entries(&self) -> &[(String, Node)] {
        match self {
            Node::Composite(entries) => entries,
            Node::Leaf(_) => &[],
        }
    }

    /// First direct child with the given key.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries().iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Every direct child with the given key, so a single element and a
    /// repeated element read the same way.
    pub fn children<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.entries()
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Text of a leaf, or the `_` text entry of a composite that also carries
    /// attributes.
    pub fn text(&self) -> Option<&str> {
        match self {
            Node::Leaf(s) => Some(s),
            Node::Composite(_) => self.get("_").and_then(Node::text),
        }
    }

    /// Text at a relative path, empty when any step is missing.
    pub fn text_at(&self, path: &[&str]) -> &str {
        path.iter()
            .try_fold(self, |node, key| node.get(key))
            .and_then(Node::text)
            .unwrap_or("")
    }
}

/// Depth-first search for the first node stored under `name`.
///
/// Direct entries of a composite are checked before descending, then children
/// are searched in document order.
pub fn find<'a>(node: &'a Node, name: &str) -> Option<&'a Node> {
    let entries = node.entries();
    if let Some((_, found)) = entries.iter().find(|(k, _)| k == name) {
        return Some(found);
    }
    entries.iter().find_map(|(_, child)| find(child, name))
}

// ---------------------------------------------------------------------------
// Flat records
// ---------------------------------------------------------------------------

/// Single-level view of a subtree: `_`-joined paths to leaf text, in
/// document order. Keys are unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatRecord {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl FlatRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite; an overwritten key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.index.get(key).map(|&i| self.entries[i].1.as_str())
    }

    /// Text at `key`, empty when absent.
    pub fn text(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    /// Numeric value at `key`; `None` when absent or unparseable.
    pub fn amount(&self, key: &str) -> Option<Amount> {
        self.get(key).and_then(Amount::parse)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FlatRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = FlatRecord::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

/// Flatten a subtree, joining keys with `_` under `prefix`.
pub fn flatten(node: &Node, prefix: &str) -> FlatRecord {
    let mut record = FlatRecord::new();
    flatten_into(node, prefix, &mut record);
    record
}

/// Flatten into an existing record (used to append item fields after the
/// section columns).
pub fn flatten_into(node: &Node, prefix: &str, record: &mut FlatRecord) {
    match node {
        Node::Leaf(value) => {
            if !prefix.is_empty() {
                record.insert(prefix, value.as_str());
            }
        }
        Node::Composite(entries) => {
            for (key, child) in qualified_entries(entries) {
                let path = join_key(prefix, &key);
                match child {
                    Node::Leaf(value) => record.insert(path, value.as_str()),
                    Node::Composite(_) => flatten_into(child, &path, record),
                }
            }
        }
    }
}

/// Entries with repeated keys suffixed by their occurrence index
/// (`Section_0`, `Section_1`); keys that occur once are left as they are.
pub fn qualified_entries(entries: &[(String, Node)]) -> Vec<(String, &Node)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for (key, _) in entries {
        *counts.entry(key.as_str()).or_insert(0) += 1;
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    entries
        .iter()
        .map(|(key, child)| {
            if counts[key.as_str()] > 1 {
                let n = seen.entry(key.as_str()).or_insert(0);
                let qualified = format!("{key}_{n}");
                *n += 1;
                (qualified, child)
            } else {
                (key.clone(), child)
            }
        })
        .collect()
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}_{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> Node {
        Node::composite([
            (
                "Materials",
                Node::composite([(
                    "Total",
                    Node::composite([
                        ("PriceBase", Node::leaf("100")),
                        ("PriceCurrent", Node::leaf("1200,50")),
                    ]),
                )]),
            ),
            ("Transport", Node::composite([("PriceCurrent", Node::leaf("50"))])),
            ("Note", Node::leaf("plain")),
        ])
    }

    #[test]
    fn flatten_joins_keys() {
        let flat = flatten(&summary(), "");
        assert_eq!(flat.get("Materials_Total_PriceCurrent"), Some("1200,50"));
        assert_eq!(flat.get("Materials_Total_PriceBase"), Some("100"));
        assert_eq!(flat.get("Transport_PriceCurrent"), Some("50"));
        assert_eq!(flat.get("Note"), Some("plain"));
        assert_eq!(flat.len(), 4);
    }

    #[test]
    fn flatten_with_prefix() {
        let flat = flatten(&summary(), "Summary");
        assert_eq!(flat.get("Summary_Note"), Some("plain"));
        assert!(flat.get("Note").is_none());
    }

    #[test]
    fn flatten_preserves_document_order() {
        let flat = flatten(&summary(), "");
        let keys: Vec<&str> = flat.keys().collect();
        assert_eq!(
            keys,
            vec![
                "Materials_Total_PriceBase",
                "Materials_Total_PriceCurrent",
                "Transport_PriceCurrent",
                "Note"
            ]
        );
    }

    #[test]
    fn repeated_keys_are_indexed() {
        let node = Node::composite([
            ("Section", Node::composite([("Code", Node::leaf("1"))])),
            ("Section", Node::composite([("Code", Node::leaf("2"))])),
            ("Name", Node::leaf("x")),
        ]);
        let flat = flatten(&node, "");
        assert_eq!(flat.get("Section_0_Code"), Some("1"));
        assert_eq!(flat.get("Section_1_Code"), Some("2"));
        assert_eq!(flat.get("Name"), Some("x"));
    }

    #[test]
    fn find_at_any_depth() {
        let tree = Node::composite([(
            "Construction",
            Node::composite([
                ("Name", Node::leaf("c")),
                (
                    "Wrapper",
                    Node::composite([(
                        "Object",
                        Node::composite([("Name", Node::leaf("obj"))]),
                    )]),
                ),
            ]),
        )]);
        let object = find(&tree, "Object").unwrap();
        assert_eq!(object.text_at(&["Name"]), "obj");
        assert!(find(&tree, "Estimate").is_none());
    }

    #[test]
    fn find_prefers_shallow_match_in_same_composite() {
        let tree = Node::composite([
            (
                "A",
                Node::composite([("Name", Node::leaf("deep"))]),
            ),
            ("Name", Node::leaf("shallow")),
        ]);
        assert_eq!(find(&tree, "Name").and_then(Node::text), Some("shallow"));
    }

    #[test]
    fn children_is_uniform_for_single_and_repeated() {
        let single = Node::composite([("Item", Node::leaf("a"))]);
        let repeated = Node::composite([("Item", Node::leaf("a")), ("Item", Node::leaf("b"))]);
        assert_eq!(single.children("Item").count(), 1);
        assert_eq!(repeated.children("Item").count(), 2);
        assert_eq!(Node::leaf("x").children("Item").count(), 0);
    }

    #[test]
    fn text_of_attributed_element() {
        let node = Node::composite([("unit", Node::leaf("m2")), ("_", Node::leaf("15"))]);
        assert_eq!(node.text(), Some("15"));
        assert_eq!(Node::composite([("a", Node::leaf("1"))]).text(), None);
    }

    #[test]
    fn text_at_missing_path_is_empty() {
        let node = Node::composite([("Region", Node::composite([("Code", Node::leaf("77"))]))]);
        assert_eq!(node.text_at(&["Region", "Code"]), "77");
        assert_eq!(node.text_at(&["Region", "Name"]), "");
        assert_eq!(node.text_at(&["SubRegion", "Name"]), "");
    }

    #[test]
    fn insert_overwrites_in_place() {
        let mut flat: FlatRecord = [("a", "1"), ("b", "2")].into_iter().collect();
        flat.insert("a", "3");
        assert_eq!(flat.iter().collect::<Vec<_>>(), vec![("a", "3"), ("b", "2")]);
    }
}
