//! Path-based search and traversal over `serde_json` trees.
//!
//! Paths are dot-separated keys with `[index]` suffixes for array elements,
//! e.g. `threeImage.scenes[2].interactions[0]`. The empty path is the root.
//! Lookups never fail loudly: malformed or dangling paths resolve to `None`.

use regex::Regex;
use serde_json::{Map, Value};

/// A node matched by [`find`], with its path from the searched root
#[derive(Debug, Clone, PartialEq)]
pub struct PathMatch<'a> {
    pub path: String,
    pub node: &'a Value,
}

/// A typed component node (a subtree carrying a `library` key)
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentNode<'a> {
    pub path: String,
    pub node: &'a Value,
}

/// Attribute/value-pattern pair used by [`find`]
#[derive(Debug, Clone)]
pub struct Predicate {
    pub attribute: String,
    pub pattern: Regex,
}

impl Predicate {
    pub fn new(attribute: &str, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            attribute: attribute.to_string(),
            pattern: Regex::new(pattern)?,
        })
    }

    fn matches(&self, node: &Value) -> bool {
        let Some(value) = node.as_object().and_then(|map| map.get(&self.attribute)) else {
            return false;
        };

        match value {
            Value::String(s) => self.pattern.is_match(s),
            Value::Number(n) => self.pattern.is_match(&n.to_string()),
            Value::Bool(b) => self.pattern.is_match(&b.to_string()),
            _ => false,
        }
    }
}

/// Lazy depth-first search returned by [`find`]
pub struct Find<'a, 'p> {
    stack: Vec<(String, &'a Value)>,
    predicates: &'p [Predicate],
}

/// Search every container below `tree` for nodes satisfying at least one predicate.
///
/// Nodes are yielded in document order, parents before their children. The
/// root itself is not a candidate.
pub fn find<'a, 'p>(tree: &'a Value, predicates: &'p [Predicate]) -> Find<'a, 'p> {
    let mut search = Find {
        stack: Vec::new(),
        predicates,
    };
    search.push_children("", tree);
    search
}

impl<'a, 'p> Find<'a, 'p> {
    fn push_children(&mut self, path: &str, node: &'a Value) {
        match node {
            Value::Object(map) => {
                for (key, child) in map.iter().rev() {
                    if child.is_object() || child.is_array() {
                        self.stack.push((join_key(path, key), child));
                    }
                }
            }
            Value::Array(items) => {
                for (index, child) in items.iter().enumerate().rev() {
                    if child.is_object() || child.is_array() {
                        self.stack.push((format!("{path}[{index}]"), child));
                    }
                }
            }
            _ => {}
        }
    }
}

impl<'a, 'p> Iterator for Find<'a, 'p> {
    type Item = PathMatch<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((path, node)) = self.stack.pop() {
            self.push_children(&path, node);
            if self.predicates.iter().any(|predicate| predicate.matches(node)) {
                return Some(PathMatch { path, node });
            }
        }
        None
    }
}

fn join_key(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

/// One dot-separated path segment: an optional key followed by array indices
fn parse_segment(segment: &str) -> Option<(&str, Vec<usize>)> {
    let (name, mut rest) = match segment.find('[') {
        Some(pos) => (&segment[..pos], &segment[pos..]),
        None => (segment, ""),
    };

    if name.is_empty() && rest.is_empty() {
        return None;
    }

    let mut indices = Vec::new();
    while !rest.is_empty() {
        let close = rest.find(']')?;
        if !rest.starts_with('[') {
            return None;
        }
        indices.push(rest[1..close].parse().ok()?);
        rest = &rest[close + 1..];
    }

    Some((name, indices))
}

/// Resolve a path against `tree`, returning `None` for any missing or malformed segment
pub fn resolve<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(tree);
    }

    let mut current = tree;
    for segment in path.split('.') {
        let (name, indices) = parse_segment(segment)?;
        if !name.is_empty() {
            current = current.as_object()?.get(name)?;
        }
        for index in indices {
            current = current.as_array()?.get(index)?;
        }
    }
    Some(current)
}

/// Mutable counterpart of [`resolve`]
pub fn resolve_mut<'a>(tree: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    if path.is_empty() {
        return Some(tree);
    }

    let mut current = tree;
    for segment in path.split('.') {
        let (name, indices) = parse_segment(segment)?;
        if !name.is_empty() {
            current = current.as_object_mut()?.get_mut(name)?;
        }
        for index in indices {
            current = current.as_array_mut()?.get_mut(index)?;
        }
    }
    Some(current)
}

/// Drop the last dot-segment of `path`; a path without dots is returned as is
pub fn parent_path(path: &str) -> &str {
    match path.rfind('.') {
        Some(pos) => &path[..pos],
        None => path,
    }
}

/// Walk from `path` towards the root until a node carrying a `library` key is found.
///
/// The root is checked last. Dangling paths yield `None`.
pub fn closest_typed_component<'a>(tree: &'a Value, path: &str) -> Option<ComponentNode<'a>> {
    let mut candidate = path;
    loop {
        let node = resolve(tree, candidate)?;
        if is_typed_component(node) {
            return Some(ComponentNode {
                path: candidate.to_string(),
                node,
            });
        }

        if candidate.is_empty() {
            return None;
        }
        let parent = parent_path(candidate);
        candidate = if parent == candidate { "" } else { parent };
    }
}

pub fn is_typed_component(node: &Value) -> bool {
    node.as_object().is_some_and(|map| map.contains_key("library"))
}

/// Copy `node` without the typed sub-components nested in it.
///
/// Maps carrying a `library` key are dropped below the root, `library` scalars
/// are dropped at every level, and containers left empty are omitted.
pub fn prune_subcomponents(node: &Value) -> Value {
    match node {
        Value::Object(map) => Value::Object(prune_map(map)),
        Value::Array(items) => Value::Array(prune_items(items)),
        other => other.clone(),
    }
}

fn prune_map(map: &Map<String, Value>) -> Map<String, Value> {
    let mut pruned = Map::new();
    for (key, value) in map {
        match value {
            Value::Object(_) | Value::Array(_) => {
                if let Some(child) = prune_child(value) {
                    pruned.insert(key.clone(), child);
                }
            }
            _ if key == "library" => {}
            _ => {
                pruned.insert(key.clone(), value.clone());
            }
        }
    }
    pruned
}

fn prune_items(items: &[Value]) -> Vec<Value> {
    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(_) | Value::Array(_) => prune_child(item),
            other => Some(other.clone()),
        })
        .collect()
}

fn prune_child(value: &Value) -> Option<Value> {
    match value {
        Value::Object(map) if map.contains_key("library") => None,
        Value::Object(map) => {
            let pruned = prune_map(map);
            (!pruned.is_empty()).then_some(Value::Object(pruned))
        }
        Value::Array(items) => {
            let pruned = prune_items(items);
            (!pruned.is_empty()).then_some(Value::Array(pruned))
        }
        other => Some(other.clone()),
    }
}
