//! # sni-trie
//!
//! A hostname trie for picking a TLS context from the server name a client
//! sends in its SNI extension.
//!
//! Hostnames are split on `.` and stored one label per level, left to right.
//! A child labelled `*` is a wildcard: lookups fall back to it when the exact
//! label (or everything below it) has no registration.
//!
//! ## Example
//!
//! ```rust
//! use sni_trie::SniTree;
//!
//! let mut tree: SniTree<&str> = SniTree::new();
//! tree.insert("foo.com", "apex").unwrap();
//! tree.insert("*.foo.com", "wildcard").unwrap();
//! tree.insert("bar.foo.com", "bar").unwrap();
//!
//! assert_eq!(tree.find("bar.foo.com"), Some(&"bar"));
//! assert_eq!(tree.find("baz.foo.com"), Some(&"wildcard"));
//! assert_eq!(tree.find("foo.com"), Some(&"apex"));
//! assert_eq!(tree.find("qux.bar.foo.com"), None);
//! ```

#![deny(unsafe_op_in_unsafe_fn)]

pub mod config;
pub mod error;
pub mod ffi;
pub mod registry;

pub use config::{Config, DEFAULT_MAX_LABELS};
pub use error::{InsertError, SniError};
pub use registry::ServerNameRegistry;

use std::collections::BTreeMap;

use smallvec::SmallVec;

const WILDCARD: &[u8] = b"*";

// =============================================================================
// Label splitting
// =============================================================================

type Labels<'a> = SmallVec<[&'a [u8]; DEFAULT_MAX_LABELS]>;

#[inline]
fn label_count(hostname: &[u8]) -> usize {
    if hostname.is_empty() {
        0
    } else {
        hostname.iter().filter(|&&b| b == b'.').count() + 1
    }
}

/// Split `hostname` into its labels, most significant first as written.
///
/// The empty hostname has zero labels. Labels are kept verbatim, including
/// empty ones. Returns `Err(count)` when the hostname has more than `max`
/// labels; the count is taken before anything is buffered.
fn split_labels(hostname: &[u8], max: usize) -> Result<Labels<'_>, usize> {
    let count = label_count(hostname);
    if count > max {
        return Err(count);
    }

    let mut labels = Labels::new();
    if count > 0 {
        labels.extend(hostname.split(|&b| b == b'.'));
    }
    debug_assert_eq!(labels.len(), count);
    Ok(labels)
}

// =============================================================================
// Node Arena
// =============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct NodeId(usize);

impl NodeId {
    const ROOT: NodeId = NodeId(0);
}

#[derive(Clone)]
struct Node<T> {
    value: Option<T>,
    children: BTreeMap<Box<[u8]>, NodeId>,
}

impl<T> Node<T> {
    fn new() -> Self {
        Self {
            value: None,
            children: BTreeMap::new(),
        }
    }

    /// Neither a registration nor a path to one.
    #[inline]
    fn is_dead(&self) -> bool {
        self.value.is_none() && self.children.is_empty()
    }
}

/// Flat node storage. Slot 0 is the root and is never freed.
#[derive(Clone)]
struct NodeArena<T> {
    nodes: Vec<Node<T>>,
    /// Culled slots, reused before the vector grows.
    free: Vec<NodeId>,
}

impl<T> NodeArena<T> {
    fn new() -> Self {
        Self {
            nodes: vec![Node::new()],
            free: Vec::new(),
        }
    }

    fn alloc(&mut self) -> NodeId {
        if let Some(id) = self.free.pop() {
            debug_assert!(self.nodes[id.0].is_dead());
            return id;
        }
        self.nodes.push(Node::new());
        NodeId(self.nodes.len() - 1)
    }

    fn free(&mut self, id: NodeId) {
        debug_assert_ne!(id, NodeId::ROOT, "root is never freed");
        debug_assert!(self.nodes[id.0].is_dead());
        self.free.push(id);
    }

    #[inline]
    fn get(&self, id: NodeId) -> &Node<T> {
        &self.nodes[id.0]
    }

    #[inline]
    fn get_mut(&mut self, id: NodeId) -> &mut Node<T> {
        &mut self.nodes[id.0]
    }

    fn live(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    fn shrink_to_fit(&mut self) {
        // Trailing free slots can be dropped outright.
        while self.nodes.len() > 1 {
            let last = NodeId(self.nodes.len() - 1);
            match self.free.iter().position(|&id| id == last) {
                Some(pos) => {
                    self.free.swap_remove(pos);
                    self.nodes.pop();
                }
                None => break,
            }
        }
        self.nodes.shrink_to_fit();
        self.free.shrink_to_fit();
    }
}

// =============================================================================
// SniTree
// =============================================================================

/// A map from dotted hostnames to values, with wildcard-aware lookup.
///
/// - [`insert`](Self::insert) refuses to overwrite an existing registration.
/// - [`find`](Self::find) prefers the exact label at every position and falls
///   back to a `*` child once per level.
/// - [`remove`](Self::remove) is exact only and culls nodes left empty.
/// - [`destroy`](Self::destroy) hands every remaining value to a callback.
///
/// Lookups do not allocate for hostnames within [`DEFAULT_MAX_LABELS`].
#[derive(Clone)]
pub struct SniTree<T> {
    nodes: NodeArena<T>,
    count: usize,
    config: Config,
}

impl<T> SniTree<T> {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            nodes: NodeArena::new(),
            count: 0,
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of registered hostnames.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Live nodes, the root included. An empty tree has exactly one.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.live()
    }

    pub fn shrink_to_fit(&mut self) {
        self.nodes.shrink_to_fit();
    }

    /// Register `value` under `hostname`.
    ///
    /// Fails with [`SniError::AlreadyExists`] if the exact hostname is already
    /// registered, or [`SniError::TooManyLabels`] if it exceeds the label cap.
    /// On failure the tree is unchanged and the value comes back in the error.
    ///
    /// `*` is stored as a plain label here; it only acts as a wildcard in
    /// [`find`](Self::find).
    pub fn insert(&mut self, hostname: impl AsRef<[u8]>, value: T) -> Result<(), InsertError<T>> {
        let max = self.config.max_labels;
        let labels = match split_labels(hostname.as_ref(), max) {
            Ok(labels) => labels,
            Err(count) => {
                return Err(InsertError::new(
                    SniError::TooManyLabels { count, max },
                    value,
                ))
            }
        };

        // A registered path already exists in full, so the duplicate check at
        // the end never leaves freshly created nodes behind.
        let mut current = NodeId::ROOT;
        for label in labels {
            let existing = self.nodes.get(current).children.get(label).copied();
            current = match existing {
                Some(child) => child,
                None => {
                    let child = self.nodes.alloc();
                    self.nodes
                        .get_mut(current)
                        .children
                        .insert(Box::from(label), child);
                    child
                }
            };
        }

        let node = self.nodes.get_mut(current);
        if node.value.is_some() {
            return Err(InsertError::new(SniError::AlreadyExists, value));
        }
        node.value = Some(value);
        self.count += 1;
        Ok(())
    }

    /// Look up the value serving `hostname`.
    ///
    /// At each level the exact label is tried first; only if that subtree
    /// yields nothing is the `*` child consulted, and its answer is final.
    /// Hostnames over the label cap never match.
    pub fn find(&self, hostname: impl AsRef<[u8]>) -> Option<&T> {
        let labels = split_labels(hostname.as_ref(), self.config.max_labels).ok()?;
        self.find_from(NodeId::ROOT, &labels)
    }

    fn find_from(&self, id: NodeId, labels: &[&[u8]]) -> Option<&T> {
        let node = self.nodes.get(id);
        let Some((label, rest)) = labels.split_first() else {
            return node.value.as_ref();
        };

        if let Some(&child) = node.children.get(*label) {
            if let Some(value) = self.find_from(child, rest) {
                return Some(value);
            }
        }

        let &wildcard = node.children.get(WILDCARD)?;
        self.find_from(wildcard, rest)
    }

    #[inline]
    pub fn contains(&self, hostname: impl AsRef<[u8]>) -> bool {
        self.find(hostname).is_some()
    }

    /// Look up the registration made under exactly `hostname`, treating `*`
    /// as a literal label.
    pub fn get_exact(&self, hostname: impl AsRef<[u8]>) -> Option<&T> {
        let labels = split_labels(hostname.as_ref(), self.config.max_labels).ok()?;
        let mut current = NodeId::ROOT;
        for label in labels {
            current = *self.nodes.get(current).children.get(label)?;
        }
        self.nodes.get(current).value.as_ref()
    }

    /// Remove and return the registration made under exactly `hostname`.
    ///
    /// Unlike [`find`](Self::find), `*` is matched literally: removing
    /// `"*.example.com"` drops the wildcard registration itself, and removing
    /// `"a.example.com"` never touches it. Nodes left with no value and no
    /// children are culled on the way back up.
    pub fn remove(&mut self, hostname: impl AsRef<[u8]>) -> Option<T> {
        let labels = split_labels(hostname.as_ref(), self.config.max_labels).ok()?;
        let removed = self.remove_from(NodeId::ROOT, &labels);
        if removed.is_some() {
            self.count -= 1;
        }
        removed
    }

    fn remove_from(&mut self, id: NodeId, labels: &[&[u8]]) -> Option<T> {
        let Some((label, rest)) = labels.split_first() else {
            return self.nodes.get_mut(id).value.take();
        };

        let child = *self.nodes.get(id).children.get(*label)?;
        let removed = self.remove_from(child, rest);

        if self.nodes.get(child).is_dead() {
            self.nodes.get_mut(id).children.remove(*label);
            self.nodes.free(child);
        }

        removed
    }

    /// Tear the tree down, passing every remaining value to `release`.
    ///
    /// Each registration (the root's included) is released exactly once, a
    /// node's value before those below it. Structural nodes are not reported.
    pub fn destroy(mut self, mut release: impl FnMut(T)) {
        let mut stack = vec![NodeId::ROOT];
        while let Some(id) = stack.pop() {
            let node = self.nodes.get_mut(id);
            if let Some(value) = node.value.take() {
                self.count -= 1;
                release(value);
            }
            stack.extend(node.children.values().rev().copied());
        }
        debug_assert_eq!(self.count, 0);
    }

    /// Iterate over `(hostname, value)` pairs, parents before children and
    /// siblings in byte order of their labels.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            tree: self,
            stack: vec![(NodeId::ROOT, Vec::new())],
        }
    }
}

impl<T> Default for SniTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for SniTree<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.iter()
                    .map(|(name, value)| (String::from_utf8_lossy(&name).into_owned(), value)),
            )
            .finish()
    }
}

impl<'a, T> IntoIterator for &'a SniTree<T> {
    type Item = (Vec<u8>, &'a T);
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct Iter<'a, T> {
    tree: &'a SniTree<T>,
    stack: Vec<(NodeId, Vec<u8>)>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (Vec<u8>, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((id, name)) = self.stack.pop() {
            let node = self.tree.nodes.get(id);
            for (label, &child) in node.children.iter().rev() {
                let mut child_name = Vec::with_capacity(name.len() + 1 + label.len());
                child_name.extend_from_slice(&name);
                if id != NodeId::ROOT {
                    child_name.push(b'.');
                }
                child_name.extend_from_slice(label);
                self.stack.push((child, child_name));
            }

            if let Some(value) = node.value.as_ref() {
                return Some((name, value));
            }
        }
        None
    }
}


#[cfg(test)]
mod proptests;
