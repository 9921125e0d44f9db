//! Server-name registry for a TLS listener.
//!
//! # Responsibilities
//! - Register and unregister per-hostname contexts (exact or `*` patterns)
//! - Resolve the hostname from a ClientHello to a context
//! - Give the owner one chance to register a context for an unknown name
//!
//! # Design Decisions
//! - A duplicate pattern keeps the first context; the new one is dropped
//! - An empty server name never resolves
//! - The missing-name callback runs at most once per resolve

use crate::{Config, SniTree};

/// Called with the tree and the unresolved hostname. May register contexts.
pub type MissingServerNameCallback<T> = Box<dyn FnMut(&mut SniTree<T>, &str)>;

/// Maps server names to TLS contexts for one listening socket context.
pub struct ServerNameRegistry<T> {
    tree: SniTree<T>,
    on_missing: Option<MissingServerNameCallback<T>>,
}

impl<T> ServerNameRegistry<T> {
    /// Create an empty registry with the default label cap.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            tree: SniTree::with_config(config),
            on_missing: None,
        }
    }

    /// Register `context` for `pattern`.
    ///
    /// Returns `false` if the pattern was already registered (or is too long);
    /// the existing registration is kept and `context` is dropped.
    pub fn add_server_name(&mut self, pattern: &str, context: T) -> bool {
        match self.tree.insert(pattern, context) {
            Ok(()) => {
                tracing::debug!(pattern, "Server name added");
                true
            }
            Err(err) => {
                tracing::debug!(pattern, error = %err, "Server name ignored");
                false
            }
        }
    }

    /// Unregister `pattern` exactly, returning its context.
    ///
    /// `*` is literal here: removing `"*.example.com"` removes the wildcard
    /// registration, and removing `"a.example.com"` never does.
    pub fn remove_server_name(&mut self, pattern: &str) -> Option<T> {
        let removed = self.tree.remove(pattern);
        tracing::debug!(pattern, removed = removed.is_some(), "Server name removed");
        removed
    }

    /// The context registered under exactly `pattern`, if any.
    pub fn find_server_name(&self, pattern: &str) -> Option<&T> {
        self.tree.get_exact(pattern)
    }

    /// Install the callback invoked when [`resolve`](Self::resolve) misses.
    pub fn on_missing_server_name(
        &mut self,
        callback: impl FnMut(&mut SniTree<T>, &str) + 'static,
    ) {
        self.on_missing = Some(Box::new(callback));
    }

    /// Remove the missing-name callback.
    pub fn clear_missing_server_name(&mut self) {
        self.on_missing = None;
    }

    /// Pick the context for the server name a client asked for.
    ///
    /// On a miss the missing-name callback (if any) runs once and the lookup
    /// is retried once.
    pub fn resolve(&mut self, hostname: &str) -> Option<&T> {
        if hostname.is_empty() {
            return None;
        }

        if self.tree.contains(hostname) {
            return self.tree.find(hostname);
        }

        let Some(callback) = self.on_missing.as_mut() else {
            tracing::trace!(hostname, "No context for server name");
            return None;
        };

        tracing::debug!(hostname, "Server name missing, notifying owner");
        callback(&mut self.tree, hostname);

        let resolved = self.tree.find(hostname);
        if resolved.is_none() {
            tracing::debug!(hostname, "Server name still unresolved");
        }
        resolved
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn tree(&self) -> &SniTree<T> {
        &self.tree
    }

    pub fn into_tree(self) -> SniTree<T> {
        self.tree
    }

    /// Tear down, passing every registered context to `release`.
    pub fn destroy(self, release: impl FnMut(T)) {
        tracing::debug!(contexts = self.tree.len(), "Releasing server name contexts");
        self.tree.destroy(release);
    }
}

impl<T> Default for ServerNameRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for ServerNameRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerNameRegistry")
            .field("server_names", &self.tree.len())
            .field("on_missing", &self.on_missing.is_some())
            .finish()
    }
}
