//! Topic tree and dispatch.

use std::collections::HashMap;
use std::fmt;

use pitwall_core::topics;
use tracing::debug;

use crate::handler::{Handler, invoke_all};

/// One node of the topic tree.
struct TopicNode<P> {
    handlers: Vec<Handler<P>>,
    children: HashMap<String, TopicNode<P>>,
}

impl<P> Default for TopicNode<P> {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
            children: HashMap::new(),
        }
    }
}

impl<P> TopicNode<P> {
    fn count(&self) -> usize {
        self.handlers.len() + self.children.values().map(TopicNode::count).sum::<usize>()
    }
}

/// Registry mapping dot-delimited topic paths to ordered handler lists.
///
/// Nodes are created on first subscription and never pruned; unsubscribing
/// only removes the handler.
pub struct Dispatcher<P> {
    root: TopicNode<P>,
}

impl<P> Default for Dispatcher<P> {
    fn default() -> Self {
        Self {
            root: TopicNode::default(),
        }
    }
}

impl<P> Dispatcher<P> {
    /// Create an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` to the node at `path`, creating intermediate nodes.
    ///
    /// The same handler may be subscribed more than once and then fires once
    /// per subscription.
    pub fn subscribe(&mut self, path: &str, handler: Handler<P>) {
        let mut node = &mut self.root;
        for segment in topics::segments(path) {
            node = node.children.entry(segment.to_owned()).or_default();
        }
        node.handlers.push(handler);
        debug!(topic = path, handlers = node.handlers.len(), "handler subscribed");
    }

    /// Remove the first occurrence of `handler` at `path`.
    ///
    /// Returns `false` when the path or the handler is not registered.
    pub fn unsubscribe(&mut self, path: &str, handler: &Handler<P>) -> bool {
        let Some(node) = self.node_mut(path) else {
            return false;
        };
        let Some(index) = node.handlers.iter().position(|h| h == handler) else {
            return false;
        };
        let _ = node.handlers.remove(index);
        debug!(topic = path, "handler unsubscribed");
        true
    }

    /// Drop every node and handler.
    pub fn clear(&mut self) {
        self.root = TopicNode::default();
        debug!("all handlers cleared");
    }

    /// Number of handlers registered directly on `path`.
    pub fn handler_count(&self, path: &str) -> usize {
        self.node(path).map_or(0, |node| node.handlers.len())
    }

    /// Whether no handler is registered anywhere in the tree.
    pub fn is_empty(&self) -> bool {
        self.root.count() == 0
    }

    /// Handlers that a dispatch to `paths` would invoke, in invocation order.
    ///
    /// With `exact` unset every node traversed along each path contributes its
    /// handlers; with `exact` set only the terminal node does. Paths naming a
    /// node that does not exist contribute the handlers found before the
    /// missing segment (prefix mode) or nothing (exact mode).
    pub fn collect<I, S>(&self, paths: I, exact: bool) -> Vec<Handler<P>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut found = Vec::new();
        for path in paths {
            let mut node = &self.root;
            let mut segments = topics::segments(path.as_ref()).peekable();
            while let Some(segment) = segments.next() {
                let Some(child) = node.children.get(segment) else {
                    break;
                };
                node = child;
                let terminal = segments.peek().is_none();
                if !exact || terminal {
                    found.extend(node.handlers.iter().cloned());
                }
            }
        }
        found
    }

    /// Invoke handlers on every node along each path, in order.
    pub fn dispatch<I, S>(&self, paths: I, payload: &P)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.fire(paths, payload, false);
    }

    /// Invoke handlers on the terminal node of each path only.
    pub fn dispatch_exact<I, S>(&self, paths: I, payload: &P)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.fire(paths, payload, true);
    }

    fn fire<I, S>(&self, paths: I, payload: &P, exact: bool)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for path in paths {
            let path = path.as_ref();
            let handlers = self.collect([path], exact);
            let _ = invoke_all(path, &handlers, payload);
        }
    }

    fn node(&self, path: &str) -> Option<&TopicNode<P>> {
        let mut node = &self.root;
        for segment in topics::segments(path) {
            node = node.children.get(segment)?;
        }
        Some(node)
    }

    fn node_mut(&mut self, path: &str) -> Option<&mut TopicNode<P>> {
        let mut node = &mut self.root;
        for segment in topics::segments(path) {
            node = node.children.get_mut(segment)?;
        }
        Some(node)
    }
}

impl<P> fmt::Debug for Dispatcher<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handler_count", &self.root.count())
            .finish()
    }
}
