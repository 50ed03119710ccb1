//! Hierarchical naming directory.
//!
//! Binds dotted names to published [`Authority`] values. A name can only be
//! registered when the authority's certificate verifies under the key of the
//! authority already published at the parent name. The root `.` is the one
//! exception and bootstraps the tree.
//!
//! The directory gates registration only. Certificate validation is the
//! trust store's job and never consults this tree.
//!
//! Nodes live in an arena. Each node owns its children by id and points to
//! its parent by id, so no node ever owns its parent.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::authority::Authority;
use crate::crypto::{OpensslVerifier, Verifier};
use crate::error::NamingError;
use crate::names::DottedName;

/// Index of a node inside one [`NamingDirectory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
struct Node {
    label: String,
    parent: Option<NodeId>,
    children: HashMap<String, NodeId>,
    authority: Arc<Authority>,
}

#[derive(Debug, Default)]
struct Tree {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl Tree {
    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Walk `components` from the root; `None` if any step is missing.
    fn walk<'a>(&self, components: impl IntoIterator<Item = &'a str>) -> Option<NodeId> {
        let mut current = self.root?;
        for label in components {
            current = *self.node(current).children.get(label)?;
        }
        Some(current)
    }

    fn insert(&mut self, label: String, parent: Option<NodeId>, authority: Authority) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            label: label.clone(),
            parent,
            children: HashMap::new(),
            authority: Arc::new(authority),
        });
        match parent {
            Some(parent) => {
                self.nodes[parent.0].children.insert(label, id);
            }
            None => self.root = Some(id),
        }
        id
    }
}

pub struct NamingDirectory {
    tree: RwLock<Tree>,
    verifier: Arc<dyn Verifier>,
}

impl NamingDirectory {
    pub fn new() -> Self {
        Self::with_verifier(Arc::new(OpensslVerifier))
    }

    pub fn with_verifier(verifier: Arc<dyn Verifier>) -> Self {
        Self {
            tree: RwLock::new(Tree::default()),
            verifier,
        }
    }

    /// Register `authority` under `path`
    ///
    /// The parent name must already be published, and the authority's
    /// certificate must verify under the parent authority's public key. On
    /// any failure the tree is left unchanged.
    ///
    /// # Arguments
    /// * `path` - Full dotted name to publish at; `.` bootstraps the root
    /// * `authority` - An active authority whose own path equals `path`
    ///
    /// # Returns
    /// * `Result<(), NamingError>` - `UnknownParentPath` if the parent is not
    ///   published, `UnauthorizedPublish` if the parent did not sign the
    ///   certificate, `AlreadyPublished` if the name is taken
    pub fn publish(&self, path: &DottedName, authority: Authority) -> Result<(), NamingError> {
        let certificate = authority
            .certificate()
            .ok_or_else(|| NamingError::NotPromoted(authority.path().to_string()))?;
        if authority.path() != path {
            return Err(NamingError::NameMismatch {
                path: path.clone(),
                authority: authority.path().to_string(),
            });
        }

        let mut tree = self.tree.write();

        let Some(parent_path) = path.parent() else {
            if tree.root.is_some() {
                return Err(NamingError::AlreadyPublished(path.clone()));
            }
            tree.insert(".".to_string(), None, authority);
            tracing::debug!(path = %path, "published root authority");
            return Ok(());
        };

        let parent_id = tree
            .walk(parent_path.components_from_right())
            .ok_or_else(|| NamingError::UnknownParentPath(parent_path.clone()))?;
        let parent = tree.node(parent_id);
        let label = path
            .leaf()
            .ok_or_else(|| NamingError::InvalidName(path.to_string()))?;
        if parent.children.contains_key(label) {
            return Err(NamingError::AlreadyPublished(path.clone()));
        }

        let parent_key = parent
            .authority
            .certificate_authority()
            .map(|ca| ca.public_key().clone())
            .ok_or_else(|| NamingError::NotPromoted(parent_path.to_string()))?;
        if !certificate.verify_signature(&parent_key, self.verifier.as_ref()) {
            tracing::warn!(
                path = %path,
                parent = %parent_path,
                issuer = %certificate.issuer_name(),
                "rejected publish: certificate not signed by parent"
            );
            return Err(NamingError::UnauthorizedPublish {
                path: path.clone(),
                parent: parent_path,
            });
        }

        let label = label.to_string();
        tree.insert(label, Some(parent_id), authority);
        tracing::debug!(path = %path, parent = %parent_path, "published authority");
        Ok(())
    }

    /// Find the authority published at `path`.
    pub fn lookup(&self, path: &DottedName) -> Result<Arc<Authority>, NamingError> {
        let tree = self.tree.read();
        let id = tree
            .walk(path.components_from_right())
            .ok_or_else(|| NamingError::NotFound(path.clone()))?;
        tracing::trace!(path = %path, "lookup hit");
        Ok(Arc::clone(&tree.node(id).authority))
    }

    /// Id of the node published at `path`.
    pub fn resolve(&self, path: &DottedName) -> Result<NodeId, NamingError> {
        self.tree
            .read()
            .walk(path.components_from_right())
            .ok_or_else(|| NamingError::NotFound(path.clone()))
    }

    /// Rebuild the dotted name of a node by following parent ids.
    pub fn full_name(&self, id: NodeId) -> Result<DottedName, NamingError> {
        let tree = self.tree.read();
        if id.0 >= tree.nodes.len() {
            return Err(NamingError::UnknownNode(id));
        }

        let mut labels = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            if !visited.insert(node_id) {
                return Err(NamingError::CycleDetected(
                    tree.node(id).label.clone(),
                ));
            }
            let node = tree.node(node_id);
            if node.parent.is_some() {
                labels.push(node.label.as_str());
            }
            current = node.parent;
        }

        let mut name = DottedName::root();
        for label in labels.iter().rev() {
            name = name.child(label)?;
        }
        Ok(name)
    }

    pub fn contains(&self, path: &DottedName) -> bool {
        self.tree.read().walk(path.components_from_right()).is_some()
    }

    /// Names published directly below `path`, sorted.
    pub fn children(&self, path: &DottedName) -> Result<Vec<DottedName>, NamingError> {
        let tree = self.tree.read();
        let id = tree
            .walk(path.components_from_right())
            .ok_or_else(|| NamingError::NotFound(path.clone()))?;
        let mut children = tree
            .node(id)
            .children
            .keys()
            .map(|label| path.child(label))
            .collect::<Result<Vec<_>, _>>()?;
        children.sort();
        Ok(children)
    }

    /// Number of published names, root included.
    pub fn len(&self) -> usize {
        self.tree.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for NamingDirectory {
    fn default() -> Self {
        Self::new()
    }
}
