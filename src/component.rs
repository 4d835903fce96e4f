//! The component tree: the hierarchical representation of an analyzed project.
//!
//! A component is one node of the project's structural tree. Files are always
//! leaves; directories, modules and the project root are containers that own
//! their children. The tree is immutable once built and is walked bottom-up
//! by the [`FormulaExecutor`](crate::visitor::FormulaExecutor).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identity of a component, stable within one analysis run.
///
/// Usable as a map key; this is how raw measures, changesets and overlay
/// entries refer back to a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentRef(pub u32);

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The type of a tree node.
///
/// The taxonomy is closed: `File` is the only leaf type, everything else is
/// a container. Traversal dispatches on [`ComponentType::is_file`] rather
/// than on open-ended subtyping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentType {
    Project,
    Module,
    Directory,
    File,
}

impl ComponentType {
    /// Whether this type denotes a leaf (source file) node.
    pub fn is_file(self) -> bool {
        matches!(self, ComponentType::File)
    }
}

/// One node of the analyzed project's structural tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    reference: ComponentRef,
    kind: ComponentType,
    children: Vec<Component>,
}

impl Component {
    /// Create a leaf file node.
    pub fn file(reference: ComponentRef) -> Self {
        Self {
            reference,
            kind: ComponentType::File,
            children: Vec::new(),
        }
    }

    /// Create a container node owning its children.
    ///
    /// # Panics
    ///
    /// Panics if `kind` is [`ComponentType::File`]: files are leaves and are
    /// built with [`Component::file`].
    pub fn container(kind: ComponentType, reference: ComponentRef, children: Vec<Component>) -> Self {
        assert!(!kind.is_file(), "file components cannot have children");
        Self {
            reference,
            kind,
            children,
        }
    }

    /// The node's identity.
    pub fn reference(&self) -> ComponentRef {
        self.reference
    }

    /// The node's type tag.
    pub fn kind(&self) -> ComponentType {
        self.kind
    }

    /// The node's children, in order. Empty for files.
    pub fn children(&self) -> &[Component] {
        &self.children
    }

    /// Whether this node is a leaf.
    pub fn is_leaf(&self) -> bool {
        self.kind.is_file()
    }
}
