//! Scene graph errors

use crate::node::NodeId;

/// Errors raised by scene graph operations
///
/// A failed operation leaves the graph untouched, including dirty flags.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SceneError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Node id not found: {0}")]
    NodeIdNotFound(NodeId),

    #[error("A node named '{0}' already exists")]
    NameTaken(String),

    #[error("Node '{0}' is not a group")]
    NotAGroup(String),

    #[error("Node '{child}' is already a child of '{group}'")]
    DuplicateChild { group: String, child: String },

    #[error("Node '{child}' is not a child of '{group}'")]
    ChildNotFound { group: String, child: String },

    #[error("Adding '{child}' to '{group}' would create a cycle")]
    WouldCreateCycle { group: String, child: String },

    #[error("Node '{node}' has no property '{property}'")]
    PropertyNotFound { node: String, property: String },

    #[error("Property '{property}' expects a value of type {expected}")]
    PropertyType { property: String, expected: String },

    #[error("Property '{property}' is {access}")]
    PropertyAccess { property: String, access: String },

    #[error("IO error on '{path}': {reason}")]
    Io { path: String, reason: String },
}

impl SceneError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, err: impl std::fmt::Display) -> Self {
        SceneError::Io {
            path: path.as_ref().display().to_string(),
            reason: err.to_string(),
        }
    }
}
