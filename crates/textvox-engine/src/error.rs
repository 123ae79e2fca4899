use crate::tree::NodeId;

/// Failures raised while reading the host tree or narrating a transition.
///
/// None of these are fatal: callers drop whatever they cached and rebuild
/// from the host's current selection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("position refers to node {0} which no longer resolves in the tree")]
    StalePosition(NodeId),
    #[error("offset {offset} is out of range for node {node} (length {len})")]
    OffsetOutOfRange {
        node: NodeId,
        offset: usize,
        len: usize,
    },
    #[error("node {0} has no text-bearing descendants")]
    NoTextLeaf(NodeId),
    #[error("cached line no longer matches the tree")]
    InvalidLine,
    #[error("host has no selection inside the editable root")]
    NoSelection,
}
