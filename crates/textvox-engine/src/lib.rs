pub mod editing;
pub mod error;
pub mod narration;
pub mod text;
pub mod tree;

#[cfg(test)]
pub mod tests;

// Re-export key types for easier usage
pub use editing::*;
pub use error::EditError;
pub use narration::{
    BrailleLine, END_OF_TEXT, Intent, Narration, NarrationDiffEngine, NarrationOptions,
};
pub use text::{DocumentText, Segment};
pub use tree::*;
