//! Shared fixtures for unit tests.

use crate::tree::{MemoryTree, Role, Wrap};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A rich-text editable with one paragraph per entry.
pub fn paragraphs(texts: &[&str]) -> MemoryTree {
    MemoryTree::build(Role::ContentEditable, |root| {
        for text in texts {
            root.paragraph(|p| {
                p.text(text);
            });
        }
    })
}

/// A text area whose single leaf soft-wraps before every word.
pub fn wrapped(text: &str) -> MemoryTree {
    MemoryTree::build(Role::TextArea, |root| {
        root.text(text).wrap(Wrap::EachWord);
    })
}
