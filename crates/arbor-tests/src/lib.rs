//! Integration test suite for the Arbor fork tree.
//!
//! End-to-end scenarios live in `tests/e2e.rs`; randomized invariant checks
//! live in `tests/adversarial.rs`. Both build blocks with [`helpers`].

pub mod helpers;
