//! Property-based tests for path handling and tree folding

mod path_normalization;
mod tree_roundtrip;
