//! Integration tests for handlefs

mod end_to_end;
mod mutation_properties;
mod serving;
mod store_integration;
mod walk_completeness;
