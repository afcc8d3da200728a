//! Repository traits for catalog operations.

pub mod revisions;

pub use revisions::RevisionRepo;
