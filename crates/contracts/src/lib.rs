//! Contract artifacts and the fixed ABIs of the on-chain collaborators.

pub mod artifact;
pub mod bindings;
pub mod paths;
pub mod store;

pub use {
    artifact::{Artifact, ArtifactError, ArtifactId, CompilerInput},
    store::{ArtifactStore, Fallback, PackageStore},
};
