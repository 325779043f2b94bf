//! Utility modules

pub mod batch;
pub mod fs;
pub mod hash;
pub mod naming;

pub use batch::{Progress, run_bounded};
pub use fs::{find_existing_roots, is_fresh, rel, walk};
pub use hash::hash_file;
pub use naming::ModelArtifacts;
