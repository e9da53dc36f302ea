// src/graph/mod.rs

//! Go package discovery, the local import graph and target fingerprints.

pub mod fingerprint;
pub mod imports;
pub mod index;

pub use fingerprint::{FileHashCache, Fingerprinter};
pub use index::{PackageIndex, PackageInfo};
