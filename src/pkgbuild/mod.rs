//! PKGBUILD reading and `.SRCINFO` rendering

pub mod descriptor;
pub mod parser;
pub mod pattern;
pub mod srcinfo;

pub use descriptor::{DESCRIPTOR_FILE, PackageDescriptor};
pub use srcinfo::SRCINFO_FILE;
