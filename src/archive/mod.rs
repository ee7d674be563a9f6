//! Archive handling: extraction into scratch storage, Fat/Thin format
//! detection, and re-serialization of a mutated scratch directory back into
//! the canonical archive.

pub mod extractor;
pub mod format;
pub mod packer;

pub use extractor::{extract_archive, ScratchDir};
pub use format::{detect, ArchiveKind, DependencyCoordinate, ThinManifest, THIN_MANIFEST_PATH};
pub use packer::pack_directory;
