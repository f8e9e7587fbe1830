//! Anchor store handlers

pub mod filesystem;
pub mod memory;

pub use filesystem::FilesystemAnchorStore;
pub use memory::MemoryAnchorStore;
