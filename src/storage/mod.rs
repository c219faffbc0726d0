//! Byte-level key/value engines behind the table store.

pub mod disk;
pub mod engine;
pub mod memory;

pub use disk::DiskEngine;
pub use engine::Engine;
pub use memory::MemoryEngine;
