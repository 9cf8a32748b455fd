pub mod client;
pub mod memory;
pub mod valkey;

pub use client::{CacheError, CacheResult, CacheStore};
pub use memory::MemoryCacheStore;
pub use valkey::ValkeyCacheStore;
