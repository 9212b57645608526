//! # Kernel Allocators
//!
//! | Allocator            | Backing store          | Frees |
//! |----------------------|------------------------|-------|
//! | `BootstrapAllocator` | fixed physical window  | no    |
//! | `Heap`               | 16 MiB heap arena      | yes   |
//!
//! `core` holds the alignment helpers and the `AllocError` type
//! shared by both.

pub mod bootstrap;
pub mod core;
pub mod free_list;

pub use bootstrap::BootstrapAllocator;
pub use free_list::{BlockOffset, Heap, HeapBlock};
