//! # Free-List Heap
//!
//! First-fit allocator over a doubly-linked block list embedded in the
//! arena itself. Every block starts with a 16-byte header:
//!
//! ```text
//! offset  0        4        8        12       16
//!         ┌────────┬────────┬────────┬────────┬──────────────────┐
//!         │  size  │  flag  │  next  │  prev  │ payload (size B) │
//!         └────────┴────────┴────────┴────────┴──────────────────┘
//! ```
//!
//! `next`/`prev` are arena offsets of the neighbouring headers (`NIL` at
//! either end). Blocks stay in address order, and a release always merges
//! with free neighbours, so two adjacent free blocks never coexist.
//!
//! Headers are read and written through byte slices, so the arena needs no
//! particular alignment and no raw pointer is dereferenced here.

use alloc::vec::Vec;
use core::ptr::NonNull;

use crate::memory::allocators::core::{align_up, AllocError};

pub const HEADER_SIZE: usize = 16;
/// Allocation sizes are rounded up to this many bytes.
pub const ALIGNMENT: usize = 4;
/// Slack a split must leave beyond the new header.
pub const MIN_SPLIT_REMAINDER: usize = 16;

const NIL: u32 = u32::MAX;
const FLAG_USED: u32 = 0;
const FLAG_FREE: u32 = 1;

/// Arena offset of a block's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BlockOffset(pub usize);

/// Snapshot of one block, for introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapBlock {
    pub offset: usize,
    pub size: usize,
    pub free: bool,
}

#[derive(Debug, Clone, Copy)]
struct Header {
    size: u32,
    free: bool,
    next: u32,
    prev: u32,
}

pub struct Heap<'a> {
    arena: &'a mut [u8],
    used_size: usize,
}

impl<'a> Heap<'a> {
    /// Turns the whole arena into a single free block.
    pub fn new(arena: &'a mut [u8]) -> Result<Self, AllocError> {
        if arena.len() <= HEADER_SIZE || arena.len() > u32::MAX as usize {
            return Err(AllocError::InvalidSize);
        }
        let size = (arena.len() - HEADER_SIZE) as u32;
        let mut heap = Self { arena, used_size: 0 };
        heap.write_header(
            0,
            Header {
                size,
                free: true,
                next: NIL,
                prev: NIL,
            },
        );
        Ok(heap)
    }

    pub fn total_size(&self) -> usize {
        self.arena.len()
    }

    pub fn used_size(&self) -> usize {
        self.used_size
    }

    fn read_word(&self, at: usize) -> u32 {
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.arena[at..at + 4]);
        u32::from_ne_bytes(word)
    }

    fn write_word(&mut self, at: usize, value: u32) {
        self.arena[at..at + 4].copy_from_slice(&value.to_ne_bytes());
    }

    fn read_header(&self, at: usize) -> Header {
        Header {
            size: self.read_word(at),
            free: self.read_word(at + 4) == FLAG_FREE,
            next: self.read_word(at + 8),
            prev: self.read_word(at + 12),
        }
    }

    fn write_header(&mut self, at: usize, header: Header) {
        self.write_word(at, header.size);
        self.write_word(at + 4, if header.free { FLAG_FREE } else { FLAG_USED });
        self.write_word(at + 8, header.next);
        self.write_word(at + 12, header.prev);
    }

    fn set_prev(&mut self, at: u32, prev: u32) {
        if at != NIL {
            self.write_word(at as usize + 12, prev);
        }
    }

    /// First-fit allocation. Returns the payload offset, or `None` when no
    /// free block is large enough (or `size` is zero).
    pub fn allocate_block(&mut self, size: usize) -> Option<BlockOffset> {
        if size == 0 || size > self.arena.len() {
            return None;
        }
        let size = align_up(size, ALIGNMENT);

        let mut cursor = 0u32;
        while cursor != NIL {
            let at = cursor as usize;
            let mut header = self.read_header(at);
            if header.free && header.size as usize >= size {
                if header.size as usize > size + HEADER_SIZE + MIN_SPLIT_REMAINDER {
                    let split_at = (at + HEADER_SIZE + size) as u32;
                    self.write_header(
                        split_at as usize,
                        Header {
                            size: header.size - (size + HEADER_SIZE) as u32,
                            free: true,
                            next: header.next,
                            prev: cursor,
                        },
                    );
                    self.set_prev(header.next, split_at);
                    header.next = split_at;
                    header.size = size as u32;
                }
                header.free = false;
                self.write_header(at, header);
                self.used_size += header.size as usize;
                return Some(BlockOffset(at + HEADER_SIZE));
            }
            cursor = header.next;
        }
        None
    }

    /// Walks the list to confirm `offset` is the payload of a used block.
    fn used_header_at(&self, offset: BlockOffset) -> Result<usize, AllocError> {
        let target = offset
            .0
            .checked_sub(HEADER_SIZE)
            .ok_or(AllocError::InvalidAddress)?;
        let mut cursor = 0u32;
        while cursor != NIL {
            let at = cursor as usize;
            let header = self.read_header(at);
            if at == target {
                return if header.free {
                    Err(AllocError::InvalidAddress)
                } else {
                    Ok(at)
                };
            }
            if at > target {
                break;
            }
            cursor = header.next;
        }
        Err(AllocError::InvalidAddress)
    }

    /// Frees the block and merges it with a free successor, then with a
    /// free predecessor.
    pub fn release_block(&mut self, offset: BlockOffset) -> Result<(), AllocError> {
        let at = self.used_header_at(offset)?;
        let mut header = self.read_header(at);
        header.free = true;
        self.used_size -= header.size as usize;

        if header.next != NIL {
            let next = self.read_header(header.next as usize);
            if next.free {
                header.size += HEADER_SIZE as u32 + next.size;
                header.next = next.next;
                self.set_prev(next.next, at as u32);
            }
        }
        self.write_header(at, header);

        if header.prev != NIL {
            let prev_at = header.prev as usize;
            let mut prev = self.read_header(prev_at);
            if prev.free {
                prev.size += HEADER_SIZE as u32 + header.size;
                prev.next = header.next;
                self.set_prev(header.next, header.prev);
                self.write_header(prev_at, prev);
            }
        }
        Ok(())
    }

    /// Payload bytes of a used block (the rounded-up size).
    pub fn block(&self, offset: BlockOffset) -> Option<&[u8]> {
        let at = self.used_header_at(offset).ok()?;
        let size = self.read_header(at).size as usize;
        Some(&self.arena[offset.0..offset.0 + size])
    }

    pub fn block_mut(&mut self, offset: BlockOffset) -> Option<&mut [u8]> {
        let at = self.used_header_at(offset).ok()?;
        let size = self.read_header(at).size as usize;
        Some(&mut self.arena[offset.0..offset.0 + size])
    }

    // ------------------------------------------------------------------
    // Pointer interface
    // ------------------------------------------------------------------

    pub fn allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
        let offset = self.allocate_block(size)?;
        NonNull::new(self.arena.as_mut_ptr().wrapping_add(offset.0))
    }

    /// Releasing a pointer outside the arena, or one already free, is
    /// rejected without touching the block list.
    pub fn release(&mut self, ptr: NonNull<u8>) -> Result<(), AllocError> {
        let offset = self.offset_of(ptr).ok_or(AllocError::InvalidAddress)?;
        self.release_block(offset)
    }

    pub fn offset_of(&self, ptr: NonNull<u8>) -> Option<BlockOffset> {
        let base = self.arena.as_ptr() as usize;
        let addr = ptr.as_ptr() as usize;
        if addr < base + HEADER_SIZE || addr >= base + self.arena.len() {
            return None;
        }
        Some(BlockOffset(addr - base))
    }

    pub fn contains(&self, ptr: NonNull<u8>) -> bool {
        self.offset_of(ptr).is_some()
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn blocks(&self) -> Vec<HeapBlock> {
        let mut blocks = Vec::new();
        let mut cursor = 0u32;
        while cursor != NIL {
            let header = self.read_header(cursor as usize);
            blocks.push(HeapBlock {
                offset: cursor as usize,
                size: header.size as usize,
                free: header.free,
            });
            cursor = header.next;
        }
        blocks
    }

    pub fn block_count(&self) -> usize {
        self.blocks().len()
    }

    pub fn free_bytes(&self) -> usize {
        self.blocks().iter().filter(|b| b.free).map(|b| b.size).sum()
    }

    pub fn largest_free_block(&self) -> usize {
        self.blocks()
            .iter()
            .filter(|b| b.free)
            .map(|b| b.size)
            .max()
            .unwrap_or(0)
    }
}
