//! Device drivers.
//!
//! | Driver         | Port  | IRQ |
//! |----------------|-------|-----|
//! | `ps2_keyboard` | 0x60  | 1   |

pub mod ps2_keyboard;
