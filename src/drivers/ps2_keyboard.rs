//! PS/2 keyboard: scancode set 1 translation and the typed-line buffer.
//!
//! Make codes are looked up in a 128-entry table. Break codes (bit 7 set)
//! and modifier keys produce nothing.

pub const DATA_PORT: u16 = 0x60;
pub const BUFFER_CAPACITY: usize = 256;

const RELEASE_BIT: u8 = 0x80;
const BACKSPACE: u8 = b'\x08';

#[rustfmt::skip]
pub static SCANCODE_MAP: [u8; 128] = [
    0, 27, b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', b'0', b'-', b'=', BACKSPACE,
    b'\t', b'q', b'w', b'e', b'r', b't', b'y', b'u', b'i', b'o', b'p', b'[', b']', b'\n',
    0, b'a', b's', b'd', b'f', b'g', b'h', b'j', b'k', b'l', b';', b'\'', b'`',
    0, b'\\', b'z', b'x', b'c', b'v', b'b', b'n', b'm', b',', b'.', b'/', 0,
    b'*', 0, b' ',
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

/// What a scancode did to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Character appended.
    Buffered(u8),
    /// Backspace removed the last character.
    Erased,
    /// Buffer full, character lost.
    Dropped(u8),
    Ignored,
}

impl KeyAction {
    /// Byte to echo to the console for this action, if any.
    pub fn echo(self) -> Option<u8> {
        match self {
            KeyAction::Buffered(c) if c == b'\n' || (0x20..0x7F).contains(&c) => Some(c),
            KeyAction::Erased => Some(BACKSPACE),
            _ => None,
        }
    }
}

pub struct KeyboardBuffer {
    data: [u8; BUFFER_CAPACITY],
    len: usize,
}

impl KeyboardBuffer {
    pub const fn new() -> Self {
        Self {
            data: [0; BUFFER_CAPACITY],
            len: 0,
        }
    }

    /// Translates one scancode and applies it to the buffer.
    pub fn handle_scancode(&mut self, scancode: u8) -> KeyAction {
        if scancode & RELEASE_BIT != 0 {
            return KeyAction::Ignored;
        }
        match SCANCODE_MAP[scancode as usize] {
            0 => KeyAction::Ignored,
            BACKSPACE => match self.pop_back() {
                Some(_) => KeyAction::Erased,
                None => KeyAction::Ignored,
            },
            c if self.push(c) => KeyAction::Buffered(c),
            c => KeyAction::Dropped(c),
        }
    }

    pub fn push(&mut self, c: u8) -> bool {
        if self.len == BUFFER_CAPACITY {
            return false;
        }
        self.data[self.len] = c;
        self.len += 1;
        true
    }

    pub fn pop_back(&mut self) -> Option<u8> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        Some(self.data[self.len])
    }

    /// Removes the oldest character, shifting the rest down.
    pub fn pop_front(&mut self) -> Option<u8> {
        if self.len == 0 {
            return None;
        }
        let c = self.data[0];
        self.data.copy_within(1..self.len, 0);
        self.len -= 1;
        Some(c)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

impl Default for KeyboardBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_layout() {
        assert_eq!(SCANCODE_MAP[0x02], b'1');
        assert_eq!(SCANCODE_MAP[0x10], b'q');
        assert_eq!(SCANCODE_MAP[0x1C], b'\n');
        assert_eq!(SCANCODE_MAP[0x1E], b'a');
        assert_eq!(SCANCODE_MAP[0x2C], b'z');
        assert_eq!(SCANCODE_MAP[0x39], b' ');
    }

    #[test]
    fn test_make_codes_buffer_and_break_codes_ignored() {
        let mut kb = KeyboardBuffer::new();
        assert_eq!(kb.handle_scancode(0x23), KeyAction::Buffered(b'h'));
        assert_eq!(kb.handle_scancode(0xA3), KeyAction::Ignored);
        assert_eq!(kb.handle_scancode(0x17), KeyAction::Buffered(b'i'));
        assert_eq!(kb.as_bytes(), b"hi");
    }

    #[test]
    fn test_modifiers_produce_nothing() {
        let mut kb = KeyboardBuffer::new();
        assert_eq!(kb.handle_scancode(0x2A), KeyAction::Ignored);
        assert_eq!(kb.handle_scancode(0x1D), KeyAction::Ignored);
        assert!(kb.is_empty());
    }

    #[test]
    fn test_backspace_removes_last() {
        let mut kb = KeyboardBuffer::new();
        assert_eq!(kb.handle_scancode(0x0E), KeyAction::Ignored);
        kb.handle_scancode(0x1E);
        kb.handle_scancode(0x30);
        assert_eq!(kb.handle_scancode(0x0E), KeyAction::Erased);
        assert_eq!(kb.as_bytes(), b"a");
    }

    #[test]
    fn test_overflow_drops_characters() {
        let mut kb = KeyboardBuffer::new();
        for _ in 0..BUFFER_CAPACITY {
            assert!(matches!(kb.handle_scancode(0x1E), KeyAction::Buffered(_)));
        }
        assert_eq!(kb.handle_scancode(0x1E), KeyAction::Dropped(b'a'));
        assert_eq!(kb.len(), BUFFER_CAPACITY);
    }

    #[test]
    fn test_pop_front_is_fifo() {
        let mut kb = KeyboardBuffer::new();
        kb.push(b'x');
        kb.push(b'y');
        assert_eq!(kb.pop_front(), Some(b'x'));
        assert_eq!(kb.pop_front(), Some(b'y'));
        assert_eq!(kb.pop_front(), None);
    }

    #[test]
    fn test_echo() {
        assert_eq!(KeyAction::Buffered(b'q').echo(), Some(b'q'));
        assert_eq!(KeyAction::Buffered(b'\n').echo(), Some(b'\n'));
        assert_eq!(KeyAction::Buffered(b'\t').echo(), None);
        assert_eq!(KeyAction::Erased.echo(), Some(b'\x08'));
        assert_eq!(KeyAction::Dropped(b'q').echo(), None);
    }
}
