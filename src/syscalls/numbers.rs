//! System call numbers
use crate::syscalls::dispatcher::SyscallError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum SyscallNumber {
    Exit = 0,
    Write = 1,
    Read = 2,
    Open = 3,
    Close = 4,
    Fork = 5,
    Exec = 6,
    GetPid = 7,
    Sleep = 8,
    Malloc = 9,
    Free = 10,
    Yield = 11,
    Send = 12,
    Receive = 13,
    Uptime = 14,
}

impl SyscallNumber {
    pub const COUNT: usize = 15;

    pub fn as_usize(self) -> usize {
        self as usize
    }
}

impl TryFrom<usize> for SyscallNumber {
    type Error = SyscallError;

    fn try_from(num: usize) -> Result<Self, Self::Error> {
        Ok(match num {
            0 => Self::Exit,
            1 => Self::Write,
            2 => Self::Read,
            3 => Self::Open,
            4 => Self::Close,
            5 => Self::Fork,
            6 => Self::Exec,
            7 => Self::GetPid,
            8 => Self::Sleep,
            9 => Self::Malloc,
            10 => Self::Free,
            11 => Self::Yield,
            12 => Self::Send,
            13 => Self::Receive,
            14 => Self::Uptime,
            _ => return Err(SyscallError::InvalidCall),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_are_dense() {
        for num in 0..SyscallNumber::COUNT {
            let call = SyscallNumber::try_from(num).unwrap();
            assert_eq!(call.as_usize(), num);
        }
    }

    #[test]
    fn test_unknown_number_is_invalid_call() {
        assert_eq!(
            SyscallNumber::try_from(SyscallNumber::COUNT),
            Err(SyscallError::InvalidCall)
        );
        assert_eq!(
            SyscallNumber::try_from(usize::MAX),
            Err(SyscallError::InvalidCall)
        );
    }
}
