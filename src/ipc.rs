//! # Message Passing
//!
//! One queue shared by every process. Senders push at the head; a receiver
//! takes the first message addressed to it, scanning from the head, so the
//! most recently sent message is delivered first.
//!
//! Payloads are owned copies in the kernel heap, referenced here by block
//! offset. The queue never touches heap memory itself: the kernel copies
//! bytes in on send and out on receive, then releases the block.

use alloc::collections::VecDeque;

use crate::memory::allocators::BlockOffset;
use crate::process::Pid;
use crate::{KernelError, KernelResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    pub sender: Pid,
    pub receiver: Pid,
    pub msg_type: u32,
    pub payload: BlockOffset,
    pub length: usize,
}

/// What a successful receive reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub sender: Pid,
    pub msg_type: u32,
    /// Bytes copied into the caller's buffer.
    pub length: usize,
}

pub struct MessageQueue {
    messages: VecDeque<Message>,
    mailbox_limit: Option<usize>,
}

impl MessageQueue {
    pub fn new(mailbox_limit: Option<usize>) -> Self {
        Self {
            messages: VecDeque::new(),
            mailbox_limit,
        }
    }

    /// Fails with `MailboxFull` once `receiver` holds the configured number
    /// of undelivered messages.
    pub fn check_capacity(&self, receiver: Pid) -> KernelResult<()> {
        match self.mailbox_limit {
            Some(limit) if self.pending_for(receiver) >= limit => {
                log::warn!("mailbox of process {} full", receiver);
                Err(KernelError::MailboxFull)
            }
            _ => Ok(()),
        }
    }

    pub fn push(&mut self, message: Message) -> KernelResult<()> {
        self.check_capacity(message.receiver)?;
        self.messages.push_front(message);
        Ok(())
    }

    /// Unlinks the first message for `receiver`, scanning from the head.
    pub fn take_for(&mut self, receiver: Pid) -> Option<Message> {
        let index = self.messages.iter().position(|m| m.receiver == receiver)?;
        self.messages.remove(index)
    }

    pub fn pending_for(&self, receiver: Pid) -> usize {
        self.messages.iter().filter(|m| m.receiver == receiver).count()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(sender: Pid, receiver: Pid, msg_type: u32) -> Message {
        Message {
            sender,
            receiver,
            msg_type,
            payload: BlockOffset(16),
            length: 4,
        }
    }

    #[test]
    fn test_latest_message_is_taken_first() {
        let mut queue = MessageQueue::new(None);
        queue.push(message(1, 2, 10)).unwrap();
        queue.push(message(3, 2, 11)).unwrap();
        queue.push(message(1, 4, 12)).unwrap();

        assert_eq!(queue.take_for(2).unwrap().msg_type, 11);
        assert_eq!(queue.take_for(2).unwrap().msg_type, 10);
        assert!(queue.take_for(2).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_unbounded_queue_accepts_everything() {
        let mut queue = MessageQueue::new(None);
        for i in 0..500 {
            queue.push(message(1, 2, i)).unwrap();
        }
        assert_eq!(queue.pending_for(2), 500);
    }

    #[test]
    fn test_mailbox_limit_is_per_receiver() {
        let mut queue = MessageQueue::new(Some(2));
        queue.push(message(1, 2, 0)).unwrap();
        queue.push(message(1, 2, 1)).unwrap();
        assert_eq!(queue.push(message(1, 2, 2)), Err(KernelError::MailboxFull));
        assert!(queue.push(message(1, 3, 0)).is_ok());

        queue.take_for(2).unwrap();
        assert!(queue.push(message(1, 2, 3)).is_ok());
    }
}
