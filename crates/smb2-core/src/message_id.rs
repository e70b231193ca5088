//! Message ids and the per-connection id counter.

use std::fmt;

use crate::error::CoreError;

/// Client-assigned 64-bit id correlating a response with its request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Reserved for unsolicited server notifications; never assigned.
    pub const UNSOLICITED: MessageId = MessageId(u64::MAX);

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic message id allocator for one connection.
///
/// Allocation is split in two steps so a batch can stamp its ids into the
/// headers, try to build and queue the write, and only then consume them:
/// [`peek_batch`](Self::peek_batch) returns the ids a batch would get,
/// [`commit`](Self::commit) advances past them.
#[derive(Debug, Default)]
pub struct MessageIdCounter {
    next: u64,
}

impl MessageIdCounter {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(first: u64) -> Self {
        MessageIdCounter { next: first }
    }

    /// The id the next allocation would return.
    pub fn peek(&self) -> MessageId {
        MessageId(self.next)
    }

    /// Ids for a batch of `count` requests, without consuming them.
    ///
    /// Fails if any id of the batch would reach the reserved
    /// [`MessageId::UNSOLICITED`] value.
    pub fn peek_batch(&self, count: usize) -> Result<Vec<MessageId>, CoreError> {
        let remaining = MessageId::UNSOLICITED.0 - self.next;
        if count as u64 > remaining {
            return Err(CoreError::MessageIdsExhausted {
                next: self.peek(),
                requested: count,
            });
        }
        Ok((self.next..self.next + count as u64).map(MessageId).collect())
    }

    /// Consume `count` ids previously returned by `peek_batch`.
    pub fn commit(&mut self, count: usize) {
        self.next += count as u64;
    }

    /// Allocate a single id.
    pub fn allocate(&mut self) -> Result<MessageId, CoreError> {
        let id = self.peek_batch(1)?[0];
        self.commit(1);
        Ok(id)
    }
}
