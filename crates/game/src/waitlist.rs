//! # Wait List
//!
//! Queue of characters waiting for a free slot while the world is full.
//! Premium characters queue ahead of everyone else, first come first served
//! within each tier. An entry lives until its timeout passes without the
//! client retrying; each retry pushes the timeout further out.

use ots_core::PlayerGuid;
use std::collections::VecDeque;

/// Grace added to the advertised wait before an entry is dropped
const ENTRY_GRACE_SECS: u64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WaitListEntry {
    guid: PlayerGuid,
    /// Milliseconds on the caller's clock
    expires_at: u64,
}

/// Who is asking to enter, as far as the wait list cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitListTicket {
    pub guid: PlayerGuid,
    pub premium: bool,
    /// Privileged characters never wait
    pub bypass: bool,
}

#[derive(Debug, Default)]
pub struct WaitList {
    entries: VecDeque<WaitListEntry>,
    /// Index of the first non-premium entry
    priority_end: usize,
}

impl WaitList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Seconds the client is told to wait before retrying from `slot`
    pub fn wait_time(slot: usize) -> u64 {
        match slot {
            0..=4 => 5,
            5..=9 => 10,
            10..=19 => 20,
            20..=49 => 60,
            _ => 120,
        }
    }

    fn timeout_ms(slot: usize) -> u64 {
        (Self::wait_time(slot) + ENTRY_GRACE_SECS) * 1000
    }

    /// Drop entries whose timeout has passed
    pub fn expire(&mut self, now: u64) {
        let mut index = 0;
        while index < self.entries.len() {
            if self.entries[index].expires_at <= now {
                self.remove_at(index);
            } else {
                index += 1;
            }
        }
    }

    fn remove_at(&mut self, index: usize) {
        if self.entries.remove(index).is_some() && index < self.priority_end {
            self.priority_end -= 1;
        }
    }

    /// 1-based slot of `guid`
    pub fn find(&self, guid: PlayerGuid) -> Option<usize> {
        self.entries.iter().position(|entry| entry.guid == guid).map(|index| index + 1)
    }

    /// Append `guid` at the end of its tier
    ///
    /// # Returns
    /// The new entry's 1-based slot
    pub fn enqueue(&mut self, guid: PlayerGuid, premium: bool, now: u64) -> usize {
        let index = if premium {
            self.priority_end += 1;
            self.priority_end - 1
        } else {
            self.entries.len()
        };
        let slot = index + 1;
        self.entries.insert(
            index,
            WaitListEntry {
                guid,
                expires_at: now + Self::timeout_ms(slot),
            },
        );
        slot
    }

    /// Decide whether a character may enter the world now
    ///
    /// # Arguments
    /// * `online` - Players currently in the world
    /// * `max_players` - Capacity; 0 means unlimited
    /// * `now` - Current time in milliseconds
    ///
    /// # Returns
    /// `None` if the character may enter, else its 1-based slot
    pub fn client_login(&mut self, ticket: WaitListTicket, online: usize, max_players: usize, now: u64) -> Option<usize> {
        if ticket.bypass || max_players == 0 || (self.entries.is_empty() && online < max_players) {
            return None;
        }

        self.expire(now);

        if let Some(slot) = self.find(ticket.guid) {
            if online + slot <= max_players {
                self.remove_at(slot - 1);
                return None;
            }
            let entry = &mut self.entries[slot - 1];
            entry.expires_at = entry.expires_at.max(now + Self::timeout_ms(slot));
            return Some(slot);
        }

        let slot = self.enqueue(ticket.guid, ticket.premium, now);
        tracing::info!(guid = ticket.guid.get(), slot, premium = ticket.premium, "Placed on the waiting list");
        Some(slot)
    }
}
