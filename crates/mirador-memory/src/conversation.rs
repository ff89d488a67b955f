//! Bounded short-term conversation memory.
//!
//! Turns are appended in user/agent pairs and the oldest entries are evicted
//! once the configured capacity is exceeded, so `len() <= capacity()` holds
//! after every [`ConversationMemory::append`].
//!
//! # Example
//!
//! ```rust
//! use mirador_memory::conversation::ConversationMemory;
//!
//! let mut memory = ConversationMemory::new(4).unwrap();
//! memory.append("hello", "hi!");
//! memory.append("how are you?", "fine.");
//! memory.append("bye?", "not yet.");
//!
//! assert_eq!(memory.len(), 4);
//! assert_eq!(memory.context(), "User: how are you?\nAgent: fine.\nUser: bye?\nAgent: not yet.");
//! ```

use std::collections::VecDeque;

use mirador_types::Turn;
use thiserror::Error;
use tracing::debug;

/// Errors raised when constructing a [`ConversationMemory`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MemoryError {
    #[error("memory capacity must be a positive even number, got {0}")]
    InvalidCapacity(usize),
}

/// Ordered, bounded log of [`Turn`]s.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    capacity: usize,
    turns: VecDeque<Turn>,
}

impl ConversationMemory {
    /// Create an empty memory holding at most `capacity` turns.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidCapacity`] for zero or odd capacities,
    /// since turns always arrive in user/agent pairs.
    pub fn new(capacity: usize) -> Result<Self, MemoryError> {
        if capacity == 0 || capacity % 2 != 0 {
            return Err(MemoryError::InvalidCapacity(capacity));
        }
        Ok(Self {
            capacity,
            turns: VecDeque::with_capacity(capacity + 2),
        })
    }

    /// Append one exchange, then evict from the front until within capacity.
    pub fn append(&mut self, user_text: impl Into<String>, agent_text: impl Into<String>) {
        self.turns.push_back(Turn::user(user_text));
        self.turns.push_back(Turn::agent(agent_text));

        let mut evicted = 0;
        while self.turns.len() > self.capacity {
            self.turns.pop_front();
            evicted += 1;
        }
        debug!(len = self.turns.len(), evicted, "conversation memory updated");
    }

    /// Oldest-first iterator over the remembered turns.
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    /// The turns rendered as `Speaker: text` lines, oldest first.
    ///
    /// Empty when nothing has been said yet.
    pub fn context(&self) -> String {
        self.turns
            .iter()
            .map(Turn::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirador_types::Speaker;

    #[test]
    fn rejects_zero_and_odd_capacity() {
        assert_eq!(
            ConversationMemory::new(0).unwrap_err(),
            MemoryError::InvalidCapacity(0)
        );
        assert_eq!(
            ConversationMemory::new(5).unwrap_err(),
            MemoryError::InvalidCapacity(5)
        );
        assert!(ConversationMemory::new(2).is_ok());
    }

    #[test]
    fn append_pushes_user_then_agent() {
        let mut memory = ConversationMemory::new(6).unwrap();
        memory.append("hello", "hi there");
        let turns: Vec<&Turn> = memory.turns().collect();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].speaker, Speaker::User);
        assert_eq!(turns[0].text, "hello");
        assert_eq!(turns[1].speaker, Speaker::Agent);
        assert_eq!(turns[1].text, "hi there");
    }

    #[test]
    fn seven_appends_keep_the_last_three_pairs() {
        let mut memory = ConversationMemory::new(6).unwrap();
        for i in 1..=7 {
            memory.append(format!("user{i}"), format!("agent{i}"));
            assert!(memory.len() <= memory.capacity());
        }

        let texts: Vec<&str> = memory.turns().map(|t| t.text.as_str()).collect();
        assert_eq!(
            texts,
            ["user5", "agent5", "user6", "agent6", "user7", "agent7"]
        );
    }

    #[test]
    fn twelve_turn_capacity_holds_pairs_two_through_seven() {
        let mut memory = ConversationMemory::new(12).unwrap();
        for i in 1..=7 {
            memory.append(format!("user{i}"), format!("agent{i}"));
        }
        let first: Vec<&str> = memory.turns().take(2).map(|t| t.text.as_str()).collect();
        assert_eq!(first, ["user2", "agent2"]);
        assert_eq!(memory.len(), 12);
    }

    #[test]
    fn context_is_empty_for_new_memory() {
        let memory = ConversationMemory::new(6).unwrap();
        assert!(memory.is_empty());
        assert_eq!(memory.context(), "");
    }

    #[test]
    fn context_renders_speaker_prefixed_lines() {
        let mut memory = ConversationMemory::new(6).unwrap();
        memory.append("what's on my screen?", "A code editor.");
        assert_eq!(
            memory.context(),
            "User: what's on my screen?\nAgent: A code editor."
        );
    }
}
