//! Window-local identity remapping.

use std::collections::HashMap;

/// Bijection from real identifiers to small sequential numbers.
///
/// Numbers start at 1 and are handed out in first-seen order. A map lives
/// exactly as long as the window that built it and is never shared.
#[derive(Debug, Clone)]
pub struct IdentityMap {
    ids: HashMap<String, u32>,
    next: u32,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self {
            ids: HashMap::new(),
            next: 1,
        }
    }

    /// Return the number for `real`, assigning the next one if unseen.
    pub fn register(&mut self, real: &str) -> u32 {
        if let Some(&id) = self.ids.get(real) {
            return id;
        }
        let id = self.allocate();
        self.ids.insert(real.to_string(), id);
        id
    }

    /// Register `real` under a fresh number even if it was seen before.
    ///
    /// Used for message ids: every position in a window gets its own number,
    /// so a duplicated export row still advances the counter.
    pub fn register_fresh(&mut self, real: &str) -> u32 {
        let id = self.allocate();
        self.ids.insert(real.to_string(), id);
        id
    }

    pub fn get(&self, real: &str) -> Option<u32> {
        self.ids.get(real).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn allocate(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }
}

impl Default for IdentityMap {
    fn default() -> Self {
        Self::new()
    }
}

/// Render an anonymized user number as a display name.
pub fn username(id: u32) -> String {
    format!("User {}", id)
}
