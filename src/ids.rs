//! Identifier generation capability.
//!
//! Documents, conflicts and history events get opaque string ids from an
//! injected [`IdGenerator`]. Production uses random UUIDs; tests use
//! [`SequentialIds`] for predictable values.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Produces unique opaque identifiers.
pub trait IdGenerator: Send + Sync {
    /// Returns a fresh identifier, never returned before by this generator.
    fn new_id(&self) -> String;
}

/// Random v4 UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn new_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// `prefix-1`, `prefix-2`, ...
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    /// Creates a generator starting at 1.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn new_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{n}", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_generator_unique() {
        let ids = UuidGenerator;
        assert_ne!(ids.new_id(), ids.new_id());
    }

    #[test]
    fn test_sequential_ids() {
        let ids = SequentialIds::new("id");
        assert_eq!(ids.new_id(), "id-1");
        assert_eq!(ids.new_id(), "id-2");
    }
}
