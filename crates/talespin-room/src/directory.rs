use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;

use crate::config::RoomConfig;
use crate::deck::CardId;
use crate::handle::RoomHandle;

const CODE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const CODE_LEN: usize = 5;
const MAX_CODE_ATTEMPTS: u32 = 64;

/// Process-wide map of room code to a running room's handle. The single
/// point of truth for "does this room exist," keyed by a human-shareable
/// code instead of a numeric counter.
pub struct RoomDirectory {
    rooms: DashMap<String, RoomHandle>,
    registry: Arc<Vec<CardId>>,
    moderator_grace: Duration,
    idle_timeout: Duration,
}

impl RoomDirectory {
    pub fn new(registry: Arc<Vec<CardId>>, moderator_grace: Duration, idle_timeout: Duration) -> Self {
        Self { rooms: DashMap::new(), registry, moderator_grace, idle_timeout }
    }

    /// Allocates a fresh room code (collision-retried) and spawns its
    /// room task.
    pub fn create(&self, creator: Option<String>, config: RoomConfig) -> Result<String, DirectoryError> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = random_code();
            if let dashmap::mapref::entry::Entry::Vacant(slot) = self.rooms.entry(code.clone()) {
                let handle = RoomHandle::spawn(code.clone(), creator, config, self.registry.clone(), self.moderator_grace, self.idle_timeout);
                slot.insert(handle);
                return Ok(code);
            }
        }
        Err(DirectoryError::OutOfCodes)
    }

    pub fn exists(&self, code: &str) -> bool {
        self.sweep_one(code);
        self.rooms.contains_key(code)
    }

    pub fn get(&self, code: &str) -> Option<RoomHandle> {
        self.sweep_one(code);
        self.rooms.get(code).map(|h| h.value().clone())
    }

    /// Drops any handle whose room task has exited, lazily, so lookups
    /// never hand back a dead handle.
    fn sweep_one(&self, code: &str) {
        let dead = self.rooms.get(code).map(|h| h.is_closed()).unwrap_or(false);
        if dead {
            self.rooms.remove(code);
        }
    }

    /// Full sweep over every tracked room, for the periodic GC task.
    pub fn sweep_all(&self) {
        let dead: Vec<String> = self.rooms.iter().filter(|entry| entry.value().is_closed()).map(|entry| entry.key().clone()).collect();
        for code in dead {
            self.rooms.remove(&code);
        }
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DirectoryError {
    #[error("could not allocate a free room code after {MAX_CODE_ATTEMPTS} attempts")]
    OutOfCodes,
}

fn random_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN).map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char).collect()
}

/// Runs forever, periodically sweeping closed rooms out of the directory.
/// Exits once the graceful-interrupt flag is set.
pub async fn run_gc(directory: Arc<RoomDirectory>, interval: Duration) {
    let mut tick = tokio::time::interval(interval);
    loop {
        tick.tick().await;
        if talespin_core::runtime::interrupted() {
            break;
        }
        directory.sweep_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WinCondition;

    fn directory() -> RoomDirectory {
        let registry = Arc::new((0..20).map(|i| format!("card{i}")).collect());
        RoomDirectory::new(registry, Duration::from_secs(300), Duration::from_secs(600))
    }

    #[tokio::test]
    async fn create_assigns_a_lowercase_alphanumeric_code() {
        let dir = directory();
        let code = dir.create(Some("alice".into()), RoomConfig::new(WinCondition::Points { target: 10 }, None)).unwrap();
        assert_eq!(code.len(), CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert!(dir.exists(&code));
    }

    #[tokio::test]
    async fn unknown_code_does_not_exist() {
        let dir = directory();
        assert!(!dir.exists("zzzzz"));
        assert!(dir.get("zzzzz").is_none());
    }
}
