//! Directory of open tables.
//!
//! Each table is one [`GameSession`] behind its own mutex, so commands from
//! different connections at the same table apply one at a time while other
//! tables proceed independently. The directory locks are held only long
//! enough to clone an `Arc`; a session mutex is never taken while they are
//! held.

use coup_execution::{GameSession, RoomCode, SessionLimits};
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub type SharedSession = Arc<Mutex<GameSession>>;

const ROOM_CODE_ATTEMPTS: usize = 32;

pub struct Tables {
    rooms: RwLock<HashMap<RoomCode, SharedSession>>,
    seats: RwLock<HashMap<String, RoomCode>>,
    limits: SessionLimits,
}

/// Locks a session, recovering it if a previous holder panicked.
pub fn lock_session(session: &SharedSession) -> MutexGuard<'_, GameSession> {
    match session.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("session lock poisoned; recovering");
            poisoned.into_inner()
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("table directory lock poisoned; recovering");
            poisoned.into_inner()
        }
    }
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("table directory lock poisoned; recovering");
            poisoned.into_inner()
        }
    }
}

impl Tables {
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            seats: RwLock::new(HashMap::new()),
            limits,
        }
    }

    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    /// Opens an empty table under a fresh code. Returns `None` when no free
    /// code turned up.
    pub fn open(&self) -> Option<(RoomCode, SharedSession)> {
        self.open_with(&mut rand::thread_rng())
    }

    pub fn open_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<(RoomCode, SharedSession)> {
        let mut rooms = write(&self.rooms);
        for _ in 0..ROOM_CODE_ATTEMPTS {
            let code = RoomCode::generate(rng);
            if rooms.contains_key(&code) {
                continue;
            }
            let session = GameSession::with_limits(code.as_str(), self.limits);
            let shared = Arc::new(Mutex::new(session));
            rooms.insert(code.clone(), shared.clone());
            tracing::info!(room = %code, open = rooms.len(), "table opened");
            return Some((code, shared));
        }
        tracing::warn!(open = rooms.len(), "no free room code");
        None
    }

    pub fn get(&self, code: &RoomCode) -> Option<SharedSession> {
        read(&self.rooms).get(code).cloned()
    }

    /// Records that `client_id` sits at `code`. False if it already sits
    /// somewhere.
    pub fn seat(&self, client_id: &str, code: &RoomCode) -> bool {
        let mut seats = write(&self.seats);
        if seats.contains_key(client_id) {
            return false;
        }
        seats.insert(client_id.to_string(), code.clone());
        true
    }

    pub fn room_of(&self, client_id: &str) -> Option<RoomCode> {
        read(&self.seats).get(client_id).cloned()
    }

    pub fn unseat(&self, client_id: &str) -> Option<RoomCode> {
        write(&self.seats).remove(client_id)
    }

    pub fn drop_room(&self, code: &RoomCode) -> bool {
        let removed = write(&self.rooms).remove(code).is_some();
        if removed {
            tracing::info!(room = %code, "table closed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        read(&self.rooms).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
