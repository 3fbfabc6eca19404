// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The document session manager: create/join/leave, update and
//! awareness broadcast, and deferred GC of emptied sessions.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use uuid::Uuid;
use yrs::updates::decoder::Decode;
use yrs::{Transact, Update};

use crate::error::DocError;
use crate::session::{Awareness, AwarenessPatch, ChannelId, DocSession, Frame, SessionMeta};

pub const GC_DELAY: Duration = Duration::from_secs(60);

#[derive(Default)]
pub struct DocManager {
    sessions: HashMap<String, DocSession>,
}

pub struct CreateResult {
    pub created: bool,
    pub meta: SessionMeta,
}

impl DocManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: returns the existing session's metadata unchanged if one
    /// already exists for `path`.
    pub fn create(&mut self, path: String, initial: Option<String>) -> CreateResult {
        if let Some(existing) = self.sessions.get(&path) {
            return CreateResult {
                created: false,
                meta: existing.meta(),
            };
        }
        let session = DocSession::new(path.clone(), initial.as_deref());
        let meta = session.meta();
        self.sessions.insert(path, session);
        CreateResult {
            created: true,
            meta,
        }
    }

    /// Returns `None` if the doc does not exist — callers must `create`
    /// first.
    pub fn join(
        &mut self,
        path: &str,
        channel: ChannelId,
        agent_id: Uuid,
        name: String,
        role: String,
        environment: Option<String>,
        sender: tokio::sync::mpsc::UnboundedSender<Frame>,
    ) -> Option<(Vec<u8>, Vec<Awareness>)> {
        let session = self.sessions.get_mut(path)?;
        if session.editors.is_empty() {
            session.generation += 1;
            session.empty_since = None;
        }
        session.editors.insert(channel, sender);
        session.awareness.insert(
            agent_id,
            Awareness {
                agent_id,
                name,
                role,
                environment,
                color: DocSession::editor_color(agent_id),
                cursor: None,
                is_typing: false,
            },
        );
        session.touch();
        let snapshot = session.snapshot();
        let editors: Vec<Awareness> = session.awareness.values().cloned().collect();
        session.broadcast(
            Frame::Awareness {
                editors: editors.clone(),
            },
            None,
        );
        Some((snapshot, editors))
    }

    /// Remove `channel` from `path`'s editor set. If the set empties, arms
    /// the session's generation for GC and returns the generation the
    /// caller should check after [`GC_DELAY`].
    pub fn leave(&mut self, path: &str, channel: ChannelId, agent_id: Option<Uuid>) -> Option<u64> {
        let session = self.sessions.get_mut(path)?;
        session.editors.remove(&channel);
        if let Some(agent_id) = agent_id {
            session.awareness.remove(&agent_id);
        }
        session.touch();
        if !session.editors.is_empty() {
            let editors: Vec<Awareness> = session.awareness.values().cloned().collect();
            session.broadcast(Frame::Awareness { editors }, None);
            return None;
        }
        session.empty_since = Some(Instant::now());
        Some(session.generation)
    }

    /// Destroy `path`'s session iff it is still empty and its generation
    /// matches (no rejoin happened since the GC timer was armed).
    pub fn gc_if_still_empty(&mut self, path: &str, generation: u64) -> bool {
        let should_remove = match self.sessions.get(path) {
            Some(session) => session.editors.is_empty() && session.generation == generation,
            None => false,
        };
        if should_remove {
            self.sessions.remove(path);
        }
        should_remove
    }

    pub fn apply_update(
        &mut self,
        path: &str,
        bytes: Vec<u8>,
        sender: ChannelId,
    ) -> Result<(), DocError> {
        let session = self
            .sessions
            .get_mut(path)
            .ok_or_else(|| DocError::NotFound(path.to_string()))?;
        let update = Update::decode_v1(&bytes)
            .map_err(|e| DocError::InvalidInput(format!("bad CRDT update: {e}")))?;
        {
            let mut txn = session.doc.transact_mut();
            txn.apply_update(update);
        }
        session.update_count += 1;
        session.touch();
        session.broadcast(Frame::Update(bytes), Some(sender));
        Ok(())
    }

    pub fn update_awareness(
        &mut self,
        path: &str,
        agent_id: Uuid,
        patch: AwarenessPatch,
    ) -> Result<(), DocError> {
        let session = self
            .sessions
            .get_mut(path)
            .ok_or_else(|| DocError::NotFound(path.to_string()))?;
        let entry = session
            .awareness
            .get_mut(&agent_id)
            .ok_or_else(|| DocError::NotFound(format!("awareness for {agent_id}")))?;
        if let Some(cursor) = patch.cursor {
            entry.cursor = Some(cursor);
        }
        if let Some(is_typing) = patch.is_typing {
            entry.is_typing = is_typing;
        }
        session.touch();
        let editors: Vec<Awareness> = session.awareness.values().cloned().collect();
        session.broadcast(Frame::Awareness { editors }, None);
        Ok(())
    }

    pub fn snapshot(&self, path: &str) -> Option<Vec<u8>> {
        self.sessions.get(path).map(|s| s.snapshot())
    }

    pub fn text_content(&self, path: &str) -> Option<String> {
        self.sessions.get(path).map(|s| s.text_content())
    }

    pub fn list_sessions(&self) -> Vec<SessionMeta> {
        self.sessions.values().map(|s| s.meta()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn create_is_idempotent() {
        let mut mgr = DocManager::new();
        let first = mgr.create("a.ts".to_string(), Some("hi".to_string()));
        assert!(first.created);
        let second = mgr.create("a.ts".to_string(), Some("bye".to_string()));
        assert!(!second.created);
        assert_eq!(mgr.text_content("a.ts").unwrap(), "hi");
    }

    #[test]
    fn join_fails_without_create() {
        let mut mgr = DocManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = mgr.join(
            "missing.ts",
            Uuid::new_v4(),
            Uuid::new_v4(),
            "a".to_string(),
            "coder".to_string(),
            None,
            tx,
        );
        assert!(result.is_none());
    }

    #[test]
    fn round_trip_create_and_read_text() {
        let mut mgr = DocManager::new();
        mgr.create("b.ts".to_string(), Some("init".to_string()));
        assert_eq!(mgr.text_content("b.ts").unwrap(), "init");
    }

    #[test]
    fn leave_empties_arms_gc_generation() {
        let mut mgr = DocManager::new();
        mgr.create("c.ts".to_string(), None);
        let (tx, _rx) = mpsc::unbounded_channel();
        let channel = Uuid::new_v4();
        let agent = Uuid::new_v4();
        mgr.join(
            "c.ts",
            channel,
            agent,
            "a".to_string(),
            "coder".to_string(),
            None,
            tx,
        );
        let gen = mgr.leave("c.ts", channel, Some(agent));
        assert_eq!(gen, Some(0));
        assert!(mgr.gc_if_still_empty("c.ts", 0));
        assert!(mgr.text_content("c.ts").is_none());
    }

    #[test]
    fn rejoin_before_gc_survives() {
        let mut mgr = DocManager::new();
        mgr.create("d.ts".to_string(), None);
        let (tx, _rx) = mpsc::unbounded_channel();
        let channel = Uuid::new_v4();
        let agent = Uuid::new_v4();
        mgr.join(
            "d.ts",
            channel,
            agent,
            "a".to_string(),
            "coder".to_string(),
            None,
            tx.clone(),
        );
        let gen = mgr.leave("d.ts", channel, Some(agent)).unwrap();

        let channel2 = Uuid::new_v4();
        mgr.join(
            "d.ts",
            channel2,
            agent,
            "a".to_string(),
            "coder".to_string(),
            None,
            tx,
        );
        assert!(!mgr.gc_if_still_empty("d.ts", gen));
        assert!(mgr.text_content("d.ts").is_some());
    }
}
