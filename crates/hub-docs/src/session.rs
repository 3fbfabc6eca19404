// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! A single CRDT document session.

use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;
use yrs::{Doc, GetString, Text, Transact};

use crate::color::color_for;

pub type ChannelId = Uuid;

/// Per-editor transient metadata, not part of document content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Awareness {
    pub agent_id: Uuid,
    pub name: String,
    pub role: String,
    pub environment: Option<String>,
    pub color: &'static str,
    pub cursor: Option<u32>,
    pub is_typing: bool,
}

/// A patch applied to an existing awareness entry by `updateAwareness`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AwarenessPatch {
    pub cursor: Option<u32>,
    pub is_typing: Option<bool>,
}

/// Frames pushed to a joined channel. The collab transport (hub-server)
/// translates these into the wire-level JSON/binary split the collab
/// WebSocket bridge speaks.
#[derive(Debug)]
pub enum Frame {
    Sync { snapshot: Vec<u8> },
    Awareness { editors: Vec<Awareness> },
    Update(Vec<u8>),
    Error { message: String },
}

/// Metadata returned by `listSessions` / the `/sessions` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SessionMeta {
    pub path: String,
    pub editors: usize,
    pub update_count: u64,
    pub last_activity: DateTime<Utc>,
}

pub struct DocSession {
    pub path: String,
    pub doc: Doc,
    /// Channels currently joined to this session, each with an outbound
    /// sender the manager pushes [`Frame`]s through.
    pub editors: HashMap<ChannelId, mpsc::UnboundedSender<Frame>>,
    pub awareness: HashMap<Uuid, Awareness>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub update_count: u64,
    /// Bumped every time the editor set transitions 0 -> nonzero, so a
    /// GC timer armed against an earlier emptying doesn't destroy a
    /// session that has since been rejoined.
    pub(crate) generation: u64,
    pub(crate) empty_since: Option<Instant>,
}

impl DocSession {
    pub fn new(path: String, initial: Option<&str>) -> Self {
        let doc = Doc::new();
        if let Some(initial) = initial {
            let text = doc.get_or_insert_text("content");
            let mut txn = doc.transact_mut();
            text.insert(&mut txn, 0, initial);
        }
        let now = crate::clock_now();
        Self {
            path,
            doc,
            editors: HashMap::new(),
            awareness: HashMap::new(),
            created_at: now,
            last_activity: now,
            update_count: 0,
            generation: 0,
            empty_since: None,
        }
    }

    pub fn text_content(&self) -> String {
        let text = self.doc.get_or_insert_text("content");
        let txn = self.doc.transact();
        text.get_string(&txn)
    }

    pub fn snapshot(&self) -> Vec<u8> {
        use yrs::updates::encoder::Encode;
        let txn = self.doc.transact();
        txn.encode_state_as_update_v1(&yrs::StateVector::default())
    }

    pub fn meta(&self) -> SessionMeta {
        SessionMeta {
            path: self.path.clone(),
            editors: self.editors.len(),
            update_count: self.update_count,
            last_activity: self.last_activity,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = crate::clock_now();
    }

    pub fn editor_color(agent_id: Uuid) -> &'static str {
        color_for(agent_id)
    }

    pub fn broadcast(&self, frame: Frame, except: Option<ChannelId>) {
        for (channel, tx) in self.editors.iter() {
            if Some(*channel) == except {
                continue;
            }
            // Channels are owned by the transport layer; a closed
            // receiver just means the peer disconnected mid-broadcast.
            let _ = tx.send(frame.clone());
        }
    }
}

impl Clone for Frame {
    fn clone(&self) -> Self {
        match self {
            Frame::Sync { snapshot } => Frame::Sync {
                snapshot: snapshot.clone(),
            },
            Frame::Awareness { editors } => Frame::Awareness {
                editors: editors.clone(),
            },
            Frame::Update(bytes) => Frame::Update(bytes.clone()),
            Frame::Error { message } => Frame::Error {
                message: message.clone(),
            },
        }
    }
}
