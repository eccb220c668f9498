//! In-memory room registry.
//!
//! Tracks connected clients, the room each one is in and its display name,
//! and owns each client's outbound message channel. Implements [`Rooms`] for
//! the dispatcher.

use crate::rooms::{ClientId, Notice, Rooms};
use compact_str::CompactString;
use protocol::ServerMessage;
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};
use thiserror::Error;
use tokio::sync::mpsc;

/// Why a join was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("Username already exists.")]
    UsernameTaken,
    #[error("Unknown client.")]
    UnknownClient,
}

/// A user who left a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub room: CompactString,
    pub username: CompactString,
}

#[derive(Debug, Clone)]
struct Member {
    client_id: ClientId,
    username: CompactString,
}

struct Client {
    tx: mpsc::UnboundedSender<ServerMessage>,
    room: Option<CompactString>,
}

#[derive(Default)]
struct State {
    clients: HashMap<ClientId, Client>,
    rooms: HashMap<CompactString, Vec<Member>>,
}

impl State {
    fn send(&self, client_id: &str, msg: ServerMessage) {
        if let Some(client) = self.clients.get(client_id) {
            let _ = client.tx.send(msg);
        }
    }

    fn leave(&mut self, client_id: &str) -> Option<Departure> {
        let room = self.clients.get_mut(client_id)?.room.take()?;
        let members = self.rooms.get_mut(&room)?;
        let index = members.iter().position(|m| m.client_id == client_id)?;
        let member = members.remove(index);

        if members.is_empty() {
            self.rooms.remove(&room);
            tracing::debug!("room {room} is empty, removed");
        } else {
            let others: Vec<ClientId> = members.iter().map(|m| m.client_id.clone()).collect();
            for other in &others {
                self.send(
                    other,
                    ServerMessage::UserLeft {
                        username: member.username.clone(),
                        room: room.clone(),
                    },
                );
            }
        }

        tracing::debug!("{} left room {room}", member.username);
        Some(Departure {
            room,
            username: member.username,
        })
    }
}

/// Connected clients and their rooms.
#[derive(Default)]
pub struct Lobby {
    state: Mutex<State>,
}

impl Lobby {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a connection and the channel its messages go to.
    pub fn register(&self, client_id: ClientId, tx: mpsc::UnboundedSender<ServerMessage>) {
        self.state().clients.insert(client_id, Client { tx, room: None });
    }

    /// Remove a connection, leaving its room first.
    pub fn unregister(&self, client_id: &str) -> Option<Departure> {
        let mut state = self.state();
        let departure = state.leave(client_id);
        state.clients.remove(client_id);
        departure
    }

    /// Put `client_id` into `room` as `username`, leaving any previous room.
    ///
    /// Everyone already in the room is told about the newcomer. Returns the
    /// usernames that were already there.
    pub fn join(
        &self,
        client_id: &str,
        room: &str,
        username: &str,
    ) -> Result<Vec<CompactString>, JoinError> {
        let mut state = self.state();
        if !state.clients.contains_key(client_id) {
            return Err(JoinError::UnknownClient);
        }
        let taken = state.rooms.get(room).is_some_and(|members| {
            members
                .iter()
                .any(|m| m.username == username && m.client_id != client_id)
        });
        if taken {
            return Err(JoinError::UsernameTaken);
        }

        state.leave(client_id);

        let members = state.rooms.entry(room.into()).or_default();
        let existing: Vec<Member> = members.clone();
        members.push(Member {
            client_id: client_id.into(),
            username: username.into(),
        });
        if let Some(client) = state.clients.get_mut(client_id) {
            client.room = Some(room.into());
        }

        for member in &existing {
            state.send(
                &member.client_id,
                ServerMessage::UserJoined {
                    username: username.into(),
                },
            );
        }
        tracing::info!("{username} joined room {room}");
        Ok(existing.into_iter().map(|m| m.username).collect())
    }

    /// Take `client_id` out of its room, telling the rest of the room.
    pub fn leave(&self, client_id: &str) -> Option<Departure> {
        self.state().leave(client_id)
    }

    /// Number of non-empty rooms.
    pub fn room_count(&self) -> usize {
        self.state().rooms.len()
    }
}

impl Rooms for Lobby {
    fn group_of(&self, client: &str) -> Option<CompactString> {
        self.state().clients.get(client)?.room.clone()
    }

    fn members(&self, group: &str) -> Vec<ClientId> {
        self.state()
            .rooms
            .get(group)
            .map(|members| members.iter().map(|m| m.client_id.clone()).collect())
            .unwrap_or_default()
    }

    fn deliver(&self, client: &str, notice: Notice) {
        self.state().send(client, notice.into());
    }
}
