//! Per-stream state and the table indexing active streams.

use std::collections::HashMap;

use crate::handler::StreamHandler;
use crate::wire::stream_id::StreamId;

/// Progress of our sending side of a stream. Moves only forward:
/// `Idle` → `Nofin` → `Fin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalState {
    /// Nothing sent yet.
    Idle,
    /// Response headers sent, body under way.
    Nofin,
    /// END_STREAM sent.
    Fin,
}

/// Progress of the client's sending side of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteState {
    /// The client may still send DATA.
    Nofin,
    /// The client sent END_STREAM.
    Fin,
}

pub(crate) struct HttpStream<S: StreamHandler> {
    pub local: LocalState,
    pub remote: RemoteState,
    /// Cumulative DATA bytes received from the client.
    pub body_length: u64,
    /// Handler state; `None` between insertion and a successful `init`.
    pub state: Option<S::State>,
}

impl<S: StreamHandler> HttpStream<S> {
    pub fn new(remote: RemoteState) -> HttpStream<S> {
        HttpStream {
            local: LocalState::Idle,
            remote,
            body_length: 0,
            state: None,
        }
    }
}

/// The active streams of a connection, indexed by id.
pub(crate) struct StreamMap<S: StreamHandler> {
    map: HashMap<StreamId, HttpStream<S>>,
}

impl<S: StreamHandler> StreamMap<S> {
    pub fn new() -> StreamMap<S> {
        StreamMap {
            map: HashMap::new(),
        }
    }

    pub fn insert(&mut self, stream_id: StreamId, stream: HttpStream<S>) {
        let displaced = self.map.insert(stream_id, stream);
        debug_assert!(displaced.is_none(), "stream {} already existed", stream_id);
    }

    pub fn get_mut(&mut self, stream_id: StreamId) -> Option<&mut HttpStream<S>> {
        self.map.get_mut(&stream_id)
    }

    pub fn contains(&self, stream_id: StreamId) -> bool {
        self.map.contains_key(&stream_id)
    }

    pub fn remove(&mut self, stream_id: StreamId) -> Option<HttpStream<S>> {
        self.map.remove(&stream_id)
    }

    pub fn drain(&mut self) -> Vec<(StreamId, HttpStream<S>)> {
        self.map.drain().collect()
    }

    pub fn snapshot(&self) -> Vec<StreamSnapshot> {
        let mut streams: Vec<StreamSnapshot> = self
            .map
            .iter()
            .map(|(&stream_id, stream)| StreamSnapshot {
                stream_id,
                local: stream.local,
                remote: stream.remote,
                body_length: stream.body_length,
            })
            .collect();
        streams.sort_by_key(|s| s.stream_id);
        streams
    }
}

/// Point-in-time view of one stream, for tests and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSnapshot {
    pub stream_id: StreamId,
    pub local: LocalState,
    pub remote: RemoteState,
    pub body_length: u64,
}

/// Point-in-time view of the connection state, for tests and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnStateSnapshot {
    pub streams: Vec<StreamSnapshot>,
}

impl ConnStateSnapshot {
    pub fn stream(&self, stream_id: StreamId) -> Option<&StreamSnapshot> {
        self.streams.iter().find(|s| s.stream_id == stream_id)
    }
}
