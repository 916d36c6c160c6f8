use serde::{Deserialize, Serialize};

use crate::ids::ConnectionId;

/// Messages exchanged with the signaling server.
/// The wire format belongs to the transport; this is the decoded shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalingMessage {
    Connect {
        #[serde(rename = "connectionId")]
        connection_id: ConnectionId,
        #[serde(default)]
        polite: bool,
    },
    Disconnect {
        #[serde(rename = "connectionId")]
        connection_id: ConnectionId,
    },
    Offer {
        #[serde(rename = "connectionId")]
        connection_id: ConnectionId,
        sdp: String,
    },
    Answer {
        #[serde(rename = "connectionId")]
        connection_id: ConnectionId,
        sdp: String,
    },
    Candidate {
        #[serde(rename = "connectionId")]
        connection_id: ConnectionId,
        candidate: String,
        #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
        sdp_mid: Option<String>,
        #[serde(rename = "sdpMLineIndex", default, skip_serializing_if = "Option::is_none")]
        sdp_m_line_index: Option<u16>,
    },
}

impl SignalingMessage {
    /// Message kind as used in the wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Disconnect { .. } => "disconnect",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::Candidate { .. } => "candidate",
        }
    }

    pub fn connection_id(&self) -> &ConnectionId {
        match self {
            Self::Connect { connection_id, .. }
            | Self::Disconnect { connection_id }
            | Self::Offer { connection_id, .. }
            | Self::Answer { connection_id, .. }
            | Self::Candidate { connection_id, .. } => connection_id,
        }
    }
}

/// Session lifecycle events emitted by the engine and fanned out by the hub.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    #[serde(rename = "started")]
    Started,

    #[serde(rename = "connection_created")]
    ConnectionCreated { connection_id: ConnectionId },

    #[serde(rename = "connection_deleted")]
    ConnectionDeleted { connection_id: ConnectionId },

    #[serde(rename = "connected")]
    Connected {
        connection_id: ConnectionId,
        polite: bool,
    },

    #[serde(rename = "disconnected")]
    Disconnected { connection_id: ConnectionId },

    #[serde(rename = "offer_received")]
    OfferReceived {
        connection_id: ConnectionId,
        sdp: String,
    },

    #[serde(rename = "answer_received")]
    AnswerReceived {
        connection_id: ConnectionId,
        sdp: String,
    },

    #[serde(rename = "candidate_received")]
    CandidateReceived {
        connection_id: ConnectionId,
        candidate: String,
        sdp_mid: Option<String>,
        sdp_m_line_index: Option<u16>,
    },

    /// A remote media track arrived on a connection.
    #[serde(rename = "track_added")]
    TrackAdded {
        connection_id: ConnectionId,
        track_id: String,
        kind: String,
    },

    /// A remote data channel opened on a connection.
    #[serde(rename = "channel_added")]
    ChannelAdded {
        connection_id: ConnectionId,
        label: String,
    },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::ConnectionCreated { .. } => "connection_created",
            Self::ConnectionDeleted { .. } => "connection_deleted",
            Self::Connected { .. } => "connected",
            Self::Disconnected { .. } => "disconnected",
            Self::OfferReceived { .. } => "offer_received",
            Self::AnswerReceived { .. } => "answer_received",
            Self::CandidateReceived { .. } => "candidate_received",
            Self::TrackAdded { .. } => "track_added",
            Self::ChannelAdded { .. } => "channel_added",
        }
    }

    pub fn connection_id(&self) -> Option<&ConnectionId> {
        match self {
            Self::Started => None,
            Self::ConnectionCreated { connection_id }
            | Self::ConnectionDeleted { connection_id }
            | Self::Connected { connection_id, .. }
            | Self::Disconnected { connection_id }
            | Self::OfferReceived { connection_id, .. }
            | Self::AnswerReceived { connection_id, .. }
            | Self::CandidateReceived { connection_id, .. }
            | Self::TrackAdded { connection_id, .. }
            | Self::ChannelAdded { connection_id, .. } => Some(connection_id),
        }
    }
}
