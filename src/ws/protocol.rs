//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

use crate::game::GameSnapshot;
use crate::gesture::GestureLabel;

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Start a game (also resets a finished one)
    Start,

    /// Restart mid-game; same effect as `Start`
    Restart,

    /// Discrete command from speech recognition
    Command {
        #[serde(default)]
        command: String,
    },

    /// Camera frame token for gesture extraction
    Frame {
        #[serde(default)]
        frame: String,
    },

    /// Poll mode: advance one tick and reply with the state
    Update,

    /// Latency check
    Ping,

    /// Client turned its camera off
    StopCamera,

    /// Any other `type`; logged and ignored
    #[serde(other)]
    Unknown,
}

impl ClientMsg {
    /// Parse one text frame. Unparseable text is a protocol fault.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Malformed)
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Reply to `start`
    GameStarted { state: GameSnapshot },

    /// Reply to `restart`
    GameRestarted { state: GameSnapshot },

    /// Tick-loop push or `update` reply
    GameState {
        state: GameSnapshot,
        /// Most recent gesture label (gesture sessions only)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gesture: Option<GestureLabel>,
    },

    /// Annotated camera frame echoed back for display
    VideoFrame {
        frame: String,
        gesture: GestureLabel,
        hand_detected: bool,
        description: String,
    },

    /// Acknowledges `stop_camera`
    CameraStopped,

    /// Reply to `ping`
    Pong,
}

impl ServerMsg {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed client message: {0}")]
    Malformed(serde_json::Error),

    #[error("Failed to encode server message: {0}")]
    Encode(serde_json::Error),
}
