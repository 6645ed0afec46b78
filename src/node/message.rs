use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Topic that turns an inbound message into a "stop everything" request.
pub const STOP_TOPIC: &str = "stop";

fn new_msgid() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Message flowing through the node. Unknown properties are kept as-is and
/// forwarded with the message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowMessage {
    #[serde(rename = "_msgid", default = "new_msgid")]
    pub msgid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default)]
    pub payload: Value,
    /// Overrides the node's configured file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Overrides the node's configured directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FlowMessage {
    /// New message with a fresh id and the given payload.
    pub fn new(payload: impl Into<Value>) -> Self {
        FlowMessage {
            msgid: new_msgid(),
            topic: None,
            payload: payload.into(),
            file: None,
            directory: None,
            extra: Map::new(),
        }
    }

    pub fn with_msgid(mut self, msgid: impl Into<String>) -> Self {
        self.msgid = msgid.into();
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn is_stop_request(&self) -> bool {
        self.topic.as_deref() == Some(STOP_TOPIC)
    }
}

/// Status badge shown next to the node. All fields empty means cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl NodeStatus {
    pub fn playing() -> Self {
        NodeStatus {
            fill: Some("green".to_string()),
            shape: Some("dot".to_string()),
            text: Some("playing".to_string()),
        }
    }

    pub fn cleared() -> Self {
        NodeStatus::default()
    }

    pub fn is_cleared(&self) -> bool {
        *self == NodeStatus::default()
    }
}

/// Everything the node reports back to the flow.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    /// Playback finished; the original message moves on.
    Output(FlowMessage),
    /// Something went wrong for `msg`; nothing is forwarded.
    Error { message: String, msg: FlowMessage },
    Status(NodeStatus),
}
