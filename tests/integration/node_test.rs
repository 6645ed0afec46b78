//! Integration tests for the flow node driven end to end.

#![cfg(unix)]

use crate::test_utils::shell_manager;
use play_soundfile::audio::PlaybackOptions;
use play_soundfile::node::{FlowMessage, NodeConfig, NodeEvent, NodeStatus, PlaySoundfileNode};
use std::time::Duration;
use tempfile::tempdir;
use tokio::time::timeout;

#[tokio::test]
async fn test_message_round_trip_through_node() {
    let dir = tempdir().expect("tempdir");
    std::fs::write(dir.path().join("test.wav"), b"RIFF").expect("fixture");

    let config = NodeConfig {
        name: "doorbell".to_string(),
        directory: dir.path().to_string_lossy().into_owned(),
        file: "test.wav".to_string(),
        options: NodeConfig::parse_options("{}").expect("options"),
        allow_multiple: false,
    };
    assert_eq!(config.options, PlaybackOptions::default());

    let (node, mut events) = PlaySoundfileNode::new(config, shell_manager("exit 0"));
    let msg: FlowMessage = serde_json::from_str(r#"{"_msgid":"int1","payload":"integration-test","extra":true}"#)
        .expect("message");
    node.receive(msg.clone());

    let mut seen = Vec::new();
    loop {
        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out")
            .expect("channel closed");
        let done = matches!(event, NodeEvent::Output(_) | NodeEvent::Error { .. });
        seen.push(event);
        if done {
            break;
        }
    }

    assert_eq!(
        seen,
        vec![
            NodeEvent::Status(NodeStatus::playing()),
            NodeEvent::Status(NodeStatus::cleared()),
            NodeEvent::Output(msg),
        ]
    );
}
