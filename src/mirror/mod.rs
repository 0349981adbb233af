pub mod github;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::message::Message;

/// The JSON document committed to the remote repository for one message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorDocument {
    pub id: i64,
    pub content: String,
    #[serde(default)]
    pub author: Option<String>,
    pub timestamp: String,
}

impl From<&Message> for MirrorDocument {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            content: message.content.clone(),
            author: message.author.clone(),
            timestamp: message.timestamp.clone(),
        }
    }
}

impl MirrorDocument {
    /// Pretty-printed with two-space indentation.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Outcome of a successful push
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorReceipt {
    pub path: String,
    pub commit_sha: String,
    pub url: String,
}

/// A remote copy of the message store. One file per message.
#[async_trait]
pub trait MessageMirror: Send + Sync {
    /// Create the message's file, or update it if it already exists.
    async fn push(&self, message: &Message) -> Result<MirrorReceipt>;

    /// Read a mirrored message back. `Ok(None)` when the file does not exist.
    async fn fetch(&self, id: i64, timestamp: DateTime<Utc>) -> Result<Option<MirrorDocument>>;
}

/// `{dir}/{YYYY}/{MM}/message_{id}.json`, bucketed by the message's own timestamp.
pub fn message_path(dir: &str, id: i64, at: DateTime<Utc>) -> String {
    let dir = dir.trim_matches('/');
    let file = format!("{:04}/{:02}/message_{}.json", at.year(), at.month(), id);
    if dir.is_empty() {
        file
    } else {
        format!("{}/{}", dir, file)
    }
}
