//! Conversation Transcripts
//!
//! JSON-lines export and reload of a [`ConversationStore`]. The first record
//! is metadata, every following record is one message in chronological order.

use std::io::{BufRead, Write};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TutorError};
use crate::message::{ConversationStore, Message, Role};
use crate::tool::ToolCallRequest;

/// One line of a transcript
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TranscriptRecord {
    Metadata {
        message_count: usize,
        timestamp: DateTime<Utc>,
    },
    Message {
        index: usize,
        role: Role,
        content: String,
        timestamp: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_call_id: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
}

impl TranscriptRecord {
    fn from_message(index: usize, message: &Message) -> Self {
        Self::Message {
            index,
            role: message.role,
            content: message.content.clone(),
            timestamp: message.timestamp,
            tool_call_id: message.tool_call_id.clone(),
            tool_calls: message.tool_calls.clone(),
        }
    }
}

/// Write the store as JSON lines
pub fn write_transcript<W: Write>(store: &ConversationStore, mut writer: W) -> Result<()> {
    let metadata = TranscriptRecord::Metadata {
        message_count: store.count(),
        timestamp: Utc::now(),
    };
    serde_json::to_writer(&mut writer, &metadata)?;
    writer.write_all(b"\n")?;

    for (index, message) in store.messages().iter().enumerate() {
        serde_json::to_writer(&mut writer, &TranscriptRecord::from_message(index, message))?;
        writer.write_all(b"\n")?;
    }

    writer.flush()?;
    Ok(())
}

/// Render the store as a JSON-lines string
pub fn to_jsonl(store: &ConversationStore) -> Result<String> {
    let mut buf = Vec::new();
    write_transcript(store, &mut buf)?;
    String::from_utf8(buf).map_err(|e| TutorError::Parse(e.to_string()))
}

/// Append every message record to `store`, in file order.
///
/// Metadata records and blank lines are skipped. Returns the number of
/// messages appended.
pub fn load_transcript<R: BufRead>(reader: R, store: &mut ConversationStore) -> Result<usize> {
    let mut loaded = 0;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let record: TranscriptRecord = serde_json::from_str(&line)
            .map_err(|e| TutorError::Parse(format!("transcript line {}: {e}", line_no + 1)))?;

        if let TranscriptRecord::Message {
            role,
            content,
            timestamp,
            tool_call_id,
            tool_calls,
            ..
        } = record
        {
            store.push(Message {
                role,
                content,
                tool_call_id,
                tool_calls,
                timestamp,
            });
            loaded += 1;
        }
    }

    tracing::debug!(loaded, "Transcript loaded");
    Ok(loaded)
}

/// Parse a JSON-lines string into `store`
pub fn from_jsonl(text: &str, store: &mut ConversationStore) -> Result<usize> {
    load_transcript(text.as_bytes(), store)
}
