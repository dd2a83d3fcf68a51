use chrono::NaiveDateTime;
use std::fmt;

const PREVIEW_CHARS: usize = 40;

/// One outgoing publish, stamped when it was generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MQTTMessage {
    topic: String,
    content: String,
    timestamp: NaiveDateTime,
}

impl fmt::Display for MQTTMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let preview: String = self.content.chars().take(PREVIEW_CHARS).collect();
        if preview.len() < self.content.len() {
            write!(f, "{} - {}: {}...", self.timestamp, self.topic, preview)
        } else {
            write!(f, "{} - {}: {}", self.timestamp, self.topic, preview)
        }
    }
}

impl MQTTMessage {
    pub fn from_topic(topic: String, content: String) -> Self {
        MQTTMessage {
            topic,
            content,
            timestamp: chrono::Local::now().naive_local(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }
}
