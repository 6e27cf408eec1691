use crate::constants::REGISTRY_TAG;
use crate::error::SubmissionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Celestial coordinates plus the owner's story.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Star {
    pub ra: String,
    pub dec: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cen: Option<String>,
    pub story: String,
}

/// Payload of a block created by a star submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarClaim {
    pub address: String,
    pub signature: String,
    pub message: String,
    pub star: Star,
}

/// The challenge a wallet signs before submitting a star:
/// `<address>:<timestamp>:starRegistry`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnershipMessage {
    pub address: String,
    pub timestamp: u64,
}

impl OwnershipMessage {
    pub fn new(address: impl Into<String>, timestamp: u64) -> Self {
        Self {
            address: address.into(),
            timestamp,
        }
    }

    pub fn parse(message: &str) -> Result<Self, SubmissionError> {
        let parts: Vec<&str> = message.split(':').collect();
        let [address, timestamp, tag] = parts[..] else {
            return Err(SubmissionError::MalformedMessage(format!(
                "expected 3 colon-separated fields, got {}",
                parts.len()
            )));
        };
        if tag != REGISTRY_TAG {
            return Err(SubmissionError::MalformedMessage(format!(
                "unknown protocol tag {tag:?}"
            )));
        }
        let timestamp = timestamp.parse::<u64>().map_err(|e| {
            SubmissionError::MalformedMessage(format!("bad timestamp {timestamp:?}: {e}"))
        })?;
        Ok(Self::new(address, timestamp))
    }
}

impl fmt::Display for OwnershipMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.address, self.timestamp, REGISTRY_TAG)
    }
}
