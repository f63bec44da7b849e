//! Milestone detection and congratulatory messages.
//!
//! Reaching day 1, 3, 7, 14 or 21 of a streak may earn a short motivational
//! message from a language-model endpoint. Fetching it is network-bound and
//! fallible, so it happens after the check-in is stored and never decides
//! whether the check-in succeeded.

use crate::config::MilestoneConfig;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Text used when the endpoint answers without any output.
pub const FALLBACK_MESSAGE: &str = "Keep going, you're doing great!";

/// Streak lengths that earn a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Milestone {
    Day1,
    Day3,
    Day7,
    Day14,
    Day21,
}

impl Milestone {
    /// All milestones in ascending order.
    pub const ALL: [Milestone; 5] = [
        Milestone::Day1,
        Milestone::Day3,
        Milestone::Day7,
        Milestone::Day14,
        Milestone::Day21,
    ];

    /// Streak length this milestone stands for.
    pub fn day(self) -> u32 {
        match self {
            Self::Day1 => 1,
            Self::Day3 => 3,
            Self::Day7 => 7,
            Self::Day14 => 14,
            Self::Day21 => 21,
        }
    }

    /// The milestone for an exact streak length.
    pub fn from_streak(streak: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.day() == streak)
    }
}

impl Serialize for Milestone {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.day())
    }
}

impl<'de> Deserialize<'de> for Milestone {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let day = u32::deserialize(deserializer)?;
        Self::from_streak(day)
            .ok_or_else(|| de::Error::custom(format!("{} is not a milestone day", day)))
    }
}

/// Message attached to a habit state when a milestone is reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneMessage {
    pub milestone_day: Milestone,
    pub message: String,
}

/// Milestone message errors.
#[derive(Debug, Error)]
pub enum MilestoneError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Produces congratulatory messages.
pub trait MilestoneMessenger {
    /// Message for a habit that just reached `milestone`, or `None` when
    /// messages are turned off.
    async fn congratulate(
        &self,
        habit_name: &str,
        milestone: Milestone,
    ) -> Result<Option<MilestoneMessage>, MilestoneError>;
}

/// Messenger chosen from configuration.
pub enum Messenger {
    OpenAi(OpenAiMessenger),
    Disabled,
}

impl Messenger {
    /// Build the messenger described by `config`.
    ///
    /// Messages are disabled when turned off or when no API key is set.
    pub fn from_config(config: &MilestoneConfig) -> Result<Self, MilestoneError> {
        match (&config.api_key, config.enabled) {
            (Some(key), true) if !key.trim().is_empty() => {
                Ok(Self::OpenAi(OpenAiMessenger::new(config, key.trim())?))
            }
            _ => {
                debug!("milestone messages disabled");
                Ok(Self::Disabled)
            }
        }
    }
}

impl MilestoneMessenger for Messenger {
    async fn congratulate(
        &self,
        habit_name: &str,
        milestone: Milestone,
    ) -> Result<Option<MilestoneMessage>, MilestoneError> {
        match self {
            Self::OpenAi(m) => m.congratulate(habit_name, milestone).await,
            Self::Disabled => Ok(None),
        }
    }
}

/// Client for an OpenAI-compatible Responses endpoint.
pub struct OpenAiMessenger {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiMessenger {
    pub fn new(config: &MilestoneConfig, api_key: &str) -> Result<Self, MilestoneError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self::with_client(client, config, api_key))
    }

    /// Use a preconfigured HTTP client.
    pub fn with_client(client: reqwest::Client, config: &MilestoneConfig, api_key: &str) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: api_key.to_string(),
            model: config.model.clone(),
        }
    }
}

impl MilestoneMessenger for OpenAiMessenger {
    async fn congratulate(
        &self,
        habit_name: &str,
        milestone: Milestone,
    ) -> Result<Option<MilestoneMessage>, MilestoneError> {
        let request = ResponsesRequest {
            model: &self.model,
            input: prompt(habit_name, milestone),
        };

        let reply: ResponsesReply = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let message = reply
            .output_text()
            .unwrap_or_else(|| FALLBACK_MESSAGE.to_string());
        info!(day = milestone.day(), "milestone message received");

        Ok(Some(MilestoneMessage {
            milestone_day: milestone,
            message,
        }))
    }
}

fn prompt(habit_name: &str, milestone: Milestone) -> String {
    format!(
        "User just hit day {} of habit \"{}\". Give a short punchy motivation message (max 18 words).",
        milestone.day(),
        habit_name
    )
}

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: String,
}

#[derive(Debug, Default, Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl ResponsesReply {
    /// Concatenated `output_text` parts, trimmed; `None` if empty.
    fn output_text(&self) -> Option<String> {
        let text: String = self
            .output
            .iter()
            .flat_map(|item| &item.content)
            .filter(|part| part.kind == "output_text")
            .filter_map(|part| part.text.as_deref())
            .collect();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}
