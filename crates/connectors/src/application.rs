//! The application tag that routes a block to its connector.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifies which external application a block talks to.
///
/// Known applications get their own variant; anything else is carried as
/// [`Application::Custom`] so plugins can be registered without touching
/// this enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Application {
    NotesService,
    AiTextService,
    DesignFileService,
    Timer,
    Webhook,
    Transform,
    Filter,
    Custom(String),
}

impl Application {
    /// The kebab-case tag used in graph payloads.
    pub fn as_str(&self) -> &str {
        match self {
            Self::NotesService => "notes-service",
            Self::AiTextService => "ai-text-service",
            Self::DesignFileService => "design-file-service",
            Self::Timer => "timer",
            Self::Webhook => "webhook",
            Self::Transform => "transform",
            Self::Filter => "filter",
            Self::Custom(tag) => tag,
        }
    }

    /// Shorthand for [`Application::Custom`].
    pub fn custom(tag: impl Into<String>) -> Self {
        Self::from(tag.into())
    }
}

impl fmt::Display for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Application {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "notes-service" => Self::NotesService,
            "ai-text-service" => Self::AiTextService,
            "design-file-service" => Self::DesignFileService,
            "timer" => Self::Timer,
            "webhook" => Self::Webhook,
            "transform" => Self::Transform,
            "filter" => Self::Filter,
            _ => Self::Custom(tag),
        }
    }
}

impl From<&str> for Application {
    fn from(tag: &str) -> Self {
        Self::from(tag.to_owned())
    }
}

impl From<Application> for String {
    fn from(app: Application) -> Self {
        match app {
            Application::Custom(tag) => tag,
            known => known.as_str().to_owned(),
        }
    }
}

impl FromStr for Application {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tags_map_to_variants() {
        assert_eq!(Application::from("notes-service"), Application::NotesService);
        assert_eq!(Application::from("timer"), Application::Timer);
        assert_eq!(
            Application::from("crm"),
            Application::Custom("crm".to_string())
        );
    }

    #[test]
    fn serde_uses_the_tag() {
        let json = serde_json::to_string(&Application::AiTextService).unwrap();
        assert_eq!(json, "\"ai-text-service\"");

        let parsed: Application = serde_json::from_str("\"design-file-service\"").unwrap();
        assert_eq!(parsed, Application::DesignFileService);

        let custom: Application = serde_json::from_str("\"crm\"").unwrap();
        assert_eq!(custom.to_string(), "crm");
    }
}
