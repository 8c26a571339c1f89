//! AI flows - summaries, recommendations, cover OCR and username ideas from
//! a hosted prompt service.
//!
//! [`AiActions`] validates input, calls the [`GenerationProvider`] once, and
//! hands back an [`ActionResult`]: either the flow's output or an error value
//! with a message fit for display. Nothing here returns `Err` to the UI.

mod actions;
mod image;
mod provider;

use serde::{Deserialize, Serialize};

pub use actions::AiActions;
pub use image::ImageDataUri;
pub use provider::{GenerationProvider, HttpGenerationProvider};

/// Flow names on the prompt service.
pub mod flows {
    pub const SUMMARY: &str = "generateAiSummaryFlow";
    pub const RECOMMENDATIONS: &str = "generateAiRecommendationsFlow";
    pub const EXTRACT_TITLE: &str = "extractBookTitleFlow";
    pub const USERNAME: &str = "generateAiUsernameFlow";
}

/// Output of an action, or a displayable error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionResult<T> {
    Error { error: String },
    Ok(T),
}

impl<T> ActionResult<T> {
    pub fn error(message: impl Into<String>) -> Self {
        ActionResult::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ActionResult::Error { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ActionResult::Error { error } => Some(error),
            ActionResult::Ok(_) => None,
        }
    }

    pub fn ok(self) -> Option<T> {
        match self {
            ActionResult::Ok(value) => Some(value),
            ActionResult::Error { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryInput {
    pub book_title: String,
    pub book_description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryOutput {
    pub ai_summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationsInput {
    pub book_title: String,
    pub book_author: String,
    pub book_genres: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub author: String,
    /// One or two sentences on why it fits.
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationsOutput {
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractTitleInput {
    /// `data:<mimetype>;base64,<encoded_data>`
    pub image_data_uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractTitleOutput {
    /// Empty when no title could be read.
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsernameOutput {
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_result_serializes_as_error_field() {
        let result: ActionResult<SummaryOutput> = ActionResult::error("nope");
        assert_eq!(serde_json::to_value(&result).unwrap(), json!({ "error": "nope" }));
    }

    #[test]
    fn ok_result_is_the_bare_output() {
        let result = ActionResult::Ok(SummaryOutput {
            ai_summary: "A quote".into(),
        });
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({ "aiSummary": "A quote" })
        );

        let back: ActionResult<SummaryOutput> =
            serde_json::from_value(json!({ "aiSummary": "A quote" })).unwrap();
        assert_eq!(back, result);
    }
}
