use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use super::{
    flows, ActionResult, ExtractTitleInput, ExtractTitleOutput, GenerationProvider, ImageDataUri,
    RecommendationsInput, RecommendationsOutput, SummaryInput, SummaryOutput, UsernameOutput,
};
use crate::error::ProviderError;

const SUMMARY_FAILED: &str = "Could not generate summary. Please try again later.";
const SUMMARY_INVALID: &str = "Invalid input provided for AI summary generation.";
const RECOMMENDATIONS_FAILED: &str = "Could not generate recommendations. Please try again later.";
const RECOMMENDATIONS_INVALID: &str = "Invalid input provided for AI recommendation generation.";
const USERNAME_FAILED: &str = "Could not generate username. Please try again later.";
const TITLE_FAILED: &str = "Could not extract title from image. Please try again.";
const TITLE_INVALID: &str = "Invalid image data provided.";

/// Entry points the UI calls. Each validates, runs one flow and maps every
/// failure to a fixed message.
#[derive(Clone)]
pub struct AiActions {
    provider: Arc<dyn GenerationProvider>,
}

impl AiActions {
    pub fn new(provider: Arc<dyn GenerationProvider>) -> Self {
        Self { provider }
    }

    pub async fn summary(&self, input: SummaryInput) -> ActionResult<SummaryOutput> {
        if input.book_title.trim().is_empty() || input.book_description.trim().is_empty() {
            tracing::warn!("invalid input for AI summary");
            return ActionResult::error(SUMMARY_INVALID);
        }
        self.run(flows::SUMMARY, &input, SUMMARY_FAILED).await
    }

    pub async fn recommendations(
        &self,
        input: RecommendationsInput,
    ) -> ActionResult<RecommendationsOutput> {
        if input.book_title.trim().is_empty()
            || input.book_author.trim().is_empty()
            || input.book_genres.is_empty()
        {
            tracing::warn!("invalid input for AI recommendations");
            return ActionResult::error(RECOMMENDATIONS_INVALID);
        }
        self.run(flows::RECOMMENDATIONS, &input, RECOMMENDATIONS_FAILED)
            .await
    }

    pub async fn username(&self) -> ActionResult<UsernameOutput> {
        self.run(flows::USERNAME, &json!({}), USERNAME_FAILED).await
    }

    /// Read the title off a cover photo. An empty title means none was found.
    pub async fn extract_title(
        &self,
        input: ExtractTitleInput,
    ) -> ActionResult<ExtractTitleOutput> {
        let image = match input.image_data_uri.parse::<ImageDataUri>() {
            Ok(image) => image,
            Err(err) => {
                tracing::warn!(error = %err, "invalid input for title extraction");
                return ActionResult::error(TITLE_INVALID);
            }
        };
        tracing::debug!(%image, "extracting title");
        self.run(flows::EXTRACT_TITLE, &input, TITLE_FAILED).await
    }

    async fn run<I, O>(&self, flow: &str, input: &I, failure: &str) -> ActionResult<O>
    where
        I: Serialize + Sync,
        O: DeserializeOwned,
    {
        match self.call(flow, input).await {
            Ok(output) => ActionResult::Ok(output),
            Err(err) => {
                tracing::error!(flow, error = %err, "AI flow failed");
                ActionResult::error(failure)
            }
        }
    }

    async fn call<I, O>(&self, flow: &str, input: &I) -> Result<O, ProviderError>
    where
        I: Serialize + Sync,
        O: DeserializeOwned,
    {
        let input = serde_json::to_value(input).map_err(|e| ProviderError::Decode(e.to_string()))?;
        let output: Value = self.provider.run_flow(flow, input).await?;
        serde_json::from_value(output).map_err(|e| ProviderError::Decode(e.to_string()))
    }
}
