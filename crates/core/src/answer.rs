use crate::error::GenerationError;
use crate::models::{AnswerOutcome, FailureKind, FallbackReason};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error};

const PROMPT_LOG_CHARS: usize = 500;

/// A language model that turns a prompt into response text.
#[async_trait]
pub trait AnswerModel {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Builds grounded prompts from retrieved chunks and hands them to the model.
#[derive(Clone)]
pub struct AnswerAssembler {
    model: Option<Arc<dyn AnswerModel + Send + Sync>>,
}

impl AnswerAssembler {
    pub fn new(model: Arc<dyn AnswerModel + Send + Sync>) -> Self {
        Self { model: Some(model) }
    }

    /// An assembler with no model; every answer is the configuration fallback.
    pub fn unconfigured() -> Self {
        Self { model: None }
    }

    pub fn from_optional(model: Option<Arc<dyn AnswerModel + Send + Sync>>) -> Self {
        Self { model }
    }

    pub fn is_configured(&self) -> bool {
        self.model.is_some()
    }

    pub async fn answer(&self, query: &str, context_chunks: &[String]) -> AnswerOutcome {
        let Some(model) = &self.model else {
            error!("language model not configured; returning configuration fallback");
            return AnswerOutcome::Failed(FailureKind::Config);
        };

        if context_chunks.is_empty() {
            return AnswerOutcome::Fallback(FallbackReason::NoContext);
        }

        let prompt = build_prompt(query, context_chunks);
        debug!(
            prompt = %prompt.chars().take(PROMPT_LOG_CHARS).collect::<String>(),
            "sending prompt to model"
        );

        match model.generate(&prompt).await {
            Ok(text) => AnswerOutcome::Answered(text),
            Err(err) => {
                error!(error = %err, "error calling language model");
                AnswerOutcome::Failed(FailureKind::Generation)
            }
        }
    }
}

/// The grounding prompt: context chunks separated by blank lines, wrapped in
/// instructions that restrict the model to that content.
pub fn build_prompt(query: &str, context_chunks: &[String]) -> String {
    let context = context_chunks.join("\n\n");
    format!(
        "You are an AI assistant that answers questions based ONLY on the provided financial document content.\n\
         If the answer cannot be found in the provided content, state that you don't have enough information.\n\
         Do NOT make up information.\n\
         \n\
         Financial Document Content:\n\
         ---\n\
         {context}\n\
         ---\n\
         \n\
         User Question: {query}\n\
         \n\
         Answer:\n"
    )
}
