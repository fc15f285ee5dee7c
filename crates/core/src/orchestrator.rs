use crate::answer::AnswerAssembler;
use crate::error::QueryError;
use crate::models::{AnswerOutcome, FailureKind};
use crate::retriever::Retriever;
use crate::store::ChunkStore;
use std::fmt;
use tracing::{debug, info};

/// Lifecycle of a single question. Each question is attempted once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Received,
    Retrieving,
    ContextFound,
    NoContext,
    Generating,
    Answered,
    AnsweredWithFallback,
    Failed(FailureKind),
}

impl QueryState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            QueryState::Answered | QueryState::AnsweredWithFallback | QueryState::Failed(_)
        )
    }

    fn terminal_for(outcome: &AnswerOutcome) -> Self {
        match outcome {
            AnswerOutcome::Answered(_) => QueryState::Answered,
            AnswerOutcome::Fallback(_) => QueryState::AnsweredWithFallback,
            AnswerOutcome::Failed(kind) => QueryState::Failed(*kind),
        }
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryState::Failed(kind) => write!(f, "Failed({kind:?})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// The answer to one question together with the states it passed through.
#[derive(Debug, Clone)]
pub struct QueryTrace {
    pub outcome: AnswerOutcome,
    pub context: Vec<String>,
    pub states: Vec<QueryState>,
}

impl QueryTrace {
    pub fn final_state(&self) -> Option<QueryState> {
        self.states.last().copied()
    }
}

/// Retrieves grounding context for a question and produces the answer.
pub struct QuestionAnswerer<S> {
    retriever: Retriever<S>,
    assembler: AnswerAssembler,
}

impl<S> QuestionAnswerer<S>
where
    S: ChunkStore + Send + Sync,
{
    pub fn new(retriever: Retriever<S>, assembler: AnswerAssembler) -> Self {
        Self {
            retriever,
            assembler,
        }
    }

    pub async fn ask(&self, query: &str) -> Result<AnswerOutcome, QueryError> {
        Ok(self.ask_traced(query).await?.outcome)
    }

    pub async fn ask_traced(&self, query: &str) -> Result<QueryTrace, QueryError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(QueryError::EmptyQuery);
        }

        info!(query, "received query");
        let mut states = vec![QueryState::Received];
        let mut advance = |state: QueryState| {
            debug!(query, state = %state, "query state");
            states.push(state);
        };

        advance(QueryState::Retrieving);
        let context = self.retriever.retrieve_default(query).await;

        if context.is_empty() {
            advance(QueryState::NoContext);
        } else {
            advance(QueryState::ContextFound);
            if self.assembler.is_configured() {
                advance(QueryState::Generating);
            }
        }

        let outcome = self.assembler.answer(query, &context).await;
        advance(QueryState::terminal_for(&outcome));

        Ok(QueryTrace {
            outcome,
            context,
            states,
        })
    }
}
