pub mod analysis;
pub mod models;
pub mod prompt;
pub mod retrieval;
pub mod synthesis;

use crate::config::PipelineConfig;
use crate::db::{Database, DbError, ExecutionOutcome, execute_sql};
use crate::llm::{LlmError, ModelRoles};
use crate::schema::SchemaCatalog;
use crate::store::ExampleStore;
use analysis::{AnalysisError, RelevanceAnalyzer};
use models::PipelineResult;
use retrieval::ExampleRetriever;
use std::sync::Arc;
use synthesis::{AnswerSynthesizer, SqlSynthesizer};
use thiserror::Error;
use tracing::{error, info, warn};

pub const NOT_RELEVANT_MESSAGE: &str = "The question was determined to be not relevant to the database schema or could not be processed for SQL generation.";
pub const EXECUTION_ISSUE_MESSAGE: &str =
    "Could not generate a final answer due to an issue with the SQL query or its execution.";
pub const NO_DATA_MESSAGE: &str = "The query executed but returned no data to form an answer.";
pub const NO_SQL_MESSAGE: &str = "No SQL query was generated, so no data could be fetched.";
pub const DB_UNAVAILABLE_NOTE: &str = "SQL execution skipped: DB not available.";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Database(#[from] DbError),
}

/// Question-to-answer orchestration. Stages run in sequence; each invocation is independent.
pub struct Pipeline {
    schema_plain: String,
    schema_commented: String,
    analyzer: RelevanceAnalyzer,
    retriever: ExampleRetriever,
    sql_synthesizer: SqlSynthesizer,
    answer_synthesizer: AnswerSynthesizer,
    database: Option<Arc<dyn Database>>,
    preview_chars: usize,
}

impl Pipeline {
    pub fn new(
        catalog: &SchemaCatalog,
        models: ModelRoles,
        store: Option<Arc<dyn ExampleStore>>,
        database: Option<Arc<dyn Database>>,
        settings: &PipelineConfig,
    ) -> Self {
        Self {
            schema_plain: catalog.render_plain(),
            schema_commented: catalog.render_commented(),
            analyzer: RelevanceAnalyzer::new(models.analysis),
            retriever: ExampleRetriever::new(store, settings.top_k),
            sql_synthesizer: SqlSynthesizer::new(models.sql),
            answer_synthesizer: AnswerSynthesizer::new(models.answer),
            database,
            preview_chars: settings.prompt_preview_chars,
        }
    }

    pub fn has_database(&self) -> bool {
        self.database.is_some()
    }

    /// Always returns a result. Stage failures are reported through `error_message`
    /// and whatever was filled in before the failure is kept.
    pub async fn process(&self, question: &str) -> PipelineResult {
        let mut result = PipelineResult::new(question);

        match self.run(question, &mut result).await {
            Ok(()) => {}
            Err(PipelineError::Analysis(e @ AnalysisError::Parse { .. })) => {
                result.error_message = Some(e.to_string());
            }
            Err(e) => {
                error!("Pipeline failed for question {:?}: {}", question, e);
                result.error_message = Some(format!("An unexpected error occurred: {}", e));
            }
        }

        result
    }

    async fn run(&self, question: &str, result: &mut PipelineResult) -> Result<(), PipelineError> {
        let analysis = self.analyzer.analyze(question, &self.schema_plain).await?;
        result.analysis = Some(analysis.clone());

        if !analysis.relevant.proceeds() {
            info!("Question is not relevant to the schema; stopping");
            result.nl_response = Some(NOT_RELEVANT_MESSAGE.to_string());
            return Ok(());
        }

        result.similar_examples = self.retriever.retrieve(&analysis.rewritten_query).await;

        let prompt = prompt::assemble_prompt(
            &analysis.rewritten_query,
            &result.similar_examples,
            &analysis.relevant_tables,
            &self.schema_commented,
        );
        result.assembled_prompt_snippet = Some(prompt::preview(&prompt, self.preview_chars));

        let sql = self.sql_synthesizer.generate(&prompt).await?;
        if !sql.is_empty() {
            result.generated_sql = Some(sql.clone());
        }

        match &self.database {
            Some(database) if !sql.is_empty() => {
                let outcome = execute_sql(&sql, Some(database.as_ref())).await?;
                result.query_result = Some(outcome.render());

                result.nl_response = Some(match outcome {
                    ExecutionOutcome::Rows(rows) => {
                        self.answer_synthesizer.answer(question, &rows).await?
                    }
                    ExecutionOutcome::Empty => NO_DATA_MESSAGE.to_string(),
                    ExecutionOutcome::NoQuery | ExecutionOutcome::Failed(_) => {
                        EXECUTION_ISSUE_MESSAGE.to_string()
                    }
                });
            }
            None => {
                warn!("No database configured; SQL was not executed");
                result.append_note(DB_UNAVAILABLE_NOTE);
            }
            Some(_) => {
                result.nl_response = Some(NO_SQL_MESSAGE.to_string());
            }
        }

        Ok(())
    }
}
