use crate::store::Example;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relevance {
    Yes,
    No,
    Maybe,
}

impl Relevance {
    /// `yes` and `maybe` both continue to SQL generation.
    pub fn proceeds(self) -> bool {
        !matches!(self, Relevance::No)
    }
}

/// Operation kinds the analysis model may tag a question with. Unrecognised tags read as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum QueryType {
    Selection,
    Filter,
    Aggregation,
    Order,
    Subquery,
    Limit,
    Join,
    Other,
}

impl From<String> for QueryType {
    fn from(tag: String) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "selection" => QueryType::Selection,
            "filter" => QueryType::Filter,
            "aggregation" => QueryType::Aggregation,
            "order" => QueryType::Order,
            "subquery" => QueryType::Subquery,
            "limit" => QueryType::Limit,
            "join" => QueryType::Join,
            _ => QueryType::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub relevant: Relevance,
    #[serde(rename = "query")]
    pub rewritten_query: String,
    pub relevant_tables: Vec<String>,
    pub query_types: Vec<QueryType>,
}

/// Everything a single question produced, including partial results when a stage failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub original_question: String,
    pub analysis: Option<QueryAnalysis>,
    pub similar_examples: Vec<Example>,
    pub assembled_prompt_snippet: Option<String>,
    pub generated_sql: Option<String>,
    pub query_result: Option<String>,
    pub nl_response: Option<String>,
    pub error_message: Option<String>,
}

impl PipelineResult {
    pub fn new(question: &str) -> Self {
        Self {
            original_question: question.to_string(),
            ..Default::default()
        }
    }

    /// Adds a diagnostic note without discarding an earlier one.
    pub fn append_note(&mut self, note: &str) {
        match &mut self.error_message {
            Some(existing) => {
                existing.push(' ');
                existing.push_str(note);
            }
            None => self.error_message = Some(note.to_string()),
        }
    }
}
