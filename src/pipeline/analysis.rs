use crate::llm::{LanguageModel, LlmError};
use crate::pipeline::models::QueryAnalysis;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

const RAW_PREFIX_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Failed to parse query analysis from LLM: {source}. Raw output: {raw_prefix}...")]
    Parse {
        source: serde_json::Error,
        raw_prefix: String,
    },

    #[error(transparent)]
    Model(#[from] LlmError),
}

/// Classifies a question against the schema and rewrites it in schema vocabulary.
pub struct RelevanceAnalyzer {
    model: Arc<dyn LanguageModel>,
}

impl RelevanceAnalyzer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub async fn analyze(
        &self,
        question: &str,
        schema: &str,
    ) -> Result<QueryAnalysis, AnalysisError> {
        let prompt = analysis_prompt(schema, question);
        let raw = self.model.complete(&prompt).await?.unwrap_or_default();
        debug!("Analysis model returned {} chars", raw.len());

        let analysis = parse_analysis(&raw)?;
        info!(
            "Question classified as {:?} with tables {:?}",
            analysis.relevant, analysis.relevant_tables
        );
        Ok(analysis)
    }
}

/// The text between the first `{` and the last `}`, or the whole input when there is no such pair.
pub fn extract_json_object(raw: &str) -> &str {
    match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if end > start => &raw[start..=end],
        _ => raw,
    }
}

pub fn parse_analysis(raw: &str) -> Result<QueryAnalysis, AnalysisError> {
    serde_json::from_str(extract_json_object(raw)).map_err(|source| {
        warn!("Could not parse analysis output: {}", source);
        AnalysisError::Parse {
            source,
            raw_prefix: raw.chars().take(RAW_PREFIX_CHARS).collect(),
        }
    })
}

pub fn analysis_prompt(schema: &str, question: &str) -> String {
    format!(
        r#"You are an AI assistant. Your task is to analyze a user question based on a database schema, determine if it's answerable, rewrite it for clarity if applicable, identify the relevant tables, and classify query types.

### Database Schema:
{schema}

### User Question:
{question}

### Instructions:

1. **Relevance** – Can the question be answered using the schema?
   - "yes": Clearly answerable using the schema.
   - "no": Not answerable using the schema.
   - "maybe": Possibly answerable or needs more information.


2. **Rewrite the Question**
If relevant ("yes" or "maybe"), rewrite the question to:
- Be clearer.
- Use appropriate table and column names from the schema.
If not relevant ("no"), return the original question.

3. **Identify Relevant Tables**:
   - If relevance is "yes" or "maybe", list only the table names needed to answer the question.
   - If relevance is "no", return an empty list.

4.  **Identify Query Types**:
    - If relevance is "yes" or "maybe", analyze the rewritten question and list the types of operations likely needed to answer it. Multiple types can apply.
    - Allowed types: `selection`, `filter`, `aggregation`, `order`, `subquery`, `limit`, `join`, `other`.
    - If relevance is "no", provide an empty list for query_types.

### Output Format:
Respond with a single, valid JSON object. Do not include any other text before or after the JSON object.
Example of the JSON object structure:
{{
  "relevant": "yes",
  "query": "Rewritten user question using schema terms.",
  "relevant_tables": ["Table1", "Table2"],
  "query_types": ["filter", "join"]
}}

### Now Process:
Database Schema:
{schema}

User Question:
{question}

Output JSON:
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;
    use crate::pipeline::models::{QueryType, Relevance};

    #[test]
    fn braces_isolate_the_object() {
        let raw = "Sure! Here is the analysis:\n{\"a\": {\"b\": 1}}\nHope that helps.";
        assert_eq!(extract_json_object(raw), "{\"a\": {\"b\": 1}}");
    }

    #[test]
    fn text_without_a_brace_pair_passes_through() {
        assert_eq!(extract_json_object("no json here"), "no json here");
        assert_eq!(extract_json_object("} backwards {"), "} backwards {");
    }

    #[test]
    fn wrapped_output_parses() {
        let raw = r#"```json
{"relevant": "yes", "query": "List all albums by artist X", "relevant_tables": ["Album", "Artist"], "query_types": ["selection", "join"]}
```"#;
        let analysis = parse_analysis(raw).unwrap();
        assert_eq!(analysis.relevant, Relevance::Yes);
        assert_eq!(analysis.rewritten_query, "List all albums by artist X");
        assert_eq!(analysis.query_types, vec![QueryType::Selection, QueryType::Join]);
    }

    #[test]
    fn formatted_analysis_parses_back() {
        let analysis = QueryAnalysis {
            relevant: Relevance::No,
            rewritten_query: "what is the weather".to_string(),
            relevant_tables: vec![],
            query_types: vec![],
        };
        let text = format!("Output:\n{}\n", serde_json::to_string_pretty(&analysis).unwrap());
        assert_eq!(parse_analysis(&text).unwrap(), analysis);
    }

    #[test]
    fn parse_failure_carries_a_bounded_prefix() {
        let raw = "x".repeat(500);
        let err = parse_analysis(&raw).unwrap_err();
        match &err {
            AnalysisError::Parse { raw_prefix, .. } => assert_eq!(raw_prefix.len(), 200),
            other => panic!("unexpected error {:?}", other),
        }
        let message = err.to_string();
        assert!(message.starts_with("Failed to parse query analysis from LLM: "));
        assert!(message.ends_with(&format!("Raw output: {}...", "x".repeat(200))));
    }

    #[test]
    fn missing_fields_are_a_parse_failure() {
        assert!(matches!(
            parse_analysis(r#"{"relevant": "yes"}"#),
            Err(AnalysisError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn prompt_embeds_schema_and_question_twice() {
        let model = ScriptedModel::replying(
            r#"{"relevant": "no", "query": "hi", "relevant_tables": [], "query_types": []}"#,
        );
        let analyzer = RelevanceAnalyzer::new(model.clone());
        analyzer.analyze("hi", "Album(AlbumId, Title)").await.unwrap();

        let prompt = &model.prompts()[0];
        assert_eq!(prompt.matches("Album(AlbumId, Title)").count(), 2);
        assert!(prompt.contains("### User Question:\nhi\n"));
        assert!(prompt.contains("{\n  \"relevant\": \"yes\","));
        assert!(prompt.ends_with("Output JSON:\n"));
    }

    #[tokio::test]
    async fn absent_output_is_a_parse_failure() {
        let analyzer = RelevanceAnalyzer::new(ScriptedModel::new(vec![Ok(None)]));
        assert!(matches!(
            analyzer.analyze("q", "T(a)").await,
            Err(AnalysisError::Parse { .. })
        ));
    }
}
