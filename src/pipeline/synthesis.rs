use crate::llm::{LanguageModel, LlmError};
use std::sync::Arc;
use tracing::debug;

pub const ANSWER_FALLBACK: &str = "Could not generate a natural language response.";

/// Turns an assembled prompt into a SQL statement. The output is not validated.
pub struct SqlSynthesizer {
    model: Arc<dyn LanguageModel>,
}

impl SqlSynthesizer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let sql = self
            .model
            .complete(prompt)
            .await?
            .map(|text| text.trim().to_string())
            .unwrap_or_default();
        debug!("Generated SQL: {}", sql);
        Ok(sql)
    }
}

pub struct AnswerSynthesizer {
    model: Arc<dyn LanguageModel>,
}

impl AnswerSynthesizer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub async fn answer(&self, question: &str, sql_result: &str) -> Result<String, LlmError> {
        let answer = self
            .model
            .complete(&answer_prompt(question, sql_result))
            .await?;
        Ok(answer
            .map(|text| text.trim().to_string())
            .unwrap_or_else(|| ANSWER_FALLBACK.to_string()))
    }
}

pub fn answer_prompt(question: &str, sql_result: &str) -> String {
    format!(
        "You are an AI assistant.
Given an original user question and the result of a SQL query executed to answer that question,
provide a concise, natural language response to the user.
Do not mention the SQL query or the database. Just answer the question based on the provided data.

Original User Question:
{question}

SQL Query Result:
{sql_result}

Natural Language Answer:
"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;

    #[tokio::test]
    async fn sql_is_trimmed_and_passed_through_verbatim() {
        let model = ScriptedModel::replying("\n  ```sql\nSELECT 1\n```  \n");
        let sql = SqlSynthesizer::new(model.clone()).generate("prompt").await.unwrap();
        assert_eq!(sql, "```sql\nSELECT 1\n```");
        assert_eq!(model.prompts(), vec!["prompt".to_string()]);
    }

    #[tokio::test]
    async fn missing_sql_output_is_empty() {
        let model = ScriptedModel::new(vec![Ok(None)]);
        assert_eq!(SqlSynthesizer::new(model).generate("p").await.unwrap(), "");
    }

    #[tokio::test]
    async fn answer_prompt_carries_question_and_rows() {
        let model = ScriptedModel::replying(" There are 347 albums. ");
        let answer = AnswerSynthesizer::new(model.clone())
            .answer("How many albums?", "| count |\n| 347 |")
            .await
            .unwrap();
        assert_eq!(answer, "There are 347 albums.");

        let prompt = &model.prompts()[0];
        assert!(prompt.contains("Original User Question:\nHow many albums?\n"));
        assert!(prompt.contains("SQL Query Result:\n| count |\n| 347 |\n"));
        assert!(prompt.ends_with("Natural Language Answer:\n"));
    }

    #[tokio::test]
    async fn missing_answer_uses_the_fallback() {
        let model = ScriptedModel::new(vec![Ok(None)]);
        let answer = AnswerSynthesizer::new(model).answer("q", "r").await.unwrap();
        assert_eq!(answer, ANSWER_FALLBACK);
    }
}
