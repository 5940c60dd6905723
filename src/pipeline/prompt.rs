use crate::store::Example;
use std::collections::HashSet;

pub const TEXT_TO_SQL_INSTRUCTION: &str = "You are an expert SQL generator for MYSQL.
Given a database schema and a user question, generate a syntactically correct SQL query that answers the question.
Pay close attention to the exact table and column names provided in the schema.
Use the provided examples, if any, as a guide for query structure and style.
Output ONLY the SQL query. Do not add any explanation or preamble do not add ```sql , just the sql syntax.
";

pub const NO_TABLES_FALLBACK: &str =
    "No specific table schema provided. Please infer from the question.";
pub const TABLES_NOT_FOUND_FALLBACK: &str = "Selected table schemas not found or empty.";

const FEW_SHOT_HEADER: &str = "### Examples (NL to SQL):\n";

/// Keeps only the requested tables from the commented schema text, each with
/// the comment lines directly under it. Unknown names are skipped.
pub fn prune_schema(tables: &[String], schema: &str) -> String {
    if tables.is_empty() {
        return NO_TABLES_FALLBACK.to_string();
    }

    let lines: Vec<&str> = schema.trim().lines().map(str::trim).collect();
    let mut seen = HashSet::new();
    let mut parts = Vec::new();

    for table in tables {
        if !seen.insert(table.as_str()) {
            continue;
        }

        let key = format!("{}(", table);
        let Some(start) = lines.iter().position(|line| line.starts_with(&key)) else {
            continue;
        };

        parts.push(lines[start]);
        for &line in &lines[start + 1..] {
            if line.starts_with('#') {
                parts.push(line);
            } else if !line.is_empty() {
                break;
            }
        }
    }

    if parts.is_empty() {
        TABLES_NOT_FOUND_FALLBACK.to_string()
    } else {
        parts.join("\n")
    }
}

pub fn format_few_shots(examples: &[Example]) -> String {
    if examples.is_empty() {
        return String::new();
    }

    let mut block = String::from(FEW_SHOT_HEADER);
    for example in examples {
        let sql = example.sql.as_deref().unwrap_or("No SQL provided");
        let nl = if example.nl.is_empty() {
            "No NL provided"
        } else {
            example.nl.as_str()
        };
        block.push_str(&format!("-- User Question: {}\nSQL: {}\n\n", nl, sql));
    }
    block.trim().to_string()
}

/// Builds the SQL-generation prompt. Section order is fixed.
pub fn assemble_prompt(
    rewritten_query: &str,
    examples: &[Example],
    relevant_tables: &[String],
    schema: &str,
) -> String {
    let pruned = prune_schema(relevant_tables, schema);
    let few_shots = format_few_shots(examples);

    let mut parts = vec![
        TEXT_TO_SQL_INSTRUCTION.to_string(),
        "\n### Database Schema:".to_string(),
        "Only use the following tables and their columns.".to_string(),
        pruned,
    ];
    if !few_shots.is_empty() {
        parts.push(format!("\n{}", few_shots));
    }
    parts.extend([
        "\n### Task:".to_string(),
        "Convert the following user question to a SQL query.".to_string(),
        format!("User Question: {}", rewritten_query),
        "SQL Query:".to_string(),
    ]);

    parts.join("\n")
}

/// First `limit` characters, with `...` appended when anything was cut.
pub fn preview(prompt: &str, limit: usize) -> String {
    match prompt.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &prompt[..cut]),
        None => prompt.to_string(),
    }
}
