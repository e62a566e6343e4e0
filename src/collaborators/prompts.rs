//! Prompt templates for the LLM-backed collaborators.

/// System message for query generation. The reply format is fixed so the
/// answer can be parsed without guessing at its shape.
pub const QUERY_SYSTEM_PROMPT: &str = "You are an SQL agent. You reply with a single JSON object of the form \
{\"query\": \"<SQL>\"} and nothing else.";

/// Build the query-generation prompt.
pub fn query_prompt(question: &str, schema: &str, dialect: &str, top_k: usize) -> String {
    format!(
        "Generate the most optimized, syntactically correct {dialect} query that answers the \
user's question.

Only use the tables and columns listed in this schema:

{schema}

Question:
{question}

Rules:
- Retrieve only the columns relevant to the question; never SELECT *.
- Unless the question asks for a specific number of rows, limit the result to at most {top_k} rows.
- Do not include unnecessary joins, columns or clauses.
- The query must be ready to execute as-is.

Reply with JSON: {{\"query\": \"...\"}}"
    )
}

/// Build the answer-synthesis prompt.
pub fn answer_prompt(question: &str, sql: &str, result: &str) -> String {
    format!(
        "Given the following user question, the SQL query that was run for it, and the query \
result, answer the user question in natural language.

Question: {question}
SQL Query: {sql}
SQL Result: {result}
"
    )
}
