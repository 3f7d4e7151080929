//! Embedded fallback prompts
//!
//! These are compiled into the binary and used when template files are not found.

/// System prompt shared by every assistant call
pub const ASSISTANT_SYSTEM: &str = r#"You are an assistant supporting members of a university appointment committee (Berufungsausschuss) through a formal hiring procedure.
Answer in plain, friendly language. Be concise and concrete. Never invent procedure steps, deadlines or documents that you were not given.
"#;

/// Explain the open task in simpler terms
pub const TASK_HELP: &str = r#"A committee member asked for help with their current task in the procedure "{{procedure_title}}".

Phase: {{phase_title}}
Step: {{step_title}}
{{#if responsible_role}}Responsible: {{responsible_role}}
{{/if}}Task: {{task_description}}
{{#if required_documents}}Required documents: {{required_documents}}
{{/if}}
Their message:
{{question}}

Explain what this task means and break it down into a short list of practical actions. If documents are required, say what each one is for.
"#;

/// Suggest the paperwork an open task needs
pub const DOCUMENT_SUGGESTION: &str = r#"A committee member is working on the procedure "{{procedure_title}}" and asked which documents they need.

Phase: {{phase_title}}
Step: {{step_title}}
Task: {{task_description}}
{{#if required_documents}}Documents named by the procedure: {{required_documents}}
{{else}}The procedure does not name specific documents for this task.
{{/if}}
Their message:
{{question}}

List the documents they should prepare for this task, with one sentence each on what the document contains. Prefer the documents named by the procedure; only suggest additional ones when they are clearly implied by the task.
"#;

/// First step of the question chain: write SQL
pub const SQL_QUERY: &str = r#"Based on the table schema below, write a SQL query that would answer the user's question.
Schema:
{{schema}}

Question:
{{question}}

Only return the raw SQL query. Do not include explanation or markdown formatting like ```sql.
"#;

/// Second step of the question chain: answer from the query result
pub const SQL_ANSWER: &str = r#"Based on the table schema, question, SQL query, and SQL response, write a natural language response.

Schema:
{{schema}}

Question:
{{question}}

SQL Query:
{{query}}

SQL Response:
{{sql_response}}
"#;

/// Get embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    match name {
        "assistant-system" => Some(ASSISTANT_SYSTEM),
        "task-help" => Some(TASK_HELP),
        "document-suggestion" => Some(DOCUMENT_SUGGESTION),
        "sql-query" => Some(SQL_QUERY),
        "sql-answer" => Some(SQL_ANSWER),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_embedded_known_names() {
        for name in ["assistant-system", "task-help", "document-suggestion", "sql-query", "sql-answer"] {
            assert!(get_embedded(name).is_some(), "Missing embedded prompt: {}", name);
        }
    }

    #[test]
    fn test_get_embedded_unknown() {
        assert!(get_embedded("unknown-template").is_none());
    }

    #[test]
    fn test_sql_query_forbids_markdown() {
        assert!(get_embedded("sql-query").unwrap().contains("Only return the raw SQL query"));
    }
}
