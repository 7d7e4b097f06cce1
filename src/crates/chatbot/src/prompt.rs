//! Provider-specific prompt construction.

use crate::intent::is_general_knowledge;
use llm::{ChatRequest, Message, ProviderKind};
use serde_json::Value;

const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: usize = 500;
const GEMINI_TOP_P: f32 = 0.95;
const GEMINI_TOP_K: u32 = 40;

const OPENAI_INSTRUCTIONS: &str = "You are a helpful assistant that provides information based on the connected database. \
You can answer questions about the data stored in the database and provide general information. \
Be precise, specific, and concise in your answers. Focus on facts from the database when available.";

const GEMINI_INSTRUCTIONS: &str = "You are a helpful assistant that can answer both database-related questions and general knowledge questions. \
When responding to questions about the database, refer to the database information provided and be precise and specific. \
For general knowledge questions not covered by the database, you should provide helpful and accurate information based on your training. \
DO NOT refuse to answer general knowledge questions that aren't related to the database. \
Always be concise, professional, and helpful.";

const GEMINI_GENERAL_KNOWLEDGE_NOTE: &str = "\n\nIMPORTANT: If the user asks a question that's not related to this database data, \
you should still answer it using your general knowledge. Don't refuse to answer just because the information isn't in the database.";

const GENERAL_KNOWLEDGE_HINT: &str = "The following question appears to be a general knowledge question not related to the database. \
Please answer it using your training:\n\n";

const SQL_GENERATOR_ROLE: &str = "You are a SQL query generator. Generate only SQL queries.";
const SQL_EXPLAINER_ROLE: &str = "You are explaining SQL query results.";

/// Maximum rows rendered into a markdown result table.
pub const MAX_TABLE_ROWS: usize = 20;

/// Everything a chat turn contributes to the provider prompt.
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    pub prompt: &'a str,
    /// Caller context plus any web search context.
    pub context: Option<&'a str>,
    /// Data snapshot the model should reference.
    pub data: Option<&'a Value>,
    pub history: &'a [Message],
}

/// Build the chat request for `provider`.
pub fn chat_request(provider: ProviderKind, input: &PromptInput<'_>) -> ChatRequest {
    match provider {
        ProviderKind::OpenAi => openai_request(input),
        ProviderKind::Gemini => gemini_request(input),
    }
}

fn render_data(data: &Value) -> String {
    serde_json::to_string(data).unwrap_or_else(|_| data.to_string())
}

fn has_data(data: Option<&Value>) -> Option<&Value> {
    data.filter(|value| match value {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    })
}

fn with_context(mut system: String, context: Option<&str>) -> String {
    if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
        system.push_str("\n\n");
        system.push_str(context);
    }
    system
}

/// System prompt sent to OpenAI.
pub fn openai_system_prompt(context: Option<&str>, data: Option<&Value>) -> String {
    let mut system = with_context(OPENAI_INSTRUCTIONS.to_string(), context);
    if let Some(data) = has_data(data) {
        system.push_str(
            "\nHere is the current database data to reference when answering questions:\n",
        );
        system.push_str(&render_data(data));
    }
    system
}

/// System prompt sent to Gemini.
pub fn gemini_system_prompt(context: Option<&str>, data: Option<&Value>) -> String {
    let mut system = with_context(GEMINI_INSTRUCTIONS.to_string(), context);
    if let Some(data) = has_data(data) {
        system.push_str(
            "\nHere is the current database data to reference when answering database-related questions:\n",
        );
        system.push_str(&render_data(data));
        system.push_str(GEMINI_GENERAL_KNOWLEDGE_NOTE);
    }
    system
}

fn conversation(system: String, history: &[Message], user_turn: String) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(system));
    messages.extend(history.iter().cloned());
    messages.push(Message::user(user_turn));
    messages
}

fn openai_request(input: &PromptInput<'_>) -> ChatRequest {
    let system = openai_system_prompt(input.context, input.data);
    ChatRequest::new(conversation(system, input.history, input.prompt.to_string()))
        .with_temperature(TEMPERATURE)
        .with_max_tokens(MAX_TOKENS)
}

fn gemini_request(input: &PromptInput<'_>) -> ChatRequest {
    let system = gemini_system_prompt(input.context, input.data);
    let user_turn = if is_general_knowledge(input.prompt, input.data) {
        format!("{}{}", GENERAL_KNOWLEDGE_HINT, input.prompt)
    } else {
        input.prompt.to_string()
    };
    ChatRequest::new(conversation(system, input.history, user_turn))
        .with_temperature(TEMPERATURE)
        .with_max_tokens(MAX_TOKENS)
        .with_top_p(GEMINI_TOP_P)
        .with_top_k(GEMINI_TOP_K)
}

/// Ask a model to turn a natural-language request into SQL.
pub fn sql_generation_request(prompt: &str, schema: &Value) -> ChatRequest {
    let schema = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
    let request = format!(
        "Based on the following request, generate a SQL query that is safe to execute:\n\
         \"{prompt}\"\n\n\
         Database schema: {schema}\n\n\
         Return ONLY the SQL query without any explanation or formatting, just the raw SQL statement."
    );
    ChatRequest::new(vec![
        Message::system(SQL_GENERATOR_ROLE),
        Message::user(request),
    ])
    .with_temperature(TEMPERATURE)
    .with_max_tokens(MAX_TOKENS)
}

/// Ask a model to explain a query and its results in plain language.
pub fn sql_explanation_request(query: &str, results_markdown: &str) -> ChatRequest {
    let request = format!(
        "Explain the following SQL query and its results in plain language:\n\n\
         Query: {query}\n\n\
         Results:\n{results_markdown}\n\n\
         Provide a concise summary that a non-technical person would understand."
    );
    ChatRequest::new(vec![
        Message::system(SQL_EXPLAINER_ROLE),
        Message::user(request),
    ])
    .with_temperature(TEMPERATURE)
    .with_max_tokens(MAX_TOKENS)
}

/// Final reply for a query answered from the SQL data source.
pub fn sql_answer(explanation: &str, query: &str, results_markdown: &str) -> String {
    format!(
        "{}\n\n**SQL Query Used:**\n```sql\n{}\n```\n\n**Query Results:**\n{}",
        explanation.trim(),
        query,
        results_markdown
    )
}

fn cell_text(value: &Value) -> String {
    let text = match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    text.replace('|', "\\|").replace('\n', " ")
}

/// Render query rows as a markdown table, truncated to [`MAX_TABLE_ROWS`].
pub fn markdown_table(columns: &[String], rows: &[Vec<Value>]) -> String {
    if rows.is_empty() {
        return "*No results*".to_string();
    }

    let mut table = String::new();
    table.push_str(&format!("| {} |\n", columns.join(" | ")));
    table.push_str(&format!(
        "|{}|\n",
        columns.iter().map(|_| "---").collect::<Vec<_>>().join("|")
    ));
    for row in rows.iter().take(MAX_TABLE_ROWS) {
        let cells: Vec<String> = row.iter().map(cell_text).collect();
        table.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    let mut table = table.trim_end().to_string();

    if rows.len() > MAX_TABLE_ROWS {
        table.push_str(&format!(
            "\n\n*Showing {} of {} results*",
            MAX_TABLE_ROWS,
            rows.len()
        ));
    }
    table
}
