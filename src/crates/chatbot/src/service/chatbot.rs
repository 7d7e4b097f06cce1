//! The chat pipeline.
//!
//! A turn runs through four stages: intent detection, the data snapshot
//! (Sheets data or the SQL schema), optional web search enrichment, and
//! finally either a generated SQL query answered from the SQL source or a
//! routed chat completion.

use crate::cache::TtlCache;
use crate::config::DataSourceKind;
use crate::datasource::{GoogleSheetsClient, SqlDatabaseClient};
use crate::executor::{ModelRouter, ResponseSource, RoutedResponse};
use crate::intent::{extract_sql, is_search_query, is_sql_query};
use crate::prompt::{
    chat_request, markdown_table, sql_answer, sql_explanation_request, sql_generation_request,
    PromptInput,
};
use crate::search::{GoogleSearchClient, SearchMetrics};
use crate::{ChatbotError, Result};
use llm::{Message, ProviderKind};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Results folded into the prompt when search intent is detected.
const SEARCH_CONTEXT_RESULTS: usize = 3;

const SEARCH_INSTRUCTIONS: &str = "\n\nPlease use this information to help answer the user's question accurately. \
When citing sources, include the full source information including title and URL in parentheses. \
If the search results are not relevant, rely on your existing knowledge instead.";

const SQL_SNAPSHOT_KEY: &str = "sql_database_info";

/// One chat turn as submitted by a caller.
#[derive(Debug, Clone)]
pub struct ChatQuery {
    pub prompt: String,
    pub context: Option<String>,
    /// Prior turns, oldest first.
    pub history: Vec<Message>,
    pub use_cache: bool,
    pub sheet_name: Option<String>,
    pub preferred_model: ProviderKind,
}

impl ChatQuery {
    pub fn new(prompt: impl Into<String>, preferred_model: ProviderKind) -> Self {
        Self {
            prompt: prompt.into(),
            context: None,
            history: Vec::new(),
            use_cache: true,
            sheet_name: None,
            preferred_model,
        }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_sheet(mut self, sheet_name: Option<String>) -> Self {
        self.sheet_name = sheet_name;
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }
}

/// The answer to a chat turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub source: ResponseSource,
    pub sheet_name: Option<String>,
    pub error: Option<String>,
}

impl ChatReply {
    fn routed(routed: RoutedResponse, sheet_name: Option<String>) -> Self {
        Self {
            response: routed.content,
            source: routed.source,
            sheet_name,
            error: routed.error,
        }
    }

    fn failed(response: String, error: String, sheet_name: Option<String>) -> Self {
        Self {
            response,
            source: ResponseSource::Error,
            sheet_name,
            error: Some(error),
        }
    }
}

/// Answers chat turns from project data, web search and the chat models.
pub struct ChatbotService {
    router: ModelRouter,
    sheets: GoogleSheetsClient,
    sql: Option<SqlDatabaseClient>,
    search: Option<GoogleSearchClient>,
    source: DataSourceKind,
    snapshots: TtlCache<String, Value>,
}

impl ChatbotService {
    /// A service answering from Google Sheets.
    pub fn new(router: ModelRouter, sheets: GoogleSheetsClient, snapshot_ttl: Duration) -> Self {
        Self {
            router,
            sheets,
            sql: None,
            search: None,
            source: DataSourceKind::Sheets,
            snapshots: TtlCache::new(snapshot_ttl),
        }
    }

    /// Answer from a SQL database instead of Sheets.
    pub fn with_sql(mut self, sql: SqlDatabaseClient) -> Self {
        self.sql = Some(sql);
        self.source = DataSourceKind::Sql;
        self
    }

    pub fn with_search(mut self, search: GoogleSearchClient) -> Self {
        self.search = Some(search);
        self
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    pub fn sheets(&self) -> &GoogleSheetsClient {
        &self.sheets
    }

    pub fn search(&self) -> Option<&GoogleSearchClient> {
        self.search.as_ref()
    }

    pub fn data_source(&self) -> DataSourceKind {
        self.source
    }

    /// Run one chat turn. Failures are reported in the reply, never as `Err`.
    pub async fn get_response(&self, query: ChatQuery) -> ChatReply {
        let wants_sql = is_sql_query(&query.prompt);
        let wants_search = is_search_query(&query.prompt);
        debug!(
            sql_intent = wants_sql,
            search_intent = wants_search,
            provider = %query.preferred_model,
            "Classified prompt"
        );

        let data = match self.snapshot(query.use_cache).await {
            Ok(data) => data,
            Err(e) => {
                error!(error = %e, "Failed to load data snapshot");
                return ChatReply::failed(
                    format!(
                        "I'm having trouble accessing the database. Please try again later. Error: {}",
                        e
                    ),
                    e.to_string(),
                    query.sheet_name,
                );
            }
        };

        let search_context = if wants_search {
            self.search_context(&query).await
        } else {
            None
        };

        if wants_sql && self.source == DataSourceKind::Sql {
            if let Some(reply) = self.answer_with_sql(&query, data.as_ref()).await {
                return reply;
            }
        }

        let context = compose_context(
            query.context.as_deref(),
            query.sheet_name.as_deref(),
            search_context.as_deref(),
        );
        let input = PromptInput {
            prompt: &query.prompt,
            context: context.as_deref(),
            data: data.as_ref(),
            history: &query.history,
        };
        let routed = self
            .router
            .route(query.preferred_model, search_context.is_some(), |provider| {
                chat_request(provider, &input)
            })
            .await;
        info!(
            source = %routed.source,
            attempts = routed.attempts,
            "Chat turn answered"
        );
        ChatReply::routed(routed, query.sheet_name)
    }

    /// The data the models should reference. `None` when Sheets is not set up.
    async fn snapshot(&self, use_cache: bool) -> Result<Option<Value>> {
        match self.source {
            DataSourceKind::Sheets => {
                if !self.sheets.is_configured() {
                    debug!("Sheets not configured, answering without project data");
                    return Ok(None);
                }
                Ok(Some(self.sheets.get_all_data(use_cache).await?))
            }
            DataSourceKind::Sql => {
                let sql = self
                    .sql
                    .as_ref()
                    .ok_or_else(|| ChatbotError::Config("SQL data source is not connected".into()))?;
                let key = SQL_SNAPSHOT_KEY.to_string();
                if use_cache {
                    if let Some(info) = self.snapshots.get(&key) {
                        return Ok(Some(info));
                    }
                }
                let info = serde_json::to_value(sql.get_database_info().await?)?;
                self.snapshots.insert(key, info.clone());
                Ok(Some(info))
            }
        }
    }

    async fn search_context(&self, query: &ChatQuery) -> Option<String> {
        let search = self.search.as_ref().filter(|s| s.is_configured())?;
        match search
            .search_context(&query.prompt, SEARCH_CONTEXT_RESULTS, query.use_cache)
            .await
        {
            Ok(context) => Some(format!("{}{}", context, SEARCH_INSTRUCTIONS)),
            Err(e) => {
                warn!(error = %e, "Web search failed, continuing without it");
                None
            }
        }
    }

    /// Generate, run and explain a query. `None` hands the turn to the chat models.
    async fn answer_with_sql(&self, query: &ChatQuery, schema: Option<&Value>) -> Option<ChatReply> {
        let sql = self.sql.as_ref()?;
        let schema = schema.cloned().unwrap_or(Value::Null);

        let generated = self
            .router
            .route(query.preferred_model, false, |_| {
                sql_generation_request(&query.prompt, &schema)
            })
            .await;
        let statement = extract_sql(generated.model_text()?);
        if statement.is_empty() {
            return None;
        }

        let results = match sql.execute_query(&statement, true).await {
            Ok(results) if !results.is_empty() => results,
            Ok(_) => {
                debug!(sql = %statement, "Generated query returned no rows");
                return None;
            }
            Err(e) => {
                warn!(sql = %statement, error = %e, "Generated query failed");
                return None;
            }
        };

        let table = markdown_table(&results.columns, &results.rows);
        let explained = self
            .router
            .route(query.preferred_model, false, |_| {
                sql_explanation_request(&statement, &table)
            })
            .await;
        let explanation = explained.model_text()?;

        info!(rows = results.rows.len(), "Answered from SQL query");
        Some(ChatReply {
            response: sql_answer(explanation, &statement, &table),
            source: ResponseSource::SqlQuery,
            sheet_name: query.sheet_name.clone(),
            error: None,
        })
    }

    /// Drop cached sheet data, the SQL snapshot and the SQL table list.
    pub fn clear_cache(&self) {
        self.sheets.clear_cache();
        self.snapshots.clear();
        if let Some(sql) = &self.sql {
            sql.reset_table_cache();
        }
        info!("Cleared data caches");
    }

    /// Search metrics for `date` (`YYYYMMDD`), `None` when search is disabled.
    pub fn search_metrics(&self, date: Option<&str>) -> Option<SearchMetrics> {
        self.search.as_ref().map(|search| search.metrics(date))
    }

    /// Returns false when search is disabled.
    pub fn clear_search_cache(&self, query: Option<&str>) -> bool {
        match &self.search {
            Some(search) => {
                search.clear_cache(query, None, None);
                true
            }
            None => false,
        }
    }
}

fn compose_context(
    caller: Option<&str>,
    sheet_name: Option<&str>,
    search: Option<&str>,
) -> Option<String> {
    let focus = sheet_name
        .filter(|s| !s.trim().is_empty())
        .map(|sheet| format!("Focus on data from the '{}' sheet for this query.", sheet));
    let parts: Vec<&str> = [caller, focus.as_deref(), search]
        .into_iter()
        .flatten()
        .filter(|part| !part.trim().is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join("\n\n"))
}
