//! Prompt intent detection.
//!
//! Keyword scoring that decides whether a prompt should be answered with a
//! generated SQL query, enriched with web search results, or treated as a
//! general knowledge question unrelated to the project data.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

const SQL_INDICATORS: &[&str] = &[
    "select",
    "query",
    "join",
    "where",
    "group by",
    "filter",
    "fetch",
    "retrieve",
    "show me data",
    "search for",
    "find all",
    "database",
    "table",
    "sql",
    "count",
];

const SQL_QUESTION_PATTERNS: &[&str] = &[
    "how many",
    "list all",
    "show me",
    "which",
    "what are",
    "who has",
    "find",
    "search for",
    "where can i find",
];

const SQL_THRESHOLD: f64 = 1.5;

const SEARCH_INDICATORS: &[&str] = &[
    // time
    "latest",
    "recent",
    "current",
    "news",
    "today",
    "yesterday",
    "this week",
    "this month",
    "this year",
    "update",
    "updated",
    // events
    "happened",
    "trending",
    "released",
    "announced",
    "launch",
    "launched",
    "breaking",
    "event",
    "events",
    // markets
    "stock",
    "price",
    "prices",
    "market",
    "covid",
    "pandemic",
    "election",
    "weather",
    "2024",
    "2025",
    "now",
    "currently",
    "at the moment",
    "right now",
    "as of",
    "up to date",
    "up-to-date",
    "real time",
    "real-time",
    "live",
    "immediate",
    "instantly",
    "developments",
    "progress",
    "advancement",
    "innovation",
    "breakthrough",
    // second entry: "update" scores 2
    "update",
    "revision",
    "changes",
    // media
    "report",
    "reports",
    "article",
    "study",
    "research",
    "publication",
    "findings",
    "discovery",
    "announcement",
    "define",
    "explain",
    "who is",
    "what is",
    "how to",
    "why do",
    "compare",
    "difference between",
    "pros and cons",
    "best practice",
    "tutorial",
    "guide",
    "statistics",
    "data on",
];

const SEARCH_QUESTION_PATTERNS: &[&str] = &[
    "what is the latest",
    "how recent",
    "when did",
    "what happened",
    "tell me about",
    "is there any news",
    "what's new",
    "what are some recent",
    "what's happening",
    "what's going on",
    "any updates on",
    "current status of",
    "latest news about",
    "recent developments in",
    "what's the current",
    "how is",
    "what are the current trends",
    "latest information on",
    "recent updates about",
    "current state of",
    "what's the situation with",
    "any recent news about",
    "current events",
    "breaking news",
    "recent reports on",
];

const DATABASE_FOCUS: &[&str] = &["in the database", "in our data", "in the sheet"];

const SEARCH_THRESHOLD: f64 = 1.0;

const GENERAL_KNOWLEDGE_INDICATORS: &[&str] = &[
    "what is",
    "what are",
    "who is",
    "who was",
    "when was",
    "when did",
    "how does",
    "why does",
    "explain",
    "define",
    "tell me about",
];

const DATABASE_TERMS: &[&str] = &[
    "database", "data", "table", "record", "field", "project", "status", "user", "id", "name",
    "date",
];

static SQL_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```sql\s*(.*?)\s*```").unwrap());
static CODE_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```\s*(.*?)\s*```").unwrap());
static SQL_INTRO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(here'?s?( is)?|the)? (a |the )?sql( query)?( would be)?:?").unwrap()
});

fn score(text: &str, terms: &[&str], weight: f64) -> f64 {
    terms.iter().filter(|term| text.contains(*term)).count() as f64 * weight
}

/// Score of a prompt against the SQL keyword lists.
pub fn sql_score(prompt: &str) -> f64 {
    let lower = prompt.to_lowercase();
    score(&lower, SQL_INDICATORS, 1.0) + score(&lower, SQL_QUESTION_PATTERNS, 0.5)
}

/// Whether the prompt reads like a request for data that a SQL query
/// could answer.
pub fn is_sql_query(prompt: &str) -> bool {
    sql_score(prompt) >= SQL_THRESHOLD
}

/// Score of a prompt against the web search keyword lists.
pub fn search_score(prompt: &str) -> f64 {
    let lower = prompt.to_lowercase();
    let mut total =
        score(&lower, SEARCH_INDICATORS, 1.0) + score(&lower, SEARCH_QUESTION_PATTERNS, 0.7);
    if DATABASE_FOCUS.iter().any(|phrase| lower.contains(phrase)) {
        total -= 1.0;
    }
    total
}

/// Whether the prompt asks for fresh information a web search could supply.
pub fn is_search_query(prompt: &str) -> bool {
    search_score(prompt) >= SEARCH_THRESHOLD
}

/// Terms drawn from a data snapshot shaped `{sheet: {worksheet: [records]}}`:
/// top-level keys, worksheet names, and the field names and string values of
/// each worksheet's first record.
pub fn snapshot_terms(data: &Value) -> HashSet<String> {
    let mut terms = HashSet::new();
    let Some(sheets) = data.as_object() else {
        return terms;
    };

    for (key, value) in sheets {
        terms.insert(key.to_lowercase());
        let Some(worksheets) = value.as_object() else {
            continue;
        };
        for (worksheet, records) in worksheets {
            terms.insert(worksheet.to_lowercase());
            let first = records
                .as_array()
                .and_then(|rows| rows.first())
                .and_then(Value::as_object);
            if let Some(record) = first {
                for (field, cell) in record {
                    terms.insert(field.to_lowercase());
                    if let Some(text) = cell.as_str() {
                        terms.insert(text.to_lowercase());
                    }
                }
            }
        }
    }

    terms
}

/// Whether the prompt looks like a general knowledge question unrelated to
/// the project data.
///
/// Any data term longer than two characters appearing in the prompt marks it
/// as data related.
pub fn is_general_knowledge(prompt: &str, data: Option<&Value>) -> bool {
    let lower = prompt.to_lowercase();

    let extra = data.map(snapshot_terms).unwrap_or_default();
    let mentions_data = DATABASE_TERMS
        .iter()
        .copied()
        .chain(extra.iter().map(String::as_str))
        .any(|term| term.chars().count() > 2 && lower.contains(term));
    if mentions_data {
        return false;
    }

    GENERAL_KNOWLEDGE_INDICATORS
        .iter()
        .any(|indicator| lower.starts_with(indicator))
}

/// Pull a SQL statement out of a model reply.
///
/// Prefers a fenced `sql` block, then any fenced block, and otherwise strips
/// a leading "Here is the SQL query:" style phrase from the raw text.
pub fn extract_sql(response: &str) -> String {
    if let Some(caps) = SQL_BLOCK.captures(response) {
        return caps[1].trim().to_string();
    }
    if let Some(caps) = CODE_BLOCK.captures(response) {
        return caps[1].trim().to_string();
    }
    SQL_INTRO
        .replace(response.trim(), "")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sql_intent() {
        assert!(is_sql_query("How many projects are in the database?"));
        assert!(is_sql_query("select all rows from the projects table"));
        assert!(!is_sql_query("Hello there"));
        // "show me" (0.5) + "which" (0.5) stays below the threshold
        assert!(!is_sql_query("show me which one you like"));
    }

    #[test]
    fn test_search_intent() {
        assert!(is_search_query("What is the latest news about Rust?"));
        assert!(is_search_query("current weather in Paris"));
        assert!(!is_search_query("Hello"));
    }

    #[test]
    fn test_database_focus_lowers_search_score() {
        let plain = search_score("latest budget");
        let focused = search_score("latest budget in the database");
        assert_eq!(plain - focused, 1.0);
        assert!(!is_search_query("latest budget in the database"));
    }

    #[test]
    fn test_general_knowledge_without_data() {
        assert!(is_general_knowledge("What is photosynthesis?", None));
        assert!(is_general_knowledge("Explain quantum entanglement", None));
        assert!(!is_general_knowledge("Photosynthesis, what is it?", None));
    }

    #[test]
    fn test_database_terms_block_general_knowledge() {
        assert!(!is_general_knowledge("What is the project budget?", None));
        assert!(!is_general_knowledge("What is the status?", None));
    }

    #[test]
    fn test_snapshot_terms_block_general_knowledge() {
        let data = json!({
            "default": {
                "Projects": [
                    {"name": "Apollo", "budget": 1000, "owner_team": "Falcon"}
                ],
                "Members": []
            }
        });
        assert!(!is_general_knowledge("Who is Apollo?", Some(&data)));
        assert!(!is_general_knowledge("Tell me about falcon", Some(&data)));
        assert!(is_general_knowledge("Who is Ada Lovelace?", Some(&data)));

        let terms = snapshot_terms(&data);
        assert!(terms.contains("projects"));
        assert!(terms.contains("owner_team"));
        assert!(!terms.contains("1000"));
    }

    #[test]
    fn test_extract_sql_from_fenced_block() {
        let reply = "Sure!\n```sql\nSELECT * FROM projects;\n```\nDone.";
        assert_eq!(extract_sql(reply), "SELECT * FROM projects;");

        let generic = "```\nSELECT name FROM members\n```";
        assert_eq!(extract_sql(generic), "SELECT name FROM members");
    }

    #[test]
    fn test_extract_sql_strips_intro() {
        assert_eq!(
            extract_sql("Here is the SQL query: SELECT 1"),
            "SELECT 1"
        );
        assert_eq!(extract_sql("  SELECT count(*) FROM projects  "), "SELECT count(*) FROM projects");
    }
}
