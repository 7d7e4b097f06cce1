//! Per-user chat analytics over a trailing window.

use crate::db::models::chat_session::display_title;
use crate::db::models::timestamp;
use crate::db::repositories::{ChatMessageRepository, ChatSessionRepository, DailyCount, ModelCount};
use crate::db::{DatabasePool, DbResult};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

pub const DASHBOARD_WINDOW_DAYS: i64 = 30;
const MOST_ACTIVE_SESSIONS: i64 = 5;

const GEMINI_COLOR: &str = "#4285F4";
const OPENAI_COLOR: &str = "#10A37F";
const OTHER_COLOR: &str = "#6c757d";

/// Chart color for a source label.
pub fn model_color(model: &str) -> &'static str {
    if model.starts_with("gemini") {
        GEMINI_COLOR
    } else if model.starts_with("openai") {
        OPENAI_COLOR
    } else {
        OTHER_COLOR
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelUsageEntry {
    pub model: String,
    pub count: i64,
    pub percentage: f64,
    pub color: &'static str,
}

/// Assistant replies by source, with provider family shares.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelUsage {
    pub models: Vec<ModelUsageEntry>,
    pub total: i64,
    pub gemini_percentage: f64,
    pub openai_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveSession {
    pub id: i64,
    pub title: String,
    pub created_at: String,
    pub message_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsDashboard {
    pub period_days: i64,
    pub total_messages: i64,
    pub total_sessions: i64,
    pub model_usage: ModelUsage,
    pub daily_activity: Vec<DailyCount>,
    pub most_active_sessions: Vec<ActiveSession>,
    pub has_data: bool,
}

fn percent(part: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 1000.0).round() / 10.0
}

/// Fold grouped counts into usage entries. Unlabelled replies count as `unknown`.
pub fn summarize_model_usage(counts: &[ModelCount]) -> ModelUsage {
    let total: i64 = counts.iter().map(|c| c.count).sum();
    let family = |prefix: &str| -> i64 {
        counts
            .iter()
            .filter(|c| c.model.as_deref().is_some_and(|m| m.starts_with(prefix)))
            .map(|c| c.count)
            .sum()
    };

    let models = counts
        .iter()
        .map(|c| {
            let model = c.model.clone().unwrap_or_else(|| "unknown".to_string());
            ModelUsageEntry {
                color: model_color(&model),
                percentage: percent(c.count, total),
                count: c.count,
                model,
            }
        })
        .collect();

    ModelUsage {
        models,
        total,
        gemini_percentage: percent(family("gemini"), total),
        openai_percentage: percent(family("openai"), total),
    }
}

fn window_start(now: DateTime<Utc>) -> String {
    timestamp(now - Duration::days(DASHBOARD_WINDOW_DAYS))
}

/// Model usage for the trailing window ending at `now`.
pub async fn model_usage(pool: &DatabasePool, user_id: i64, now: DateTime<Utc>) -> DbResult<ModelUsage> {
    let counts = ChatMessageRepository::model_usage(pool, user_id, &window_start(now)).await?;
    Ok(summarize_model_usage(&counts))
}

/// The analytics dashboard for the trailing window ending at `now`.
pub async fn dashboard(pool: &DatabasePool, user_id: i64, now: DateTime<Utc>) -> DbResult<AnalyticsDashboard> {
    let since = window_start(now);

    let total_messages = ChatMessageRepository::count_since(pool, user_id, &since).await?;
    let total_sessions = ChatSessionRepository::count_created_since(pool, user_id, &since).await?;
    let counts = ChatMessageRepository::model_usage(pool, user_id, &since).await?;
    let daily_activity = ChatMessageRepository::daily_activity(pool, user_id, &since).await?;

    let mut most_active_sessions = Vec::new();
    for session in
        ChatSessionRepository::most_active(pool, user_id, &since, MOST_ACTIVE_SESSIONS).await?
    {
        let first = ChatMessageRepository::first_user_message(pool, session.id).await?;
        most_active_sessions.push(ActiveSession {
            title: display_title(session.id, session.title.as_deref(), first.as_deref()),
            id: session.id,
            created_at: session.created_at,
            message_count: session.message_count,
        });
    }

    Ok(AnalyticsDashboard {
        period_days: DASHBOARD_WINDOW_DAYS,
        total_messages,
        total_sessions,
        model_usage: summarize_model_usage(&counts),
        daily_activity,
        most_active_sessions,
        has_data: total_messages > 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{database, user};
    use llm::MessageRole;

    fn count(model: Option<&str>, count: i64) -> ModelCount {
        ModelCount {
            model: model.map(String::from),
            count,
        }
    }

    #[test]
    fn test_summarize_model_usage() {
        let usage = summarize_model_usage(&[
            count(Some("gemini"), 5),
            count(Some("openai-fallback"), 2),
            count(Some("gemini-with-search"), 1),
            count(None, 2),
        ]);
        assert_eq!(usage.total, 10);
        assert_eq!(usage.gemini_percentage, 60.0);
        assert_eq!(usage.openai_percentage, 20.0);
        assert_eq!(usage.models[1].color, OPENAI_COLOR);
        assert_eq!(usage.models[3].model, "unknown");
        assert_eq!(usage.models[3].color, OTHER_COLOR);
    }

    #[test]
    fn test_empty_usage() {
        let usage = summarize_model_usage(&[]);
        assert_eq!(usage.total, 0);
        assert_eq!(usage.gemini_percentage, 0.0);
        assert!(usage.models.is_empty());
    }

    #[tokio::test]
    async fn test_dashboard() {
        let db = database().await;
        let ada = user(&db, "ada").await;
        let pool = db.pool();

        let empty = dashboard(pool, ada.id, Utc::now()).await.unwrap();
        assert!(!empty.has_data);
        assert_eq!(empty.total_sessions, 0);

        let session = ChatSessionRepository::create(pool, ada.id).await.unwrap();
        ChatMessageRepository::create(pool, session.id, MessageRole::User, "Which projects are over budget right now?", None)
            .await
            .unwrap();
        ChatMessageRepository::create(pool, session.id, MessageRole::Assistant, "Apollo.", Some("gemini"))
            .await
            .unwrap();

        let report = dashboard(pool, ada.id, Utc::now()).await.unwrap();
        assert!(report.has_data);
        assert_eq!(report.total_messages, 2);
        assert_eq!(report.total_sessions, 1);
        assert_eq!(report.model_usage.gemini_percentage, 100.0);
        assert_eq!(report.daily_activity.len(), 1);
        assert_eq!(report.daily_activity[0].count, 2);
        assert_eq!(report.most_active_sessions[0].title, "Which projects are over budget...");
        assert_eq!(report.most_active_sessions[0].message_count, 2);

        let later = dashboard(pool, ada.id, Utc::now() + Duration::days(31)).await.unwrap();
        assert_eq!(later.total_messages, 0);
        assert!(!later.has_data);
        assert!(later.most_active_sessions.is_empty());
    }
}
