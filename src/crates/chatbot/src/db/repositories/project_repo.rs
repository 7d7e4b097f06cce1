//! Local project mirror repository.

use crate::datasource::sheets::{number_field, text_field, Record};
use crate::db::connection::DatabasePool;
use crate::db::error::DbResult;
use crate::db::models::{Project, ProjectMember, ProjectWithMembers};

fn optional_text(record: &Record, field: &str) -> Option<String> {
    Some(text_field(record, field)).filter(|s| !s.trim().is_empty())
}

pub struct ProjectRepository;

impl ProjectRepository {
    /// Insert or update projects by name and replace their members.
    /// Members are matched to projects by `project_name`, case-insensitively.
    /// Returns the number of projects written.
    pub async fn upsert_from_records(
        pool: &DatabasePool,
        projects: &[Record],
        members: &[Record],
    ) -> DbResult<usize> {
        let mut tx = pool.begin().await?;
        let mut written = 0;

        for record in projects {
            let name = text_field(record, "name");
            if name.trim().is_empty() {
                continue;
            }
            let status = optional_text(record, "status").unwrap_or_else(|| "active".to_string());

            let project_id: i64 = sqlx::query_scalar(
                "INSERT INTO projects (name, description, start_date, end_date, budget, expenses, status)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (name) DO UPDATE SET
                     description = excluded.description,
                     start_date = excluded.start_date,
                     end_date = excluded.end_date,
                     budget = excluded.budget,
                     expenses = excluded.expenses,
                     status = excluded.status
                 RETURNING id",
            )
            .bind(&name)
            .bind(optional_text(record, "description"))
            .bind(optional_text(record, "start_date"))
            .bind(optional_text(record, "end_date"))
            .bind(number_field(record, "budget"))
            .bind(number_field(record, "expenses"))
            .bind(status)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM project_members WHERE project_id = ?")
                .bind(project_id)
                .execute(&mut *tx)
                .await?;

            let wanted = name.to_lowercase();
            for member in members
                .iter()
                .filter(|m| text_field(m, "project_name").to_lowercase() == wanted)
            {
                sqlx::query(
                    "INSERT INTO project_members (project_id, name, role, email) VALUES (?, ?, ?, ?)",
                )
                .bind(project_id)
                .bind(text_field(member, "name"))
                .bind(text_field(member, "role"))
                .bind(optional_text(member, "email"))
                .execute(&mut *tx)
                .await?;
            }
            written += 1;
        }

        tx.commit().await?;
        Ok(written)
    }

    pub async fn list_with_members(pool: &DatabasePool) -> DbResult<Vec<ProjectWithMembers>> {
        let projects = sqlx::query_as::<_, Project>("SELECT * FROM projects ORDER BY name")
            .fetch_all(pool)
            .await?;
        let members = sqlx::query_as::<_, ProjectMember>(
            "SELECT * FROM project_members ORDER BY project_id, id",
        )
        .fetch_all(pool)
        .await?;

        Ok(projects
            .into_iter()
            .map(|project| {
                let own = members
                    .iter()
                    .filter(|m| m.project_id == project.id)
                    .cloned()
                    .collect();
                ProjectWithMembers::new(project, own)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::database;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_upsert_replaces_members() {
        let db = database().await;
        let projects = vec![
            record(json!({"name": "Apollo", "budget": 100, "expenses": 150, "status": "Active", "end_date": ""})),
            record(json!({"name": "", "budget": 1})),
        ];
        let members = vec![
            record(json!({"project_name": "apollo", "name": "Ada", "role": "Engineer", "email": "ada@example.com"})),
            record(json!({"project_name": "Other", "name": "Bob", "role": "QA"})),
        ];

        assert_eq!(
            ProjectRepository::upsert_from_records(db.pool(), &projects, &members).await.unwrap(),
            1
        );
        assert_eq!(
            ProjectRepository::upsert_from_records(db.pool(), &projects, &members).await.unwrap(),
            1
        );

        let listed = ProjectRepository::list_with_members(db.pool()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].project.end_date, None);
        assert_eq!(listed[0].budget_status, "over_budget");
        assert_eq!(listed[0].remaining_budget, -50.0);
        assert_eq!(listed[0].members.len(), 1);
        assert_eq!(listed[0].members[0].name, "Ada");
    }
}
