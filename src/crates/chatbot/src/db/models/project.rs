//! Local mirror of sheet project data.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub budget: f64,
    pub expenses: f64,
    pub status: String,
}

impl Project {
    pub fn budget_status(&self) -> &'static str {
        if self.expenses > self.budget {
            "over_budget"
        } else {
            "under_budget"
        }
    }

    pub fn remaining_budget(&self) -> f64 {
        self.budget - self.expenses
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ProjectMember {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub role: String,
    pub email: Option<String>,
}

/// A project with its members and derived budget fields, as served by the
/// API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectWithMembers {
    #[serde(flatten)]
    pub project: Project,
    pub budget_status: String,
    pub remaining_budget: f64,
    pub members: Vec<ProjectMember>,
}

impl ProjectWithMembers {
    pub fn new(project: Project, members: Vec<ProjectMember>) -> Self {
        Self {
            budget_status: project.budget_status().to_string(),
            remaining_budget: project.remaining_budget(),
            project,
            members,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_budget_fields() {
        let project = Project {
            id: 1,
            name: "Apollo".into(),
            description: None,
            start_date: None,
            end_date: None,
            budget: 100.0,
            expenses: 130.0,
            status: "active".into(),
        };
        let view = ProjectWithMembers::new(project, Vec::new());
        assert_eq!(view.budget_status, "over_budget");
        assert_eq!(view.remaining_budget, -30.0);
    }
}
