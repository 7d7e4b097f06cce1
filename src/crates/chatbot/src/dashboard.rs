//! Project dashboards built from sheet records.

use crate::datasource::sheets::{count_by_status, number_field, text_field, Record};
use crate::datasource::GoogleSheetsClient;
use crate::{ChatbotError, Result};
use chrono::{Datelike, Duration, Local, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y"];
const DEFAULT_DURATION_DAYS: i64 = 90;
const FORECAST_MONTHS: u32 = 6;
const RECENT_PROJECTS: usize = 5;

/// Parse a sheet date in any of the accepted formats.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineStatus {
    InProgress,
    Completed,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub start_date: String,
    pub end_date: String,
    pub elapsed_days: i64,
    pub total_days: i64,
    pub days_remaining: i64,
    pub percentage: i64,
    pub status: TimelineStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    OverBudget,
    UnderBudget,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetUtilization {
    pub budget: f64,
    pub expenses: f64,
    pub remaining: f64,
    pub percentage: f64,
    pub status: BudgetStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamComposition {
    pub total_members: usize,
    pub role_distribution: BTreeMap<String, usize>,
    pub members: Vec<Record>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectOverview {
    pub status: String,
    pub members_count: usize,
    pub budget_status: BudgetStatus,
    pub progress_percentage: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleProjectDashboard {
    pub project: Record,
    pub timeline: Timeline,
    pub budget: BudgetUtilization,
    pub team: TeamComposition,
    pub overview: ProjectOverview,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetOverview {
    pub total: f64,
    pub expenses: f64,
    pub remaining: f64,
    pub utilization_percentage: f64,
    pub over_budget_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub month: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverviewDashboard {
    pub projects_count: usize,
    pub status_distribution: BTreeMap<String, usize>,
    pub budget: BudgetOverview,
    pub forecast: Vec<ForecastPoint>,
    pub recent_projects: Vec<Record>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProjectDashboard {
    Project(Box<SingleProjectDashboard>),
    Overview(OverviewDashboard),
}

/// Progress of a project between its start and end dates as of `today`.
/// A missing end date means start plus 90 days.
pub fn timeline_progress(project: &Record, today: NaiveDate) -> Timeline {
    let raw_start = text_field(project, "start_date");
    let raw_end = text_field(project, "end_date");

    let start = parse_date(&raw_start);
    let end = if raw_end.trim().is_empty() {
        start.map(|s| s + Duration::days(DEFAULT_DURATION_DAYS))
    } else {
        parse_date(&raw_end)
    };

    let (Some(start), Some(end)) = (start, end) else {
        return Timeline {
            start_date: if raw_start.is_empty() { "N/A".into() } else { raw_start },
            end_date: if raw_end.is_empty() { "N/A".into() } else { raw_end },
            elapsed_days: 0,
            total_days: 0,
            days_remaining: 0,
            percentage: 0,
            status: TimelineStatus::Unknown,
        };
    };

    let total_days = (end - start).num_days();
    let elapsed_days = if today > start { (today - start).num_days() } else { 0 };
    let percentage = if total_days > 0 {
        ((elapsed_days as f64 / total_days as f64) * 100.0).round() as i64
    } else {
        0
    };
    let percentage = percentage.clamp(0, 100);

    Timeline {
        start_date: start.format("%Y-%m-%d").to_string(),
        end_date: end.format("%Y-%m-%d").to_string(),
        elapsed_days,
        total_days,
        days_remaining: if end > today { (end - today).num_days() } else { 0 },
        percentage,
        status: if percentage >= 100 {
            TimelineStatus::Completed
        } else {
            TimelineStatus::InProgress
        },
    }
}

pub fn budget_utilization(project: &Record) -> BudgetUtilization {
    let budget = number_field(project, "budget");
    let expenses = number_field(project, "expenses");
    if budget <= 0.0 {
        return BudgetUtilization {
            budget,
            expenses,
            remaining: 0.0,
            percentage: 0.0,
            status: BudgetStatus::Unknown,
        };
    }
    BudgetUtilization {
        budget,
        expenses,
        remaining: budget - expenses,
        percentage: round2(expenses / budget * 100.0),
        status: budget_status(project),
    }
}

fn budget_status(project: &Record) -> BudgetStatus {
    if number_field(project, "expenses") > number_field(project, "budget") {
        BudgetStatus::OverBudget
    } else {
        BudgetStatus::UnderBudget
    }
}

pub fn team_composition(members: Vec<Record>) -> TeamComposition {
    let mut role_distribution = BTreeMap::new();
    for member in &members {
        let role = match text_field(member, "role") {
            role if role.is_empty() => "Unknown".to_string(),
            role => role,
        };
        *role_distribution.entry(role).or_insert(0) += 1;
    }
    TeamComposition {
        total_members: members.len(),
        role_distribution,
        members,
    }
}

pub fn single_project_dashboard(
    project: Record,
    members: Vec<Record>,
    today: NaiveDate,
) -> SingleProjectDashboard {
    let timeline = timeline_progress(&project, today);
    let budget = budget_utilization(&project);
    let status = match text_field(&project, "status") {
        s if s.is_empty() => "unknown".to_string(),
        s => s,
    };
    let overview = ProjectOverview {
        status,
        members_count: members.len(),
        budget_status: budget_status(&project),
        progress_percentage: timeline.percentage,
    };
    SingleProjectDashboard {
        project,
        timeline,
        budget,
        team: team_composition(members),
        overview,
    }
}

/// Even six-month spread of total expenses, labelled from the current month.
pub fn expense_forecast(expenses_total: f64, today: NaiveDate) -> Vec<ForecastPoint> {
    let first = today.with_day(1).unwrap_or(today);
    let value = round2(expenses_total / FORECAST_MONTHS as f64);
    (0..FORECAST_MONTHS)
        .filter_map(|offset| first.checked_add_months(Months::new(offset)))
        .map(|month| ForecastPoint {
            month: month.format("%b").to_string(),
            value,
        })
        .collect()
}

pub fn overview_dashboard(projects: Vec<Record>, today: NaiveDate) -> OverviewDashboard {
    let total: f64 = projects.iter().map(|p| number_field(p, "budget")).sum();
    let expenses: f64 = projects.iter().map(|p| number_field(p, "expenses")).sum();
    let over_budget_count = projects
        .iter()
        .filter(|p| budget_status(p) == BudgetStatus::OverBudget)
        .count();

    let fallback_start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default();
    let mut recent_projects = projects.clone();
    recent_projects.sort_by_key(|p| {
        std::cmp::Reverse(parse_date(&text_field(p, "start_date")).unwrap_or(fallback_start))
    });
    recent_projects.truncate(RECENT_PROJECTS);

    OverviewDashboard {
        projects_count: projects.len(),
        status_distribution: count_by_status(&projects),
        budget: BudgetOverview {
            total,
            expenses,
            remaining: total - expenses,
            utilization_percentage: if total > 0.0 {
                round2(expenses / total * 100.0)
            } else {
                0.0
            },
            over_budget_count,
        },
        forecast: expense_forecast(expenses, today),
        recent_projects,
    }
}

/// Builds dashboards from the Sheets data source.
#[derive(Clone)]
pub struct DashboardService {
    sheets: GoogleSheetsClient,
}

impl DashboardService {
    pub fn new(sheets: GoogleSheetsClient) -> Self {
        Self { sheets }
    }

    /// A single project's dashboard, or the overview when no project name
    /// is given.
    pub async fn project_dashboard(
        &self,
        project_name: Option<&str>,
        sheet: Option<&str>,
    ) -> Result<ProjectDashboard> {
        let today = Local::now().date_naive();
        match project_name.filter(|n| !n.trim().is_empty()) {
            Some(name) => {
                let project = self
                    .sheets
                    .get_project_by_name(name, sheet)
                    .await?
                    .ok_or_else(|| ChatbotError::NotFound(format!("Project '{}' not found", name)))?;
                let members = self
                    .sheets
                    .get_project_members(Some(name), None, sheet)
                    .await?;
                Ok(ProjectDashboard::Project(Box::new(single_project_dashboard(
                    project, members, today,
                ))))
            }
            None => {
                let projects = match sheet {
                    Some(_) => self.sheets.get_all_projects(sheet).await?,
                    None => self.sheets.get_all_projects_from_all_sheets().await,
                };
                Ok(ProjectDashboard::Overview(overview_dashboard(projects, today)))
            }
        }
    }
}
