//! Google Sheets project data source.
//!
//! Each configured spreadsheet holds a `Projects` and a `Members`
//! worksheet whose first row is the header. Rows are read as JSON records
//! tagged with the name of the sheet they came from.

use super::google_auth::{ServiceAccountAuth, ServiceAccountKey};
use super::SheetsError;
use crate::cache::TtlCache;
use crate::config::SheetsConfig;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// One worksheet row keyed by header.
pub type Record = Map<String, Value>;

pub const PROJECTS_WORKSHEET: &str = "Projects";
pub const MEMBERS_WORKSHEET: &str = "Members";
pub const DEFAULT_SHEET: &str = "default";
pub const SOURCE_SHEET_FIELD: &str = "_source_sheet";

pub const REQUIRED_PROJECT_FIELDS: &[&str] = &[
    "name",
    "description",
    "start_date",
    "end_date",
    "budget",
    "expenses",
    "status",
];
pub const REQUIRED_MEMBER_FIELDS: &[&str] = &["project_name", "name", "role", "email"];

const ALL_DATA_KEY: &str = "all_data";

/// How requests authenticate.
enum SheetsAuth {
    ApiKey(String),
    ServiceAccount(Arc<ServiceAccountAuth>),
    Unconfigured,
}

/// Budget figures across a set of projects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetStatistics {
    pub total_projects: usize,
    pub over_budget_count: usize,
    pub under_budget_count: usize,
    pub over_budget_projects: Vec<Record>,
    pub under_budget_projects: Vec<Record>,
    pub sheets_analyzed: Vec<String>,
    pub total_budget: f64,
    pub total_expenses: f64,
    pub remaining_budget: f64,
    pub utilization_percent: f64,
}

/// Result of checking a spreadsheet's layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetValidation {
    pub valid: bool,
    pub sheet_name: String,
    pub sheets_found: Vec<String>,
    pub errors: Vec<String>,
}

/// Read a numeric field, accepting numbers and numeric strings such as
/// `"$1,200.50"`. Anything else counts as zero.
pub fn number_field(record: &Record, field: &str) -> f64 {
    match record.get(field) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s
            .trim()
            .trim_start_matches('$')
            .replace(',', "")
            .parse()
            .unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Read a field as display text.
pub fn text_field(record: &Record, field: &str) -> String {
    match record.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Turn a raw cell into a number when it parses as one. Empty cells stay
/// empty strings.
fn numericise(cell: &Value) -> Value {
    match cell {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Value::String(String::new());
            }
            if let Ok(i) = trimmed.parse::<i64>() {
                return json!(i);
            }
            match trimmed.parse::<f64>() {
                Ok(f) if f.is_finite() => json!(f),
                _ => Value::String(s.clone()),
            }
        }
        Value::Null => Value::String(String::new()),
        other => other.clone(),
    }
}

/// Convert a header row plus data rows into records.
pub fn rows_to_records(rows: &[Vec<Value>], source_sheet: &str) -> Vec<Record> {
    let Some((header, data)) = rows.split_first() else {
        return Vec::new();
    };
    let header: Vec<String> = header
        .iter()
        .map(|cell| match cell {
            Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        })
        .collect();

    data.iter()
        .filter(|row| row.iter().any(|cell| !matches!(cell, Value::String(s) if s.trim().is_empty())))
        .map(|row| {
            let mut record = Record::new();
            for (i, column) in header.iter().enumerate() {
                if column.is_empty() {
                    continue;
                }
                let cell = row.get(i).map(numericise).unwrap_or_else(|| json!(""));
                record.insert(column.clone(), cell);
            }
            record.insert(SOURCE_SHEET_FIELD.to_string(), json!(source_sheet));
            record
        })
        .collect()
}

/// Budget totals and over/under lists for `projects`.
pub fn budget_statistics(projects: Vec<Record>, sheets_analyzed: Vec<String>) -> BudgetStatistics {
    let total_budget: f64 = projects.iter().map(|p| number_field(p, "budget")).sum();
    let total_expenses: f64 = projects.iter().map(|p| number_field(p, "expenses")).sum();
    let total_projects = projects.len();

    let (over, under): (Vec<Record>, Vec<Record>) = projects
        .into_iter()
        .partition(|p| number_field(p, "expenses") > number_field(p, "budget"));

    BudgetStatistics {
        total_projects,
        over_budget_count: over.len(),
        under_budget_count: under.len(),
        over_budget_projects: over,
        under_budget_projects: under,
        sheets_analyzed,
        total_budget,
        total_expenses,
        remaining_budget: total_budget - total_expenses,
        utilization_percent: if total_budget > 0.0 {
            total_expenses / total_budget * 100.0
        } else {
            0.0
        },
    }
}

/// Project counts per status. Records without a status count as `unknown`.
pub fn count_by_status(projects: &[Record]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for project in projects {
        let status = match project.get("status") {
            None | Some(Value::Null) => "unknown".to_string(),
            Some(_) => text_field(project, "status"),
        };
        *counts.entry(status).or_insert(0) += 1;
    }
    counts
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

/// Client for the Sheets REST v4 API.
#[derive(Clone)]
pub struct GoogleSheetsClient {
    http: Client,
    base_url: String,
    auth: Arc<SheetsAuth>,
    sheets: BTreeMap<String, String>,
    cache: TtlCache<String, Value>,
}

impl GoogleSheetsClient {
    /// Build a client from config. Service-account credentials take
    /// precedence over an API key.
    pub fn new(config: &SheetsConfig, data_ttl: Duration) -> Result<Self, SheetsError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SheetsError::Transport(e.to_string()))?;

        let auth = if let Some(path) = config.credentials_file() {
            let key = ServiceAccountKey::from_file(&path)?;
            SheetsAuth::ServiceAccount(Arc::new(ServiceAccountAuth::new(key, http.clone())?))
        } else if let Some(key) = config.api_key() {
            SheetsAuth::ApiKey(key)
        } else {
            SheetsAuth::Unconfigured
        };

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth: Arc::new(auth),
            sheets: config.sheets(),
            cache: TtlCache::new(data_ttl),
        })
    }

    /// Whether requests can authenticate and a spreadsheet is configured.
    pub fn is_configured(&self) -> bool {
        !matches!(*self.auth, SheetsAuth::Unconfigured) && !self.sheets.is_empty()
    }

    pub fn available_sheet_names(&self) -> Vec<String> {
        self.sheets.keys().cloned().collect()
    }

    /// Resolve a sheet name to `(name, spreadsheet id)`. Unknown or missing
    /// names resolve to the default spreadsheet.
    fn resolve(&self, sheet: Option<&str>) -> Result<(String, String), SheetsError> {
        if let Some(name) = sheet {
            if let Some(id) = self.sheets.get(name) {
                return Ok((name.to_string(), id.clone()));
            }
        }
        let id = self
            .sheets
            .get(DEFAULT_SHEET)
            .or_else(|| self.sheets.values().next())
            .ok_or_else(|| SheetsError::NotConfigured("No spreadsheet configured".to_string()))?;
        Ok((sheet.unwrap_or(DEFAULT_SHEET).to_string(), id.clone()))
    }

    fn url(&self, segments: &[&str]) -> Result<Url, SheetsError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SheetsError::NotConfigured(format!("Invalid Sheets base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| SheetsError::NotConfigured("Invalid Sheets base URL".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, SheetsError> {
        match self.auth.as_ref() {
            SheetsAuth::ApiKey(key) => Ok(request.query(&[("key", key.as_str())])),
            SheetsAuth::ServiceAccount(account) => {
                Ok(request.bearer_auth(account.access_token().await?))
            }
            SheetsAuth::Unconfigured => Err(SheetsError::NotConfigured(
                "Set sheets.api_key or sheets.credentials_file".to_string(),
            )),
        }
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
        spreadsheet_id: &str,
    ) -> Result<T, SheetsError> {
        let response = self
            .authorize(request)
            .await?
            .send()
            .await
            .map_err(|e| SheetsError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::NOT_FOUND => SheetsError::Http {
                    status: 404,
                    message: format!("Spreadsheet with ID {} not found", spreadsheet_id),
                },
                StatusCode::FORBIDDEN => SheetsError::Http {
                    status: 403,
                    message: format!("Permission denied for spreadsheet {}", spreadsheet_id),
                },
                StatusCode::TOO_MANY_REQUESTS => SheetsError::RateLimited,
                other => SheetsError::Http {
                    status: other.as_u16(),
                    message: body,
                },
            });
        }

        response
            .json()
            .await
            .map_err(|e| SheetsError::InvalidResponse(e.to_string()))
    }

    /// Worksheet titles of a spreadsheet.
    async fn worksheet_titles(&self, spreadsheet_id: &str) -> Result<Vec<String>, SheetsError> {
        let url = self.url(&["spreadsheets", spreadsheet_id])?;
        let request = self
            .http
            .get(url)
            .query(&[("fields", "sheets.properties.title")]);
        let meta: SpreadsheetMeta = self.send(request, spreadsheet_id).await?;
        Ok(meta.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    async fn read_rows(
        &self,
        spreadsheet_id: &str,
        worksheet: &str,
    ) -> Result<Vec<Vec<Value>>, SheetsError> {
        let url = self.url(&["spreadsheets", spreadsheet_id, "values", worksheet])?;
        let request = self
            .http
            .get(url)
            .query(&[("valueRenderOption", "UNFORMATTED_VALUE")]);
        match self.send::<ValueRange>(request, spreadsheet_id).await {
            Ok(range) => Ok(range.values),
            Err(SheetsError::Http { status: 400, .. }) => {
                Err(SheetsError::WorksheetNotFound(worksheet.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn read_worksheet(
        &self,
        sheet: Option<&str>,
        worksheet: &str,
    ) -> Result<Vec<Record>, SheetsError> {
        let (name, id) = self.resolve(sheet)?;
        let rows = self.read_rows(&id, worksheet).await?;
        Ok(rows_to_records(&rows, &name))
    }

    pub async fn get_all_projects(&self, sheet: Option<&str>) -> Result<Vec<Record>, SheetsError> {
        self.read_worksheet(sheet, PROJECTS_WORKSHEET).await
    }

    /// Members of a sheet, optionally filtered by project name
    /// (case-insensitive) or project id.
    pub async fn get_project_members(
        &self,
        project_name: Option<&str>,
        project_id: Option<&str>,
        sheet: Option<&str>,
    ) -> Result<Vec<Record>, SheetsError> {
        let members = self.read_worksheet(sheet, MEMBERS_WORKSHEET).await?;
        Ok(match (project_name, project_id) {
            (Some(name), _) => members
                .into_iter()
                .filter(|m| text_field(m, "project_name").to_lowercase() == name.to_lowercase())
                .collect(),
            (None, Some(id)) => members
                .into_iter()
                .filter(|m| text_field(m, "project_id") == id)
                .collect(),
            (None, None) => members,
        })
    }

    async fn collect_from_all_sheets(&self, worksheet: &str) -> Vec<Record> {
        let mut all = Vec::new();
        for name in self.sheets.keys() {
            match self.read_worksheet(Some(name), worksheet).await {
                Ok(records) => all.extend(records),
                Err(e) => warn!(sheet = %name, worksheet, error = %e, "Skipping sheet"),
            }
        }
        all
    }

    /// Projects from every configured sheet. Failing sheets are skipped.
    pub async fn get_all_projects_from_all_sheets(&self) -> Vec<Record> {
        self.collect_from_all_sheets(PROJECTS_WORKSHEET).await
    }

    /// Members from every configured sheet. Failing sheets are skipped.
    pub async fn get_all_members_from_all_sheets(&self) -> Vec<Record> {
        self.collect_from_all_sheets(MEMBERS_WORKSHEET).await
    }

    async fn projects_in_scope(&self, sheet: Option<&str>) -> Result<(Vec<Record>, Vec<String>), SheetsError> {
        match sheet {
            Some(name) => Ok((self.get_all_projects(Some(name)).await?, vec![name.to_string()])),
            None => Ok((
                self.get_all_projects_from_all_sheets().await,
                self.available_sheet_names(),
            )),
        }
    }

    /// Case-insensitive lookup in one sheet, or across all sheets.
    pub async fn get_project_by_name(
        &self,
        name: &str,
        sheet: Option<&str>,
    ) -> Result<Option<Record>, SheetsError> {
        let (projects, _) = self.projects_in_scope(sheet).await?;
        let wanted = name.to_lowercase();
        Ok(projects
            .into_iter()
            .find(|p| text_field(p, "name").to_lowercase() == wanted))
    }

    pub async fn get_budget_statistics(
        &self,
        sheet: Option<&str>,
    ) -> Result<BudgetStatistics, SheetsError> {
        let (projects, analyzed) = self.projects_in_scope(sheet).await?;
        Ok(budget_statistics(projects, analyzed))
    }

    pub async fn get_project_count_by_status(
        &self,
        sheet: Option<&str>,
    ) -> Result<BTreeMap<String, usize>, SheetsError> {
        let (projects, _) = self.projects_in_scope(sheet).await?;
        Ok(count_by_status(&projects))
    }

    /// Check for the required worksheets and header columns.
    pub async fn validate_sheet_structure(&self, sheet: Option<&str>) -> SheetValidation {
        let sheet_name = sheet.unwrap_or(DEFAULT_SHEET).to_string();
        match self.validate_inner(sheet).await {
            Ok((sheets_found, errors)) => SheetValidation {
                valid: errors.is_empty(),
                sheet_name,
                sheets_found,
                errors,
            },
            Err(e) => SheetValidation {
                valid: false,
                sheet_name,
                sheets_found: Vec::new(),
                errors: vec![format!("Error validating sheet structure: {}", e)],
            },
        }
    }

    async fn validate_inner(
        &self,
        sheet: Option<&str>,
    ) -> Result<(Vec<String>, Vec<String>), SheetsError> {
        let (_, id) = self.resolve(sheet)?;
        let titles = self.worksheet_titles(&id).await?;
        let mut errors = Vec::new();

        for (worksheet, required) in [
            (PROJECTS_WORKSHEET, REQUIRED_PROJECT_FIELDS),
            (MEMBERS_WORKSHEET, REQUIRED_MEMBER_FIELDS),
        ] {
            if !titles.iter().any(|t| t == worksheet) {
                errors.push(format!("Missing '{}' worksheet", worksheet));
                continue;
            }
            let rows = self.read_rows(&id, worksheet).await?;
            let headers: Vec<String> = rows
                .first()
                .map(|row| {
                    row.iter()
                        .map(|c| c.as_str().unwrap_or_default().trim().to_lowercase())
                        .collect()
                })
                .unwrap_or_default();
            for field in required {
                if !headers.iter().any(|h| h == field) {
                    errors.push(format!(
                        "Missing '{}' column in {} worksheet",
                        field, worksheet
                    ));
                }
            }
        }

        Ok((titles, errors))
    }

    /// Every sheet's projects and members, shaped
    /// `{sheet: {"Projects": [...], "Members": [...]}}` and cached for the
    /// data TTL.
    pub async fn get_all_data(&self, use_cache: bool) -> Result<Value, SheetsError> {
        let key = ALL_DATA_KEY.to_string();
        if use_cache {
            if let Some(data) = self.cache.get(&key) {
                return Ok(data);
            }
        }

        if self.sheets.is_empty() {
            return Err(SheetsError::NotConfigured(
                "No spreadsheet configured".to_string(),
            ));
        }

        let mut data = Map::new();
        let mut last_error = None;
        for name in self.sheets.keys() {
            let projects = self.get_all_projects(Some(name)).await;
            let members = self.get_project_members(None, None, Some(name)).await;
            match (projects, members) {
                (Ok(projects), Ok(members)) => {
                    data.insert(
                        name.clone(),
                        json!({ PROJECTS_WORKSHEET: projects, MEMBERS_WORKSHEET: members }),
                    );
                }
                (Err(e), _) | (_, Err(e)) => {
                    warn!(sheet = %name, error = %e, "Failed to load sheet data");
                    last_error = Some(e);
                }
            }
        }

        if data.is_empty() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        let data = Value::Object(data);
        self.cache.insert(key, data.clone());
        Ok(data)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("Cleared sheets data cache");
    }

    /// Replace a worksheet's contents with `rows` (header first).
    pub async fn import_sheet(
        &self,
        sheet: Option<&str>,
        worksheet: &str,
        rows: Vec<Vec<Value>>,
    ) -> Result<usize, SheetsError> {
        let (_, id) = self.resolve(sheet)?;

        let clear_url = self.url(&[
            "spreadsheets",
            &id,
            "values",
            &format!("{}:clear", worksheet),
        ])?;
        let _: Value = self
            .send(self.http.post(clear_url).json(&json!({})), &id)
            .await?;

        let update_url = self.url(&["spreadsheets", &id, "values", worksheet])?;
        let body = json!({
            "range": worksheet,
            "majorDimension": "ROWS",
            "values": rows,
        });
        let request = self
            .http
            .put(update_url)
            .query(&[("valueInputOption", "RAW")])
            .json(&body);
        let _: Value = self.send(request, &id).await?;

        self.clear_cache();
        let written = rows.len().saturating_sub(1);
        info!(worksheet, rows = written, "Imported worksheet");
        Ok(written)
    }
}
