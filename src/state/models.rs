// Data models for the casebook store
use serde::{Deserialize, Serialize};

// ==================== PROJECT ====================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectInfo {
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
    pub root_path: String,
}

// ==================== TEST CASES ====================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestCase {
    pub id: String,
    pub title: String,
    pub objective: String,
    pub preconditions: String,
    pub priority: String,
    pub severity: String,
    /// Comma-delimited tag list
    pub tags: String,
    pub folder_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestStep {
    pub id: String,
    pub case_id: String,
    pub position: i64,
    pub action: String,
    pub expected: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestCaseDetail {
    pub case: TestCase,
    pub steps: Vec<TestStep>,
    pub data_set_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StepInput {
    pub action: String,
    pub expected: String,
}

impl StepInput {
    pub fn is_blank(&self) -> bool {
        self.action.trim().is_empty() && self.expected.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TestCaseInput {
    pub id: Option<String>,
    pub title: String,
    pub objective: String,
    pub preconditions: String,
    pub priority: String,
    pub severity: String,
    pub tags: String,
    pub folder_id: Option<String>,
    pub steps: Vec<StepInput>,
    pub data_set_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseFolder {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

// ==================== SCENARIOS ====================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    pub id: String,
    pub title: String,
    pub objective: String,
    pub preconditions: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A scenario's reference to one of its cases, joined with the case title
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioCaseRef {
    pub case_id: String,
    pub title: String,
    pub position: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioDetail {
    pub scenario: Scenario,
    pub cases: Vec<ScenarioCaseRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioInput {
    pub id: Option<String>,
    pub title: String,
    pub objective: String,
    pub preconditions: String,
    /// Ordered case ids; positions follow this order
    pub case_ids: Vec<String>,
}

// ==================== DATA SETS ====================

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DataScope {
    #[default]
    Common,
    Case,
    Scenario,
    Run,
}

impl DataScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataScope::Common => "common",
            DataScope::Case => "case",
            DataScope::Scenario => "scenario",
            DataScope::Run => "run",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "common" => Some(DataScope::Common),
            "case" => Some(DataScope::Case),
            "scenario" => Some(DataScope::Scenario),
            "run" => Some(DataScope::Run),
            _ => None,
        }
    }

    pub fn from_string(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }

    /// Entity kind a data set of this scope may link to
    pub fn link_target(&self) -> Option<&'static str> {
        match self {
            DataScope::Common => None,
            DataScope::Case => Some("case"),
            DataScope::Scenario => Some("scenario"),
            DataScope::Run => Some("run"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataSet {
    pub id: String,
    pub name: String,
    pub scope: DataScope,
    pub description: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataItem {
    pub id: String,
    pub data_set_id: String,
    pub label: String,
    pub value: String,
    pub note: String,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataLink {
    pub data_set_id: String,
    pub entity_type: String,
    pub entity_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataSetDetail {
    pub data_set: DataSet,
    pub items: Vec<DataItem>,
    pub links: Vec<DataLink>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataItemInput {
    pub label: String,
    pub value: String,
    pub note: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSetInput {
    pub id: Option<String>,
    pub name: String,
    pub scope: DataScope,
    pub description: String,
    pub items: Vec<DataItemInput>,
    /// Ids of the entities (of the scope's kind) this set is linked to
    pub links: Vec<String>,
}

// ==================== RUNS ====================

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Draft,
    InProgress,
    Completed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Draft => "draft",
            RunStatus::InProgress => "in_progress",
            RunStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(RunStatus::Draft),
            "in_progress" => Some(RunStatus::InProgress),
            "completed" => Some(RunStatus::Completed),
            _ => None,
        }
    }

    pub fn from_string(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunCaseStatus {
    #[default]
    NotRun,
    Pass,
    Fail,
    Blocked,
    Skip,
}

impl RunCaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunCaseStatus::NotRun => "not_run",
            RunCaseStatus::Pass => "pass",
            RunCaseStatus::Fail => "fail",
            RunCaseStatus::Blocked => "blocked",
            RunCaseStatus::Skip => "skip",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_run" => Some(RunCaseStatus::NotRun),
            "pass" => Some(RunCaseStatus::Pass),
            "fail" => Some(RunCaseStatus::Fail),
            "blocked" => Some(RunCaseStatus::Blocked),
            "skip" => Some(RunCaseStatus::Skip),
            _ => None,
        }
    }

    pub fn from_string(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestRun {
    pub id: String,
    pub name: String,
    pub environment: String,
    pub build_version: String,
    pub tester: String,
    pub status: RunStatus,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub notes: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunCase {
    pub id: String,
    pub run_id: String,
    pub case_id: String,
    pub case_title: Option<String>,
    pub status: RunCaseStatus,
    pub actual_result: String,
    pub evidence_summary: String,
    pub executed_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestRunDetail {
    pub run: TestRun,
    pub scenario_ids: Vec<String>,
    pub cases: Vec<RunCase>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TestRunInput {
    pub id: Option<String>,
    pub name: String,
    pub environment: String,
    pub build_version: String,
    pub tester: String,
    pub status: RunStatus,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub notes: String,
    pub scenario_ids: Vec<String>,
}

/// In-place patch of a run case; `None` fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunCaseUpdate {
    pub status: Option<RunCaseStatus>,
    pub actual_result: Option<String>,
    pub evidence_summary: Option<String>,
    pub executed_at: Option<String>,
}

// ==================== EVIDENCE ====================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evidence {
    pub id: String,
    pub run_case_id: String,
    pub file_name: String,
    /// Relative to the project root
    pub stored_path: Option<String>,
    pub mime_type: String,
    pub size: i64,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_names() {
        assert_eq!(RunCaseStatus::parse("not_run"), Some(RunCaseStatus::NotRun));
        assert_eq!(RunCaseStatus::parse("passed"), None);
        assert_eq!(RunStatus::from_string("bogus"), RunStatus::Draft);
        assert_eq!(RunStatus::InProgress.as_str(), "in_progress");
    }

    #[test]
    fn test_scope_link_targets() {
        assert_eq!(DataScope::Common.link_target(), None);
        assert_eq!(DataScope::Scenario.link_target(), Some("scenario"));
        assert_eq!(DataScope::from_string("run"), DataScope::Run);
    }

    #[test]
    fn test_serde_status_names_match_storage() {
        let json = serde_json::to_string(&RunCaseStatus::NotRun).unwrap();
        assert_eq!(json, "\"not_run\"");
        let status: RunStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(status, RunStatus::InProgress);
    }
}
