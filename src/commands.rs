// Host-facing commands: one function per boundary operation
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::interchange::{self, EntityKind, Format};
use crate::state::{
    self, CaseFolder, DataScope, DataSet, DataSetDetail, DataSetInput, Evidence, ProjectInfo,
    RunCase, RunCaseStatus, RunCaseUpdate, Scenario, ScenarioDetail, ScenarioInput, Session,
    TestCase, TestCaseDetail, TestCaseInput, TestRun, TestRunDetail, TestRunInput,
};

#[derive(Debug, Serialize)]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl<E: std::fmt::Display> From<E> for CommandError {
    fn from(error: E) -> Self {
        CommandError {
            message: error.to_string(),
        }
    }
}

type CommandResult<T> = Result<T, CommandError>;

fn parse_scope(scope: Option<&str>) -> CommandResult<Option<DataScope>> {
    match scope {
        None | Some("") => Ok(None),
        Some(s) => DataScope::parse(s).map(Some).ok_or_else(|| CommandError {
            message: format!("Unknown data set scope: {}", s),
        }),
    }
}

// ==================== PROJECT COMMANDS ====================

pub fn create_project(session: &Session, root_path: &str, name: &str) -> CommandResult<ProjectInfo> {
    Ok(session.create_project(Path::new(root_path), name)?)
}

pub fn open_project(session: &Session, path: &str) -> CommandResult<ProjectInfo> {
    Ok(session.open_project(Path::new(path))?)
}

pub fn get_project_info(session: &Session) -> CommandResult<ProjectInfo> {
    Ok(session.get_project_info()?)
}

pub fn rename_project(session: &Session, name: &str) -> CommandResult<ProjectInfo> {
    Ok(session.rename_project(name)?)
}

// ==================== TEST CASE COMMANDS ====================

pub fn list_test_cases(session: &Session, folder_id: Option<String>) -> CommandResult<Vec<TestCase>> {
    Ok(state::list_test_cases(&session.db()?, folder_id.as_deref())?)
}

pub fn get_test_case(session: &Session, id: String) -> CommandResult<Option<TestCaseDetail>> {
    Ok(state::get_test_case(&session.db()?, &id)?)
}

pub fn save_test_case(session: &Session, input: TestCaseInput) -> CommandResult<String> {
    Ok(state::save_test_case(&session.db()?, input)?)
}

pub fn delete_test_case(session: &Session, id: String) -> CommandResult<()> {
    Ok(state::delete_test_case(&session.db()?, &id)?)
}

// ==================== FOLDER COMMANDS ====================

#[derive(Debug, Deserialize)]
pub struct SaveFolderInput {
    pub id: Option<String>,
    pub name: String,
}

pub fn list_folders(session: &Session) -> CommandResult<Vec<CaseFolder>> {
    Ok(state::list_folders(&session.db()?)?)
}

pub fn save_folder(session: &Session, input: SaveFolderInput) -> CommandResult<CaseFolder> {
    Ok(state::save_folder(&session.db()?, input.id, &input.name)?)
}

pub fn delete_folder(session: &Session, id: String) -> CommandResult<()> {
    Ok(state::delete_folder(&session.db()?, &id)?)
}

// ==================== SCENARIO COMMANDS ====================

pub fn list_scenarios(session: &Session) -> CommandResult<Vec<Scenario>> {
    Ok(state::list_scenarios(&session.db()?)?)
}

pub fn get_scenario(session: &Session, id: String) -> CommandResult<Option<ScenarioDetail>> {
    Ok(state::get_scenario(&session.db()?, &id)?)
}

pub fn save_scenario(session: &Session, input: ScenarioInput) -> CommandResult<String> {
    Ok(state::save_scenario(&session.db()?, input)?)
}

pub fn delete_scenario(session: &Session, id: String) -> CommandResult<()> {
    Ok(state::delete_scenario(&session.db()?, &id)?)
}

// ==================== DATA SET COMMANDS ====================

pub fn list_data_sets(session: &Session, scope: Option<String>) -> CommandResult<Vec<DataSet>> {
    let scope = parse_scope(scope.as_deref())?;
    Ok(state::list_data_sets(&session.db()?, scope)?)
}

pub fn get_data_set(session: &Session, id: String) -> CommandResult<Option<DataSetDetail>> {
    Ok(state::get_data_set(&session.db()?, &id)?)
}

pub fn save_data_set(session: &Session, input: DataSetInput) -> CommandResult<String> {
    Ok(state::save_data_set(&session.db()?, input)?)
}

pub fn delete_data_set(session: &Session, id: String) -> CommandResult<()> {
    Ok(state::delete_data_set(&session.db()?, &id)?)
}

// ==================== RUN COMMANDS ====================

pub fn list_runs(session: &Session) -> CommandResult<Vec<TestRun>> {
    Ok(state::list_runs(&session.db()?)?)
}

pub fn get_run(session: &Session, id: String) -> CommandResult<Option<TestRunDetail>> {
    Ok(state::get_run(&session.db()?, &id)?)
}

pub fn save_run(session: &Session, input: TestRunInput) -> CommandResult<String> {
    Ok(state::save_run(&session.db()?, input)?)
}

pub fn delete_run(session: &Session, id: String) -> CommandResult<()> {
    Ok(state::delete_run(&session.db()?, &id)?)
}

#[derive(Debug, Deserialize)]
pub struct AddRunCaseInput {
    pub run_id: String,
    pub case_id: String,
}

pub fn add_run_case(session: &Session, input: AddRunCaseInput) -> CommandResult<RunCase> {
    Ok(state::add_run_case(&session.db()?, &input.run_id, &input.case_id)?)
}

#[derive(Debug, Deserialize)]
pub struct AddScenarioToRunInput {
    pub run_id: String,
    pub scenario_id: String,
}

pub fn add_scenario_to_run(
    session: &Session,
    input: AddScenarioToRunInput,
) -> CommandResult<Vec<RunCase>> {
    Ok(state::add_scenario_to_run(
        &session.db()?,
        &input.run_id,
        &input.scenario_id,
    )?)
}

#[derive(Debug, Deserialize)]
pub struct UpdateRunCaseInput {
    pub id: String,
    pub status: Option<String>,
    pub actual_result: Option<String>,
    pub evidence_summary: Option<String>,
    pub executed_at: Option<String>,
}

pub fn update_run_case(
    session: &Session,
    input: UpdateRunCaseInput,
) -> CommandResult<Option<RunCase>> {
    let status = match input.status.as_deref() {
        Some(s) => Some(RunCaseStatus::parse(s).ok_or_else(|| CommandError {
            message: format!("Unknown run case status: {}", s),
        })?),
        None => None,
    };

    let update = RunCaseUpdate {
        status,
        actual_result: input.actual_result,
        evidence_summary: input.evidence_summary,
        executed_at: input.executed_at,
    };
    Ok(state::update_run_case(&session.db()?, &input.id, update)?)
}

pub fn remove_run_case(session: &Session, id: String) -> CommandResult<()> {
    Ok(state::remove_run_case(&session.db()?, &id)?)
}

// ==================== EVIDENCE COMMANDS ====================

#[derive(Debug, Deserialize)]
pub struct AddEvidenceInput {
    pub run_case_id: String,
    pub source_path: String,
    pub file_name: String,
    #[serde(default)]
    pub mime_type: String,
    pub size: Option<i64>,
}

pub fn add_evidence(session: &Session, input: AddEvidenceInput) -> CommandResult<Evidence> {
    Ok(state::add_evidence(
        &session.active()?,
        &input.run_case_id,
        Path::new(&input.source_path),
        &input.file_name,
        &input.mime_type,
        input.size,
    )?)
}

pub fn list_evidence(session: &Session, run_case_id: String) -> CommandResult<Vec<Evidence>> {
    Ok(state::list_evidence(&session.active()?, &run_case_id)?)
}

pub fn remove_evidence(session: &Session, id: String) -> CommandResult<()> {
    Ok(state::remove_evidence(&session.active()?, &id)?)
}

pub fn get_evidence_path(session: &Session, id: String) -> CommandResult<Option<PathBuf>> {
    Ok(state::get_evidence_path(&session.active()?, &id)?)
}

// ==================== INTERCHANGE COMMANDS ====================

#[derive(Debug, Deserialize)]
pub struct ExportInput {
    pub entity: String,
    pub format: String,
    pub scope: Option<String>,
}

pub fn export_data(session: &Session, input: ExportInput) -> CommandResult<String> {
    let kind = EntityKind::parse(&input.entity)?;
    let format = Format::parse(&input.format)?;
    let scope = parse_scope(input.scope.as_deref())?;
    Ok(interchange::export_data(&session.db()?, kind, format, scope)?)
}

#[derive(Debug, Deserialize)]
pub struct ImportInput {
    pub entity: String,
    pub format: String,
    pub content: String,
    pub scope_override: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub imported_count: usize,
}

pub fn import_data(session: &Session, input: ImportInput) -> CommandResult<ImportResult> {
    let kind = EntityKind::parse(&input.entity)?;
    let format = Format::parse(&input.format)?;
    let scope_override = parse_scope(input.scope_override.as_deref())?;
    let imported_count = interchange::import_data(
        &session.db()?,
        kind,
        format,
        &input.content,
        scope_override,
    )?;
    Ok(ImportResult { imported_count })
}
