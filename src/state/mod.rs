// State management module
// Handles SQLite persistence and evidence files of the open project

pub mod cases;
pub mod data_sets;
pub mod db;
pub mod evidence;
pub mod models;
pub mod runs;
pub mod scenarios;
pub mod session;
pub mod storage;

pub use cases::{
    delete_folder, delete_test_case, get_test_case, list_folders, list_test_cases, save_folder,
    save_test_case,
};
pub use data_sets::{delete_data_set, get_data_set, list_data_sets, save_data_set};
pub use db::{open_db, open_in_memory, DbConnection, DbError, DbResult};
pub use evidence::{add_evidence, get_evidence_path, list_evidence, remove_evidence};
pub use models::{
    CaseFolder, DataItem, DataItemInput, DataLink, DataScope, DataSet, DataSetDetail,
    DataSetInput, Evidence, ProjectInfo, RunCase, RunCaseStatus, RunCaseUpdate, RunStatus,
    Scenario, ScenarioCaseRef, ScenarioDetail, ScenarioInput, StepInput, TestCase,
    TestCaseDetail, TestCaseInput, TestRun, TestRunDetail, TestRunInput, TestStep,
};
pub use runs::{
    add_run_case, add_scenario_to_run, delete_run, get_run, list_runs, remove_run_case,
    save_run, update_run_case,
};
pub use scenarios::{delete_scenario, get_scenario, list_scenarios, save_scenario};
pub use session::{ActiveStore, Session};
