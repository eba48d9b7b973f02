// ==========================================
// NIH ExPORTER 导入系统 - 已落库项目行（只读视图）
// ==========================================

use serde::{Deserialize, Serialize};

/// nih_project 中与版本判定相关的列
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedProject {
    pub project_id: i64,
    pub application_id: String,
    pub file_id: i64,
    pub row_number: i64,
    pub is_current: bool,
    pub core_project_num: Option<String>,
    pub project_title: Option<String>,
}
