// ==========================================
// NIH ExPORTER 导入系统 - 项目记录领域模型
// ==========================================
// 职责: 一条 <row> 的内存表示（扁平标量 + 两个可重复子组）
// 红线: 只在行结束标签出现后才算完整，解析中途的记录不得外泄
// ==========================================

use crate::domain::source_file::SourceFileMeta;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// Investigator - 项目负责人（PI）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Investigator {
    pub pi_id: String,
    pub pi_name: String,
}

// ==========================================
// NihAward - 单条项目记录
// ==========================================
// 约定: 标量字段名 = 源 XML 标签名小写
// 约定: 缺失标签保持空字符串（零值），不区分 null/空
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NihAward {
    // ===== 来源信息 =====
    pub source_file_name: String,
    pub source_file_date: NaiveDate,
    pub source_fiscal_year: i32,
    pub source_file_row_number: usize, // 文件内行号（0 起）

    // ===== 自然键 =====
    pub application_id: String, // 跨文件可重复

    // ===== 标量字段 =====
    pub activity: String,
    pub administering_ic: String,
    pub application_type: String,
    pub arra_funded: String,
    pub award_notice_date: String,
    pub budget_start: String,
    pub budget_end: String,
    pub cfda_code: String,
    pub core_project_num: String,
    pub ed_inst_type: String,
    pub foa_number: String,
    pub full_project_num: String,
    pub funding_ics: String,
    pub funding_mechanism: String,
    pub fy: String,
    pub ic_name: String,
    pub nih_spending_cats: String,
    pub org_city: String,
    pub org_country: String,
    pub org_dept: String,
    pub org_district: String,
    pub org_duns: String,
    pub org_fips: String,
    pub org_name: String,
    pub org_state: String,
    pub org_zipcode: String,
    pub phr: String,
    pub program_officer_name: String,
    pub project_start: String,
    pub project_end: String,
    pub project_title: String,
    pub serial_number: String,
    pub study_section: String,
    pub study_section_name: String,
    pub subproject_id: String,
    pub suffix: String,
    pub support_year: String,
    pub total_cost: String,
    pub total_cost_sub_project: String,

    // ===== 一对多子组（源名: PROJECT_TERMSX / PIS）=====
    pub terms: Vec<String>,
    pub investigators: Vec<Investigator>,
}

impl NihAward {
    /// 以文件元数据和行号创建一条空记录
    pub fn new(meta: &SourceFileMeta, row_number: usize) -> Self {
        Self {
            source_file_name: meta.name.clone(),
            source_file_date: meta.date,
            source_fiscal_year: meta.fiscal_year,
            source_file_row_number: row_number,
            ..Default::default()
        }
    }

    /// 是否为文件首行（加载协调器据此识别新文件）
    pub fn is_first_row(&self) -> bool {
        self.source_file_row_number == 0
    }
}
