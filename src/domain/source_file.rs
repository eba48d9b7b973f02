// ==========================================
// NIH ExPORTER 导入系统 - 源文件领域模型
// ==========================================
// 职责: 源文件元数据、登记表条目、登记结果
// 约束: (name, date) 为自然键
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ==========================================
// SourceFileMeta - 抽取时附带到每条记录上的文件元数据
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFileMeta {
    pub name: String, // 文件基名（不含目录）
    pub date: NaiveDate,
    pub fiscal_year: i32,
}

impl fmt::Display for SourceFileMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, FY{})", self.name, self.date, self.fiscal_year)
    }
}

// ==========================================
// SourceFileDescriptor - nih_source_file 表中的一行
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFileDescriptor {
    pub file_id: i64,
    pub name: String,
    pub date: NaiveDate,
    pub fiscal_year: i32,
    pub precedence_order: Option<i64>, // 派生值，1 = 最新；未重算前为 None
}

/// 文件登记结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRegistration {
    pub file_id: i64,
    /// true: 本次新建；false: (name, date) 已存在，返回已有 ID
    pub created: bool,
}

// ==========================================
// XmlSourceFile - 待处理的已解压 XML 文件
// ==========================================
// 来源: 外部获取/解压组件给出的文件清单
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlSourceFile {
    pub meta: SourceFileMeta,
    pub path: PathBuf,
}

impl XmlSourceFile {
    /// 以路径基名作为登记名
    pub fn new(path: impl Into<PathBuf>, date: NaiveDate, fiscal_year: i32) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Self {
            meta: SourceFileMeta {
                name,
                date,
                fiscal_year,
            },
            path,
        }
    }
}
