// ==========================================
// NIH ExPORTER 导入系统 - 输入文件清单
// ==========================================
// 职责: 读取外部获取组件给出的文件清单，按财年范围筛选
// 格式: JSON 数组 [{ fiscal_year, file_date, xml_file }]
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::loader_config::{parse_fiscal_year, FiscalYearRange};
use crate::domain::XmlSourceFile;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// 清单中的一项（原样保留字符串，选择时再校验）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlFileEntry {
    pub fiscal_year: String,
    pub file_date: String,
    pub xml_file: PathBuf,
}

impl XmlFileEntry {
    /// 校验并转换为待处理文件
    ///
    /// 相对路径以 base_dir 为基准
    pub fn to_source_file(&self, base_dir: &Path) -> ConfigResult<XmlSourceFile> {
        let fiscal_year = parse_fiscal_year("fiscal_year", &self.fiscal_year)?;
        let date = parse_file_date(&self.file_date)?;
        let path = if self.xml_file.is_relative() {
            base_dir.join(&self.xml_file)
        } else {
            self.xml_file.clone()
        };

        Ok(XmlSourceFile::new(path, date, fiscal_year))
    }
}

/// 解析文件日期（MM/DD/YYYY 或 YYYY-MM-DD）
pub fn parse_file_date(raw: &str) -> ConfigResult<NaiveDate> {
    let value = raw.trim();
    NaiveDate::parse_from_str(value, "%m/%d/%Y")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .map_err(|_| ConfigError::InvalidFileDate(raw.to_string()))
}

// ==========================================
// FileManifest - 文件清单
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileManifest {
    pub files: Vec<XmlFileEntry>,
    #[serde(skip)]
    base_dir: PathBuf,
}

impl FileManifest {
    pub fn new(files: Vec<XmlFileEntry>) -> Self {
        Self {
            files,
            base_dir: PathBuf::from("."),
        }
    }

    /// 读取 JSON 清单；相对路径以清单所在目录为基准
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let files: Vec<XmlFileEntry> =
            serde_json::from_str(&raw).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self { files, base_dir })
    }

    /// 选出财年范围内的文件（保持清单顺序）
    ///
    /// # 返回
    /// - Err(NoFilesInRange): 范围内没有任何文件
    pub fn select(&self, range: &FiscalYearRange) -> ConfigResult<Vec<XmlSourceFile>> {
        let mut selected = Vec::new();
        for entry in &self.files {
            let file = entry.to_source_file(&self.base_dir)?;
            if range.contains(file.meta.fiscal_year) {
                selected.push(file);
            } else {
                debug!(file = %file.meta, "不在财年范围内，忽略");
            }
        }

        if selected.is_empty() {
            return Err(ConfigError::NoFilesInRange {
                start: range.start,
                stop: range.stop,
            });
        }

        Ok(selected)
    }
}
