// ==========================================
// NIH ExPORTER 导入系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 约定: 所有变体均终止本次运行，不自动重试
// ==========================================

use crate::config::ConfigError;
use crate::repository::RepositoryError;
use chrono::NaiveDate;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件读取失败 ({file}): {message}")]
    FileReadError { file: String, message: String },

    /// XML 不合法：本文件抽取立即终止，出错行不会产出
    #[error("XML 格式错误 (文件 {file}, 行 {row}, 字节 {position}): {message}")]
    MalformedInput {
        file: String,
        row: usize,
        position: u64,
        message: String,
    },

    // ===== 落库错误 =====
    #[error("落库失败 (文件 {file_name} @ {file_date}, 行 {row}): {source}")]
    Persistence {
        file_name: String,
        file_date: NaiveDate,
        row: usize,
        source: RepositoryError,
    },

    #[error("数据库操作失败: {0}")]
    Database(#[from] RepositoryError),

    // ===== 配置错误 =====
    #[error(transparent)]
    Config(#[from] ConfigError),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl ImportError {
    /// 出错文件名（若可定位）
    pub fn file_name(&self) -> Option<&str> {
        match self {
            ImportError::FileNotFound(file) => Some(file),
            ImportError::FileReadError { file, .. } => Some(file),
            ImportError::MalformedInput { file, .. } => Some(file),
            ImportError::Persistence { file_name, .. } => Some(file_name),
            _ => None,
        }
    }
}

// 实现 From<rusqlite::Error>（提交/建表等不针对具体行的失败）
impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::Database(RepositoryError::from(err))
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
