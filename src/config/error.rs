// ==========================================
// NIH ExPORTER 导入系统 - 配置错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 配置错误（运行前致命）
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("财年格式错误 ({field}): 期望 4 位年份 19xx/20xx，实际 {value:?}")]
    InvalidFiscalYear { field: String, value: String },

    #[error("财年范围错误: 起始 {start} 晚于结束 {stop}")]
    FiscalYearRangeOrder { start: i32, stop: i32 },

    #[error("文件日期格式错误: 期望 MM/DD/YYYY 或 YYYY-MM-DD，实际 {0:?}")]
    InvalidFileDate(String),

    #[error("财年范围 {start}-{stop} 内没有可处理的文件")]
    NoFilesInRange { start: i32, stop: i32 },

    #[error("配置文件读取失败 ({path}): {message}")]
    ReadError { path: String, message: String },

    #[error("配置文件解析失败 ({path}): {message}")]
    ParseError { path: String, message: String },
}

/// Result 类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
