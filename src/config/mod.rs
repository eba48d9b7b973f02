// ==========================================
// NIH ExPORTER 导入系统 - 配置层
// ==========================================
// 职责: 加载选项、财年范围校验、输入文件清单
// 来源: JSON 文件 + 环境变量覆写
// ==========================================

pub mod error;
pub mod loader_config;
pub mod manifest;

// 重导出核心类型
pub use error::{ConfigError, ConfigResult};
pub use loader_config::{default_db_path, env_keys, FiscalYearRange, LoaderConfig};
pub use manifest::{parse_file_date, FileManifest, XmlFileEntry};
