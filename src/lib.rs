// ==========================================
// NIH ExPORTER 导入系统 - 核心库
// ==========================================
// 技术栈: Rust + quick-xml + SQLite
// 系统定位: 把 NIH ExPORTER 项目 XML 文件幂等地增量导入关系库
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 记录与文件元数据
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - XML 抽取与增量落库
pub mod importer;

// 配置层 - 加载配置与文件清单
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域实体
pub use domain::{
    Investigator, LoadSummary, NihAward, PersistedProject, SourceFileDescriptor, SourceFileMeta,
    XmlSourceFile,
};

// 导入
pub use importer::{AwardLoader, AwardLoaderImpl, AwardReader, ImportError, LoadOptions};

// 配置
pub use config::{FileManifest, FiscalYearRange, LoaderConfig};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "NIH ExPORTER 导入系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert!(!APP_NAME.is_empty());
    }
}
