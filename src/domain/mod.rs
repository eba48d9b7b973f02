// ==========================================
// NIH ExPORTER 导入系统 - 领域模型层
// ==========================================
// 职责: 定义项目记录、源文件、已落库项目行、加载统计
// 红线: 不含数据访问逻辑
// ==========================================

pub mod award;
pub mod load_summary;
pub mod project_row;
pub mod source_file;

// 重导出核心类型
pub use award::{Investigator, NihAward};
pub use load_summary::LoadSummary;
pub use project_row::PersistedProject;
pub use source_file::{FileRegistration, SourceFileDescriptor, SourceFileMeta, XmlSourceFile};
