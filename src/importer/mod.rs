// ==========================================
// NIH ExPORTER 导入系统 - 导入层
// ==========================================
// 职责: XML 流式抽取 + 幂等增量落库
// 流程: 文件清单 → 抽取记录 → 文件登记/跳过 → 落库 → 重算当前版本
// ==========================================

// 模块声明
pub mod award_loader;
pub mod award_loader_trait;
pub mod award_reader;
pub mod error;
pub mod field_mapper;

// 重导出核心类型
pub use award_loader::{AwardLoaderImpl, LoadOptions};
pub use award_reader::AwardReader;
pub use error::{ImportError, ImportResult};
pub use field_mapper::{FieldMapper, ScalarField, TagKind};

// 重导出 Trait 接口
pub use award_loader_trait::AwardLoader;
