// ==========================================
// NIH ExPORTER 导入系统 - 加载结果统计
// ==========================================

use serde::Serialize;
use std::time::Duration;

/// 一次加载运行的统计
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadSummary {
    pub files_loaded: usize,
    pub files_skipped: usize, // 已完整落库而跳过的文件
    pub rows_inserted: usize,
    pub rows_skipped: usize,
    pub terms_inserted: usize,
    pub investigators_inserted: usize,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl LoadSummary {
    pub fn files_seen(&self) -> usize {
        self.files_loaded + self.files_skipped
    }
}
