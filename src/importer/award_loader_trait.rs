// ==========================================
// NIH ExPORTER 导入系统 - 增量加载 Trait
// ==========================================
// 职责: 定义加载接口（不包含实现）
// ==========================================

use crate::domain::{LoadSummary, NihAward, XmlSourceFile};
use crate::importer::error::ImportResult;

// ==========================================
// AwardLoader Trait
// ==========================================
// 用途: 把记录序列幂等地写入数据库
// 实现者: AwardLoaderImpl
pub trait AwardLoader {
    /// 消费一个按文件顺序排列的记录序列
    ///
    /// # 参数
    /// - awards: 记录序列；每个文件的记录从行号 0 开始且连续
    ///
    /// # 返回
    /// - Ok(LoadSummary): 本次运行统计
    /// - Err: 抽取或落库错误（已提交的文件保留，出错文件回滚）
    ///
    /// # 说明
    /// - 已有落库行的文件整体跳过
    /// - 文件在下一个文件的第 0 行到达或序列结束时提交
    /// - 序列结束后统一重算 precedence_order 与 is_current
    fn load_awards<I>(&self, awards: I) -> ImportResult<LoadSummary>
    where
        I: IntoIterator<Item = ImportResult<NihAward>>;

    /// 按给定顺序抽取并加载一组 XML 文件
    ///
    /// 每个文件读完即提交；后续文件出错（含无法打开）不影响已提交的文件
    fn load_files(&self, files: Vec<XmlSourceFile>) -> ImportResult<LoadSummary>;
}
