// ==========================================
// NIH ExPORTER 导入系统 - 流式记录抽取器
// ==========================================
// 职责: 把一个 XML 文件按开/闭标签事件转换为惰性的记录序列
// 约束: 单次、只进、不可重启；内存只与单行子树相关
// 约束: XML 不合法（含截断）时立即终止，出错行不产出，不尝试跳过
// ==========================================

use crate::domain::{Investigator, NihAward, SourceFileMeta, XmlSourceFile};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::{FieldMapper, TagKind};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use tracing::{debug, error, info, warn};

/// 文件读缓冲（1MB）
const READ_BUFFER_CAPACITY: usize = 1024 * 1024;

/// 抽取器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    Scanning,
    /// 正常读到文件末尾
    Exhausted,
    /// 遇到致命解析错误后终止
    Failed,
}

// ==========================================
// AwardBuilder - 构建中的记录 + 本行的 PI 暂存区
// ==========================================
struct AwardBuilder {
    award: NihAward,
    pi_name: String,
    pi_id: String,
}

impl AwardBuilder {
    fn new(meta: &SourceFileMeta, row_number: usize) -> Self {
        Self {
            award: NihAward::new(meta, row_number),
            pi_name: String::new(),
            pi_id: String::new(),
        }
    }

    fn reset_investigator(&mut self) {
        self.pi_name.clear();
        self.pi_id.clear();
    }

    /// PI 组结束：任一暂存字段非空即追加
    fn close_investigator(&mut self) {
        if !self.pi_name.is_empty() || !self.pi_id.is_empty() {
            self.award.investigators.push(Investigator {
                pi_id: std::mem::take(&mut self.pi_id),
                pi_name: std::mem::take(&mut self.pi_name),
            });
        }
    }

    /// 叶子标签结束（text 已确认非空）
    fn apply_leaf(&mut self, kind: TagKind, text: String) {
        match kind {
            TagKind::Term => self.award.terms.push(text),
            TagKind::InvestigatorName => self.pi_name = text,
            TagKind::InvestigatorId => self.pi_id = text,
            TagKind::Scalar(field) => field.assign(&mut self.award, text),
            _ => {}
        }
    }
}

// ==========================================
// AwardReader - 单文件记录抽取器
// ==========================================
pub struct AwardReader<R: BufRead> {
    reader: Reader<R>,
    meta: SourceFileMeta,
    /// 当前元素已累积的文本
    text: String,
    /// 已完成的行数（= 下一行的行号）
    row_number: usize,
    /// 当前打开的元素层数
    depth: usize,
    /// 是否见过根元素
    saw_root: bool,
    state: ReaderState,
    /// 已提示过的未知标签
    unknown_tags: HashSet<String>,
}

impl AwardReader<BufReader<File>> {
    /// 打开一个已解压的 XML 文件
    pub fn open(file: &XmlSourceFile) -> ImportResult<Self> {
        let path = &file.path;
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }

        let handle = File::open(path).map_err(|e| ImportError::FileReadError {
            file: path.display().to_string(),
            message: e.to_string(),
        })?;

        info!(file = %file.meta, path = %path.display(), "开始处理文件");
        let buf_reader = BufReader::with_capacity(READ_BUFFER_CAPACITY, handle);
        Ok(Self::from_reader(buf_reader, file.meta.clone()))
    }
}

impl<R: BufRead> AwardReader<R> {
    /// 从任意字节流创建抽取器
    pub fn from_reader(reader: R, meta: SourceFileMeta) -> Self {
        Self {
            reader: Reader::from_reader(reader),
            meta,
            text: String::new(),
            row_number: 0,
            depth: 0,
            saw_root: false,
            state: ReaderState::Scanning,
            unknown_tags: HashSet::new(),
        }
    }

    pub fn meta(&self) -> &SourceFileMeta {
        &self.meta
    }

    /// 已产出的记录数
    pub fn rows_read(&self) -> usize {
        self.row_number
    }

    /// 是否已到终止状态（读完或出错）
    pub fn is_finished(&self) -> bool {
        self.state != ReaderState::Scanning
    }

    fn malformed(&self, message: impl Into<String>) -> ImportError {
        ImportError::MalformedInput {
            file: self.meta.name.clone(),
            row: self.row_number,
            position: self.reader.buffer_position() as u64,
            message: message.into(),
        }
    }

    /// 扫描到下一条完整记录
    ///
    /// # 返回
    /// - Ok(Some): 行结束标签已出现，记录完整
    /// - Ok(None): 文件正常结束
    /// - Err(MalformedInput): XML 不合法
    fn read_next(&mut self) -> ImportResult<Option<NihAward>> {
        let mut buf = Vec::with_capacity(8192);
        let mut current: Option<AwardBuilder> = None;

        loop {
            buf.clear();
            let event = match self.reader.read_event_into(&mut buf) {
                Ok(event) => event,
                Err(e) => {
                    let message = e.to_string();
                    return Err(self.malformed(message));
                }
            };

            match event {
                Event::Start(ref e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    self.text.clear();
                    self.depth += 1;
                    self.saw_root = true;

                    match FieldMapper::classify(&name) {
                        TagKind::Row => {
                            if current.is_some() {
                                warn!(file = %self.meta.name, row = self.row_number, "行边界嵌套，丢弃未完成的行");
                            }
                            current = Some(AwardBuilder::new(&self.meta, self.row_number));
                        }
                        TagKind::InvestigatorGroup => {
                            if let Some(builder) = current.as_mut() {
                                builder.reset_investigator();
                            }
                        }
                        _ => {}
                    }
                }
                Event::Empty(ref e) => {
                    // <row/> 视为一条空记录；其余自闭合标签没有文本，忽略
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    self.text.clear();
                    self.saw_root = true;

                    if FieldMapper::classify(&name) == TagKind::Row {
                        let award = NihAward::new(&self.meta, self.row_number);
                        self.row_number += 1;
                        return Ok(Some(award));
                    }
                }
                Event::Text(ref e) => {
                    if current.is_some() {
                        match e.unescape() {
                            Ok(text) => self.text.push_str(&text),
                            Err(err) => {
                                let message = err.to_string();
                                return Err(self.malformed(message));
                            }
                        }
                    }
                }
                Event::CData(ref e) => {
                    if current.is_some() {
                        match String::from_utf8(e.to_vec()) {
                            Ok(text) => self.text.push_str(&text),
                            Err(err) => {
                                let message = err.to_string();
                                return Err(self.malformed(message));
                            }
                        }
                    }
                }
                Event::End(ref e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    let text = std::mem::take(&mut self.text);
                    let kind = FieldMapper::classify(&name);
                    self.depth = self.depth.saturating_sub(1);

                    let Some(builder) = current.as_mut() else {
                        continue;
                    };

                    match kind {
                        TagKind::Row => {
                            if let Some(done) = current.take() {
                                self.row_number += 1;
                                return Ok(Some(done.award));
                            }
                        }
                        TagKind::InvestigatorGroup => builder.close_investigator(),
                        _ if text.is_empty() => {}
                        TagKind::Unknown => {
                            if self.unknown_tags.insert(name.clone()) {
                                debug!(file = %self.meta.name, tag = %name, "未映射的标签，忽略");
                            }
                        }
                        other => builder.apply_leaf(other, text),
                    }
                }
                Event::Eof => {
                    if current.is_some() {
                        return Err(self.malformed("文件在行中途结束"));
                    }
                    // 行与行之间被截断的文件同样不合法
                    if self.depth > 0 {
                        let message = format!("文件结束时仍有 {} 层元素未闭合", self.depth);
                        return Err(self.malformed(message));
                    }
                    if !self.saw_root {
                        return Err(self.malformed("文件中没有任何元素"));
                    }
                    return Ok(None);
                }
                // 声明、注释、处理指令、DOCTYPE
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for AwardReader<R> {
    type Item = ImportResult<NihAward>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != ReaderState::Scanning {
            return None;
        }

        match self.read_next() {
            Ok(Some(award)) => Some(Ok(award)),
            Ok(None) => {
                self.state = ReaderState::Exhausted;
                info!(file = %self.meta.name, total_rows = self.row_number, "文件处理完成");
                None
            }
            Err(e) => {
                self.state = ReaderState::Failed;
                error!(file = %self.meta.name, row = self.row_number, error = %e, "XML 解析失败，终止抽取");
                Some(Err(e))
            }
        }
    }
}
