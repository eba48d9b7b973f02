// ==========================================
// NIH ExPORTER 导入系统 - 增量加载协调器
// ==========================================
// 职责: 消费记录序列 → 文件登记 → 跳过/落库 → 统一重算派生状态
// 约束: 每个文件一个事务（登记 + 全部行），文件读完即提交
// 约束: 失败只回滚当前文件；重跑同一批文件不产生任何新行
// ==========================================

use crate::config::{FileManifest, LoaderConfig};
use crate::db;
use crate::domain::{LoadSummary, NihAward, SourceFileMeta, XmlSourceFile};
use crate::importer::award_loader_trait::AwardLoader;
use crate::importer::award_reader::AwardReader;
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::{
    ProjectRepository, RepositoryError, RepositoryResult, SourceFileRepository,
};
use rusqlite::{Connection, Transaction};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, error, info, instrument};

// ==========================================
// LoadOptions - 子表开关
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub store_terms: bool,
    pub store_investigators: bool,
}

impl From<&LoaderConfig> for LoadOptions {
    fn from(config: &LoaderConfig) -> Self {
        Self {
            store_terms: config.store_terms,
            store_investigators: config.store_investigators,
        }
    }
}

/// 协调器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    /// 没有打开的文件（运行开始或上一个文件已提交）
    Idle,
    Loading { file_id: i64 },
    /// 文件已有落库行，丢弃其记录
    Skipping { file_id: i64 },
}

/// 当前文件的进度
struct FileProgress {
    meta: SourceFileMeta,
    rows: usize,
}

// ==========================================
// LoadRun - 一次运行内的状态机
// ==========================================
// 持有连接借用、当前文件事务与累计统计；丢弃即回滚未提交的文件
struct LoadRun<'c> {
    conn: &'c Connection,
    options: LoadOptions,
    state: LoadState,
    tx: Option<Transaction<'c>>,
    progress: Option<FileProgress>,
    summary: LoadSummary,
}

impl<'c> LoadRun<'c> {
    fn new(conn: &'c Connection, options: LoadOptions) -> Self {
        Self {
            conn,
            options,
            state: LoadState::Idle,
            tx: None,
            progress: None,
            summary: LoadSummary::default(),
        }
    }

    /// 消费一段记录序列（不提交）
    fn drain<I>(&mut self, awards: I) -> ImportResult<()>
    where
        I: IntoIterator<Item = ImportResult<NihAward>>,
    {
        for item in awards {
            self.accept(item?)?;
        }
        Ok(())
    }

    /// 处理一条记录；行号 0 表示新文件开始
    fn accept(&mut self, award: NihAward) -> ImportResult<()> {
        if award.is_first_row() {
            self.commit_file()?;
            self.begin_file(&award)?;
        }

        match self.state {
            LoadState::Idle => {
                return Err(ImportError::InternalError(format!(
                    "记录序列未以行号 0 开始: {} 行 {}",
                    award.source_file_name, award.source_file_row_number
                )));
            }
            LoadState::Skipping { .. } => self.summary.rows_skipped += 1,
            LoadState::Loading { file_id } => {
                let tx = self
                    .tx
                    .as_ref()
                    .ok_or_else(|| ImportError::InternalError("加载状态下没有活动事务".to_string()))?;

                persist_award(tx, self.options, &award, file_id, &mut self.summary)
                    .map_err(|e| persistence_error(&award, e))?;
            }
        }

        if let Some(progress) = self.progress.as_mut() {
            progress.rows += 1;
        }
        Ok(())
    }

    /// 开启文件事务，登记并决定加载或跳过
    fn begin_file(&mut self, first: &NihAward) -> ImportResult<()> {
        let meta = SourceFileMeta {
            name: first.source_file_name.clone(),
            date: first.source_file_date,
            fiscal_year: first.source_fiscal_year,
        };

        let conn: &'c Connection = self.conn;
        let tx = conn.unchecked_transaction()?;
        let state = decide_file(&tx, &meta, &mut self.summary).map_err(|e| persistence_error(first, e))?;

        self.state = state;
        self.tx = Some(tx);
        self.progress = Some(FileProgress { meta, rows: 0 });
        Ok(())
    }

    /// 提交当前文件（若有）并回到 Idle
    fn commit_file(&mut self) -> ImportResult<()> {
        let Some(tx) = self.tx.take() else {
            return Ok(());
        };
        tx.commit()?;

        if let Some(progress) = self.progress.take() {
            match self.state {
                LoadState::Loading { file_id } => {
                    info!(file = %progress.meta, file_id = file_id, rows = progress.rows, "文件落库完成")
                }
                LoadState::Skipping { file_id } => {
                    debug!(file = %progress.meta, file_id = file_id, rows = progress.rows, "跳过文件结束")
                }
                LoadState::Idle => {}
            }
        }
        self.state = LoadState::Idle;
        Ok(())
    }

    fn log_abort(&self, err: &ImportError) {
        let file = self
            .progress
            .as_ref()
            .map(|p| p.meta.name.as_str())
            .or_else(|| err.file_name())
            .unwrap_or("-");
        let rows_done = self.progress.as_ref().map(|p| p.rows).unwrap_or(0);
        error!(file = file, rows_done = rows_done, error = %err, "加载终止，回滚当前文件");
    }

    fn finish(self) -> LoadSummary {
        self.summary
    }
}

/// 登记文件；已登记且已有行的文件跳过
fn decide_file(tx: &Connection, meta: &SourceFileMeta, summary: &mut LoadSummary) -> RepositoryResult<LoadState> {
    let registration = SourceFileRepository::register_on(tx, meta)?;

    // 新登记的文件不可能已有行
    let already_loaded =
        !registration.created && SourceFileRepository::has_any_persisted_rows_on(tx, registration.file_id)?;

    if already_loaded {
        summary.files_skipped += 1;
        info!(file = %meta, file_id = registration.file_id, "文件已加载，跳过");
        Ok(LoadState::Skipping {
            file_id: registration.file_id,
        })
    } else {
        summary.files_loaded += 1;
        info!(
            file = %meta,
            file_id = registration.file_id,
            newly_registered = registration.created,
            "开始加载文件"
        );
        Ok(LoadState::Loading {
            file_id: registration.file_id,
        })
    }
}

/// 落库一条记录及其子组
fn persist_award(
    conn: &Connection,
    options: LoadOptions,
    award: &NihAward,
    file_id: i64,
    summary: &mut LoadSummary,
) -> RepositoryResult<()> {
    let project_id = ProjectRepository::insert_award_on(conn, award, file_id)?;
    summary.rows_inserted += 1;

    if options.store_terms {
        summary.terms_inserted += ProjectRepository::insert_terms_on(conn, project_id, &award.terms)?;
    }
    if options.store_investigators {
        summary.investigators_inserted +=
            ProjectRepository::insert_investigators_on(conn, project_id, &award.investigators)?;
    }
    Ok(())
}

fn persistence_error(award: &NihAward, source: RepositoryError) -> ImportError {
    ImportError::Persistence {
        file_name: award.source_file_name.clone(),
        file_date: award.source_file_date,
        row: award.source_file_row_number,
        source,
    }
}

// ==========================================
// AwardLoaderImpl - 增量加载协调器实现
// ==========================================
pub struct AwardLoaderImpl {
    conn: Arc<Mutex<Connection>>,
    options: LoadOptions,
}

impl AwardLoaderImpl {
    /// 打开数据库并确保表结构存在
    pub fn new(db_path: &str, options: LoadOptions) -> ImportResult<Self> {
        let conn = db::open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)), options)
    }

    /// 从已有连接创建（同样确保表结构存在）
    pub fn from_connection(conn: Arc<Mutex<Connection>>, options: LoadOptions) -> ImportResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            db::create_tables(&guard, options.store_terms, options.store_investigators)?;
        }
        Ok(Self { conn, options })
    }

    pub fn from_config(config: &LoaderConfig) -> ImportResult<Self> {
        Self::new(&config.db_path, LoadOptions::from(config))
    }

    pub fn options(&self) -> LoadOptions {
        self.options
    }

    /// 共享连接（供查询类仓储使用）
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    fn get_conn(&self) -> ImportResult<MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| ImportError::from(RepositoryError::LockError(e.to_string())))
    }

    /// 在一次运行内执行 body，结束后统一重算派生状态
    ///
    /// body 出错时当前文件回滚，已提交的文件保留，不做重算
    fn execute<F>(&self, body: F) -> ImportResult<LoadSummary>
    where
        F: FnOnce(&mut LoadRun<'_>) -> ImportResult<()>,
    {
        let started = Instant::now();

        let mut summary = {
            let conn = self.get_conn()?;
            let mut run = LoadRun::new(&conn, self.options);
            if let Err(e) = body(&mut run) {
                run.log_abort(&e);
                return Err(e);
            }
            run.commit_file()?;
            run.finish()
        };

        // 全部文件结束后一次性重算
        SourceFileRepository::from_connection(self.conn.clone()).recompute_all()?;

        summary.elapsed = started.elapsed();
        info!(
            files_loaded = summary.files_loaded,
            files_skipped = summary.files_skipped,
            rows_inserted = summary.rows_inserted,
            rows_skipped = summary.rows_skipped,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "加载完成"
        );
        Ok(summary)
    }

    /// 按配置与文件清单加载一个财年范围
    ///
    /// 配置错误在任何 I/O 之前返回
    #[instrument(skip(config, manifest), fields(db_path = %config.db_path))]
    pub fn load_fiscal_year_range(config: &LoaderConfig, manifest: &FileManifest) -> ImportResult<LoadSummary> {
        let range = config.fiscal_year_range()?;
        let files = manifest.select(&range)?;
        info!(
            fy_start = range.start,
            fy_stop = range.stop,
            files = files.len(),
            "开始加载财年范围"
        );

        let loader = Self::from_config(config)?;
        loader.load_files(files)
    }
}

impl AwardLoader for AwardLoaderImpl {
    #[instrument(skip(self, awards), fields(store_terms = self.options.store_terms, store_investigators = self.options.store_investigators))]
    fn load_awards<I>(&self, awards: I) -> ImportResult<LoadSummary>
    where
        I: IntoIterator<Item = ImportResult<NihAward>>,
    {
        self.execute(|run| run.drain(awards))
    }

    #[instrument(skip(self, files), fields(files = files.len()))]
    fn load_files(&self, files: Vec<XmlSourceFile>) -> ImportResult<LoadSummary> {
        self.execute(|run| {
            for file in &files {
                let reader = AwardReader::open(file)?;
                run.drain(reader)?;
                // 读完即提交，后续文件出错不影响本文件
                run.commit_file()?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn loader(options: LoadOptions) -> AwardLoaderImpl {
        let conn = Connection::open_in_memory().unwrap();
        db::configure_sqlite_connection(&conn).unwrap();
        AwardLoaderImpl::from_connection(Arc::new(Mutex::new(conn)), options).unwrap()
    }

    fn meta(name: &str, y: i32, m: u32, d: u32, fy: i32) -> SourceFileMeta {
        SourceFileMeta {
            name: name.to_string(),
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            fiscal_year: fy,
        }
    }

    fn rows(meta: &SourceFileMeta, app_ids: &[&str]) -> Vec<ImportResult<NihAward>> {
        let mut xml = String::from("<PROJECTS>");
        for id in app_ids {
            xml.push_str(&format!(
                "<row><APPLICATION_ID>{id}</APPLICATION_ID><PROJECT_TERMSX><TERM>cancer</TERM></PROJECT_TERMSX></row>"
            ));
        }
        xml.push_str("</PROJECTS>");
        AwardReader::from_reader(xml.as_bytes(), meta.clone()).collect()
    }

    #[test]
    fn test_second_run_skips_loaded_file() {
        let loader = loader(LoadOptions::default());
        let m = meta("a.xml", 2012, 6, 1, 2012);

        let first = loader.load_awards(rows(&m, &["1", "2"])).unwrap();
        assert_eq!(first.files_loaded, 1);
        assert_eq!(first.rows_inserted, 2);

        let second = loader.load_awards(rows(&m, &["1", "2"])).unwrap();
        assert_eq!(second.files_loaded, 0);
        assert_eq!(second.files_skipped, 1);
        assert_eq!(second.rows_inserted, 0);
        assert_eq!(second.rows_skipped, 2);
    }

    #[test]
    fn test_registered_file_without_rows_is_loaded() {
        let loader = loader(LoadOptions::default());
        let m = meta("a.xml", 2012, 6, 1, 2012);

        let registry = SourceFileRepository::from_connection(loader.connection());
        let registration = registry.register(&m).unwrap();
        assert!(registration.created);

        let summary = loader.load_awards(rows(&m, &["1"])).unwrap();
        assert_eq!(summary.files_loaded, 1);
        assert_eq!(summary.files_skipped, 0);
        assert_eq!(summary.rows_inserted, 1);
        assert_eq!(registry.find_id(&m.name, m.date).unwrap(), Some(registration.file_id));
    }

    #[test]
    fn test_children_gated_by_options() {
        let without = loader(LoadOptions::default());
        let summary = without.load_awards(rows(&meta("a.xml", 2012, 6, 1, 2012), &["1"])).unwrap();
        assert_eq!(summary.terms_inserted, 0);

        let with = loader(LoadOptions {
            store_terms: true,
            store_investigators: true,
        });
        let summary = with.load_awards(rows(&meta("a.xml", 2012, 6, 1, 2012), &["1"])).unwrap();
        assert_eq!(summary.terms_inserted, 1);
    }

    #[test]
    fn test_persistence_failure_rolls_back_file() {
        let loader = loader(LoadOptions::default());
        let m = meta("dup.xml", 2012, 6, 1, 2012);

        let err = loader.load_awards(rows(&m, &["7", "7"])).unwrap_err();
        match err {
            ImportError::Persistence { file_name, row, source, .. } => {
                assert_eq!(file_name, "dup.xml");
                assert_eq!(row, 1);
                assert!(matches!(source, RepositoryError::UniqueConstraintViolation(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // 登记与首行一并回滚
        let registry = SourceFileRepository::from_connection(loader.connection());
        assert!(registry.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_sequence_not_starting_at_row_zero_is_rejected() {
        let loader = loader(LoadOptions::default());
        let m = meta("a.xml", 2012, 6, 1, 2012);
        let award = NihAward {
            application_id: "1".to_string(),
            ..NihAward::new(&m, 3)
        };

        let err = loader.load_awards(vec![Ok(award)]).unwrap_err();
        assert!(matches!(err, ImportError::InternalError(_)));
    }
}
