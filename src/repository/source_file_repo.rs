// ==========================================
// NIH ExPORTER 导入系统 - 源文件登记仓储
// ==========================================
// 职责: nih_source_file 登记（幂等）、已加载判断、
//       precedence_order 与 is_current 的全量重算
// 约束: precedence_order / is_current 为派生状态，只能整体重算
// ==========================================

use crate::domain::{FileRegistration, SourceFileDescriptor, SourceFileMeta};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

// ==========================================
// SourceFileRepository - 源文件登记仓储
// ==========================================
/// 带 `_on` 后缀的关联函数在调用方给定的连接/事务上执行，
/// 供加载协调器在单文件事务内复用
pub struct SourceFileRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SourceFileRepository {
    /// 创建新的 SourceFileRepository 实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = crate::db::open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ===== 登记 =====

    /// 登记源文件（按 (name, date) 幂等）
    pub fn register(&self, meta: &SourceFileMeta) -> RepositoryResult<FileRegistration> {
        let conn = self.get_conn()?;
        Self::register_on(&conn, meta)
    }

    /// 在给定连接上登记源文件
    ///
    /// 唯一约束冲突不是错误：说明文件已登记，返回已有 ID
    pub fn register_on(conn: &Connection, meta: &SourceFileMeta) -> RepositoryResult<FileRegistration> {
        let inserted = conn
            .execute(
                r#"
                INSERT INTO nih_source_file (
                    source_file_name, source_file_date, source_file_fiscal_year
                ) VALUES (?1, ?2, ?3)
                "#,
                params![meta.name, meta.date, meta.fiscal_year],
            )
            .map_err(RepositoryError::from);

        match inserted {
            Ok(_) => Ok(FileRegistration {
                file_id: conn.last_insert_rowid(),
                created: true,
            }),
            Err(RepositoryError::UniqueConstraintViolation(msg)) => {
                debug!(file = %meta, reason = %msg, "源文件已登记，复用已有 ID");
                let file_id = Self::find_id_on(conn, &meta.name, meta.date)?.ok_or_else(|| {
                    RepositoryError::NotFound {
                        entity: "nih_source_file".to_string(),
                        id: format!("{}@{}", meta.name, meta.date),
                    }
                })?;
                Ok(FileRegistration {
                    file_id,
                    created: false,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// 按 (name, date) 查找文件 ID
    pub fn find_id(&self, name: &str, date: NaiveDate) -> RepositoryResult<Option<i64>> {
        let conn = self.get_conn()?;
        Self::find_id_on(&conn, name, date)
    }

    pub fn find_id_on(conn: &Connection, name: &str, date: NaiveDate) -> RepositoryResult<Option<i64>> {
        let id = conn
            .query_row(
                r#"
                SELECT nih_source_file_id
                FROM nih_source_file
                WHERE source_file_name = ?1 AND source_file_date = ?2
                "#,
                params![name, date],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    // ===== 已加载判断 =====

    /// 该文件是否已有任意一条项目行落库
    ///
    /// 有 ≥1 行即视为“整文件已加载”；0 行视为未加载，需重试
    pub fn has_any_persisted_rows(&self, file_id: i64) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        Self::has_any_persisted_rows_on(&conn, file_id)
    }

    pub fn has_any_persisted_rows_on(conn: &Connection, file_id: i64) -> RepositoryResult<bool> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM nih_project WHERE nih_source_file_id = ?1)",
            params![file_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    // ===== 派生状态重算 =====

    /// 重算所有文件的 precedence_order（单独事务）
    pub fn recompute_precedence(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let count = Self::recompute_precedence_on(&tx)?;
        tx.commit()?;
        Ok(count)
    }

    /// 按 (fiscal_year DESC, date DESC) 全量排序并赋值 1..N
    ///
    /// 同财年同日期时按文件名、再按 ID 升序，保证全序
    pub fn recompute_precedence_on(conn: &Connection) -> RepositoryResult<usize> {
        let ordered_ids: Vec<i64> = {
            let mut stmt = conn.prepare(
                r#"
                SELECT nih_source_file_id
                FROM nih_source_file
                ORDER BY source_file_fiscal_year DESC,
                         source_file_date DESC,
                         source_file_name ASC,
                         nih_source_file_id ASC
                "#,
            )?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };

        let mut update = conn.prepare(
            r#"
            UPDATE nih_source_file
            SET    source_file_precedence_order = ?1
            WHERE  nih_source_file_id = ?2
            "#,
        )?;

        for (idx, file_id) in ordered_ids.iter().enumerate() {
            update.execute(params![(idx + 1) as i64, file_id])?;
        }

        debug!(files = ordered_ids.len(), "precedence_order 重算完成");
        Ok(ordered_ids.len())
    }

    /// 重算所有项目行的 is_current（单独事务）
    pub fn recompute_current_flags(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let count = Self::recompute_current_flags_on(&tx)?;
        tx.commit()?;
        Ok(count)
    }

    /// 每个 application_id 取 precedence_order 最小的文件中的那一行置 1，其余置 0
    ///
    /// 前置条件: precedence_order 已是最新
    ///
    /// # 返回
    /// - 被置为当前版本的行数（= 不同 application_id 的个数）
    pub fn recompute_current_flags_on(conn: &Connection) -> RepositoryResult<usize> {
        conn.execute(
            "UPDATE nih_project SET is_current = 0 WHERE is_current <> 0",
            [],
        )?;

        let current = conn.execute(
            r#"
            UPDATE nih_project
            SET    is_current = 1
            WHERE  nih_project_id IN (
                    SELECT  np.nih_project_id
                    FROM    nih_project np
                            JOIN nih_source_file nsf
                                ON np.nih_source_file_id = nsf.nih_source_file_id
                            JOIN (
                                SELECT  p.application_id,
                                        MIN(f.source_file_precedence_order) AS min_order
                                FROM    nih_project p
                                        JOIN nih_source_file f
                                            ON p.nih_source_file_id = f.nih_source_file_id
                                GROUP BY p.application_id
                            ) latest
                                ON np.application_id = latest.application_id
                                AND nsf.source_file_precedence_order = latest.min_order
                    )
            "#,
            [],
        )?;

        debug!(current_rows = current, "is_current 重算完成");
        Ok(current)
    }

    /// 先重算 precedence_order 再重算 is_current（同一事务）
    pub fn recompute_all(&self) -> RepositoryResult<(usize, usize)> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let files = Self::recompute_precedence_on(&tx)?;
        let current = Self::recompute_current_flags_on(&tx)?;
        tx.commit()?;
        info!(files = files, current_rows = current, "派生状态重算完成");
        Ok((files, current))
    }

    // ===== 查询 =====

    /// 按 precedence_order 列出全部已登记文件（未排序的排最后）
    pub fn list_all(&self) -> RepositoryResult<Vec<SourceFileDescriptor>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT nih_source_file_id, source_file_name, source_file_date,
                   source_file_fiscal_year, source_file_precedence_order
            FROM nih_source_file
            ORDER BY source_file_precedence_order IS NULL,
                     source_file_precedence_order ASC,
                     nih_source_file_id ASC
            "#,
        )?;

        let files = stmt
            .query_map([], |row| {
                Ok(SourceFileDescriptor {
                    file_id: row.get(0)?,
                    name: row.get(1)?,
                    date: row.get(2)?,
                    fiscal_year: row.get(3)?,
                    precedence_order: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> SourceFileRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::create_tables(&conn, false, false).unwrap();
        SourceFileRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn meta(name: &str, date: (i32, u32, u32), fy: i32) -> SourceFileMeta {
        SourceFileMeta {
            name: name.to_string(),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            fiscal_year: fy,
        }
    }

    #[test]
    fn test_register_is_idempotent() {
        let repo = setup();
        let m = meta("fy2012.xml", (2012, 6, 1), 2012);

        let first = repo.register(&m).unwrap();
        let second = repo.register(&m).unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.file_id, second.file_id);
        assert_eq!(repo.list_all().unwrap().len(), 1);
        assert_eq!(repo.list_all().unwrap()[0].precedence_order, None);
    }

    #[test]
    fn test_same_name_different_date_is_new_file() {
        let repo = setup();
        let a = repo.register(&meta("weekly.xml", (2013, 1, 5), 2013)).unwrap();
        let b = repo.register(&meta("weekly.xml", (2013, 1, 12), 2013)).unwrap();

        assert!(a.created && b.created);
        assert_ne!(a.file_id, b.file_id);
    }

    #[test]
    fn test_fresh_file_has_no_rows() {
        let repo = setup();
        let reg = repo.register(&meta("a.xml", (2012, 6, 1), 2012)).unwrap();
        assert!(!repo.has_any_persisted_rows(reg.file_id).unwrap());
    }

    #[test]
    fn test_precedence_orders_by_fiscal_year_then_date() {
        let repo = setup();
        // 日期更晚但财年更早的文件不得排在前面
        let old_fy_late_date = repo.register(&meta("fy2011.xml", (2013, 1, 1), 2011)).unwrap();
        let fy2012_june = repo.register(&meta("fy2012a.xml", (2012, 6, 1), 2012)).unwrap();
        let fy2012_sept = repo.register(&meta("fy2012b.xml", (2012, 9, 1), 2012)).unwrap();
        let fy2012_dec_prev_year = repo.register(&meta("fy2012c.xml", (2011, 12, 1), 2012)).unwrap();

        assert_eq!(repo.recompute_precedence().unwrap(), 4);

        let order: Vec<i64> = repo.list_all().unwrap().iter().map(|f| f.file_id).collect();
        assert_eq!(
            order,
            vec![
                fy2012_sept.file_id,
                fy2012_june.file_id,
                fy2012_dec_prev_year.file_id,
                old_fy_late_date.file_id
            ]
        );
        let precedences: Vec<Option<i64>> =
            repo.list_all().unwrap().iter().map(|f| f.precedence_order).collect();
        assert_eq!(precedences, vec![Some(1), Some(2), Some(3), Some(4)]);
    }

    #[test]
    fn test_precedence_tie_broken_by_name() {
        let repo = setup();
        let b = repo.register(&meta("b.xml", (2012, 6, 1), 2012)).unwrap();
        let a = repo.register(&meta("a.xml", (2012, 6, 1), 2012)).unwrap();

        repo.recompute_precedence().unwrap();

        let files = repo.list_all().unwrap();
        assert_eq!(files[0].file_id, a.file_id);
        assert_eq!(files[1].file_id, b.file_id);
    }
}
