// ==========================================
// NIH ExPORTER 导入系统 - 项目行仓储
// ==========================================
// 职责: nih_project 及两张可选子表的写入与查询
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::{Investigator, NihAward, PersistedProject};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

/// 空字符串落库为 NULL
fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

// ==========================================
// ProjectRepository - 项目行仓储
// ==========================================
pub struct ProjectRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProjectRepository {
    /// 创建新的 ProjectRepository 实例
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

    // ===== 写入（在调用方事务内执行）=====

    /// 插入一条项目行（不含子组）
    ///
    /// # 返回
    /// - Ok(i64): nih_project_id
    /// - Err(UniqueConstraintViolation): 同文件内 application_id 重复
    pub fn insert_award_on(conn: &Connection, award: &NihAward, file_id: i64) -> RepositoryResult<i64> {
        let mut stmt = conn.prepare_cached(
            r#"
            INSERT INTO nih_project (
                application_id, nih_source_file_id, source_file_row_number,
                activity, administering_ic, application_type, arra_funded,
                award_notice_date, budget_start, budget_end, cfda_code,
                core_project_num, ed_inst_type, foa_number, full_project_num,
                funding_ics, funding_mechanism, fy, ic_name,
                nih_spending_cats, org_city, org_country, org_dept,
                org_district, org_duns, org_fips, org_name,
                org_state, org_zipcode, phr, program_officer_name,
                project_start, project_end, project_title, serial_number,
                study_section, study_section_name, subproject_id, suffix,
                support_year, total_cost, total_cost_sub_project
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20,
                ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30,
                ?31, ?32, ?33, ?34, ?35, ?36, ?37, ?38, ?39, ?40,
                ?41, ?42
            )
            "#,
        )?;

        stmt.execute(params![
            award.application_id,
            file_id,
            award.source_file_row_number as i64,
            non_empty(&award.activity),
            non_empty(&award.administering_ic),
            non_empty(&award.application_type),
            non_empty(&award.arra_funded),
            non_empty(&award.award_notice_date),
            non_empty(&award.budget_start),
            non_empty(&award.budget_end),
            non_empty(&award.cfda_code),
            non_empty(&award.core_project_num),
            non_empty(&award.ed_inst_type),
            non_empty(&award.foa_number),
            non_empty(&award.full_project_num),
            non_empty(&award.funding_ics),
            non_empty(&award.funding_mechanism),
            non_empty(&award.fy),
            non_empty(&award.ic_name),
            non_empty(&award.nih_spending_cats),
            non_empty(&award.org_city),
            non_empty(&award.org_country),
            non_empty(&award.org_dept),
            non_empty(&award.org_district),
            non_empty(&award.org_duns),
            non_empty(&award.org_fips),
            non_empty(&award.org_name),
            non_empty(&award.org_state),
            non_empty(&award.org_zipcode),
            non_empty(&award.phr),
            non_empty(&award.program_officer_name),
            non_empty(&award.project_start),
            non_empty(&award.project_end),
            non_empty(&award.project_title),
            non_empty(&award.serial_number),
            non_empty(&award.study_section),
            non_empty(&award.study_section_name),
            non_empty(&award.subproject_id),
            non_empty(&award.suffix),
            non_empty(&award.support_year),
            non_empty(&award.total_cost),
            non_empty(&award.total_cost_sub_project),
        ])?;

        Ok(conn.last_insert_rowid())
    }

    /// 插入关键词子行
    ///
    /// 同一项目内重复的关键词在唯一键上合并，不中断加载
    ///
    /// # 返回
    /// - 实际新增的行数
    pub fn insert_terms_on(conn: &Connection, project_id: i64, terms: &[String]) -> RepositoryResult<usize> {
        let mut stmt = conn.prepare_cached(
            "INSERT OR IGNORE INTO nih_project_term (nih_project_id, term) VALUES (?1, ?2)",
        )?;

        let mut count = 0;
        for term in terms {
            count += stmt.execute(params![project_id, term])?;
        }
        Ok(count)
    }

    /// 插入项目负责人子行
    ///
    /// # 返回
    /// - 实际新增的行数
    pub fn insert_investigators_on(
        conn: &Connection,
        project_id: i64,
        investigators: &[Investigator],
    ) -> RepositoryResult<usize> {
        let mut stmt = conn.prepare_cached(
            r#"
            INSERT OR IGNORE INTO nih_project_investigator (nih_project_id, pi_id, pi_name)
            VALUES (?1, ?2, ?3)
            "#,
        )?;

        let mut count = 0;
        for pi in investigators {
            count += stmt.execute(params![project_id, pi.pi_id, pi.pi_name])?;
        }
        Ok(count)
    }

    // ===== 查询 =====

    /// 统计某文件已落库的项目行数
    pub fn count_by_file(&self, file_id: i64) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM nih_project WHERE nih_source_file_id = ?1",
            params![file_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// 统计项目行总数
    pub fn count_all(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM nih_project", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// 统计当前版本行数
    pub fn count_current(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM nih_project WHERE is_current = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// 查询某 application_id 在所有文件中的行（按文件 ID 升序）
    pub fn find_by_application_id(&self, application_id: &str) -> RepositoryResult<Vec<PersistedProject>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT nih_project_id, application_id, nih_source_file_id,
                   source_file_row_number, is_current, core_project_num, project_title
            FROM nih_project
            WHERE application_id = ?1
            ORDER BY nih_source_file_id ASC
            "#,
        )?;

        let rows = stmt
            .query_map(params![application_id], |row| {
                Ok(PersistedProject {
                    project_id: row.get(0)?,
                    application_id: row.get(1)?,
                    file_id: row.get(2)?,
                    row_number: row.get(3)?,
                    is_current: row.get::<_, i64>(4)? == 1,
                    core_project_num: row.get(5)?,
                    project_title: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// 查询某项目的关键词（按插入顺序）
    pub fn terms_of(&self, project_id: i64) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT term FROM nih_project_term WHERE nih_project_id = ?1 ORDER BY nih_project_term_id",
        )?;
        let terms = stmt
            .query_map(params![project_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(terms)
    }

    /// 查询某项目的负责人（按插入顺序）
    pub fn investigators_of(&self, project_id: i64) -> RepositoryResult<Vec<Investigator>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT pi_id, pi_name
            FROM nih_project_investigator
            WHERE nih_project_id = ?1
            ORDER BY nih_project_investigator_id
            "#,
        )?;
        let pis = stmt
            .query_map(params![project_id], |row| {
                Ok(Investigator {
                    pi_id: row.get(0)?,
                    pi_name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SourceFileMeta;
    use crate::repository::SourceFileRepository;
    use chrono::NaiveDate;

    fn setup() -> (Arc<Mutex<Connection>>, i64) {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::create_tables(&conn, true, true).unwrap();
        let meta = SourceFileMeta {
            name: "fy2012.xml".to_string(),
            date: NaiveDate::from_ymd_opt(2012, 6, 1).unwrap(),
            fiscal_year: 2012,
        };
        let file_id = SourceFileRepository::register_on(&conn, &meta).unwrap().file_id;
        (Arc::new(Mutex::new(conn)), file_id)
    }

    fn award(app_id: &str, row: usize) -> NihAward {
        NihAward {
            application_id: app_id.to_string(),
            source_file_row_number: row,
            core_project_num: "R01CA000001".to_string(),
            total_cost: "250000".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_insert_award_and_children() {
        let (conn, file_id) = setup();
        let repo = ProjectRepository::from_connection(conn.clone());

        let project_id = {
            let c = conn.lock().unwrap();
            let id = ProjectRepository::insert_award_on(&c, &award("1001", 0), file_id).unwrap();
            let terms = vec!["cancer".to_string(), "cancer".to_string(), "cell".to_string()];
            assert_eq!(ProjectRepository::insert_terms_on(&c, id, &terms).unwrap(), 2);
            let pis = vec![Investigator {
                pi_id: "123".to_string(),
                pi_name: "SMITH, JANE".to_string(),
            }];
            assert_eq!(ProjectRepository::insert_investigators_on(&c, id, &pis).unwrap(), 1);
            id
        };

        assert_eq!(repo.count_by_file(file_id).unwrap(), 1);
        assert_eq!(repo.terms_of(project_id).unwrap(), vec!["cancer", "cell"]);
        assert_eq!(repo.investigators_of(project_id).unwrap()[0].pi_name, "SMITH, JANE");

        let rows = repo.find_by_application_id("1001").unwrap();
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].is_current);
        assert_eq!(rows[0].core_project_num.as_deref(), Some("R01CA000001"));
        // 空字段落库为 NULL
        assert_eq!(rows[0].project_title, None);
    }

    #[test]
    fn test_duplicate_application_in_same_file_is_unique_violation() {
        let (conn, file_id) = setup();
        let c = conn.lock().unwrap();

        ProjectRepository::insert_award_on(&c, &award("1001", 0), file_id).unwrap();
        let err = ProjectRepository::insert_award_on(&c, &award("1001", 1), file_id).unwrap_err();

        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
    }
}
