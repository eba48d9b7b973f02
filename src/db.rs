// ==========================================
// NIH ExPORTER 导入系统 - SQLite 连接与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 建表幂等（CREATE TABLE IF NOT EXISTS），子表按配置开关创建
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 判断表是否存在
pub fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1 LIMIT 1",
            [table],
            |_row| Ok(true),
        )
        .optional()?;
    Ok(found.unwrap_or(false))
}

/// 创建 NIH 相关表
///
/// # 参数
/// - create_term_table: 是否创建 nih_project_term
/// - create_investigator_table: 是否创建 nih_project_investigator
pub fn create_tables(
    conn: &Connection,
    create_term_table: bool,
    create_investigator_table: bool,
) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS nih_source_file (
            nih_source_file_id INTEGER PRIMARY KEY,
            source_file_name TEXT NOT NULL,
            source_file_date TEXT NOT NULL,
            source_file_fiscal_year INTEGER NOT NULL,
            source_file_precedence_order INTEGER,
            CONSTRAINT nih_source_file_uk1 UNIQUE (source_file_name, source_file_date)
        );

        CREATE TABLE IF NOT EXISTS nih_project (
            nih_project_id INTEGER PRIMARY KEY,
            application_id TEXT NOT NULL,
            is_current INTEGER NOT NULL DEFAULT 0,
            nih_source_file_id INTEGER NOT NULL,
            source_file_row_number INTEGER NOT NULL,
            activity TEXT,
            administering_ic TEXT,
            application_type TEXT,
            arra_funded TEXT,
            award_notice_date TEXT,
            budget_start TEXT,
            budget_end TEXT,
            cfda_code TEXT,
            core_project_num TEXT,
            ed_inst_type TEXT,
            foa_number TEXT,
            full_project_num TEXT,
            funding_ics TEXT,
            funding_mechanism TEXT,
            fy TEXT,
            ic_name TEXT,
            nih_spending_cats TEXT,
            org_city TEXT,
            org_country TEXT,
            org_dept TEXT,
            org_district TEXT,
            org_duns TEXT,
            org_fips TEXT,
            org_name TEXT,
            org_state TEXT,
            org_zipcode TEXT,
            phr TEXT,
            program_officer_name TEXT,
            project_start TEXT,
            project_end TEXT,
            project_title TEXT,
            serial_number TEXT,
            study_section TEXT,
            study_section_name TEXT,
            subproject_id TEXT,
            suffix TEXT,
            support_year TEXT,
            total_cost NUMERIC,
            total_cost_sub_project NUMERIC,
            CONSTRAINT nih_project_uk1 UNIQUE (application_id, nih_source_file_id),
            CONSTRAINT nih_project_is_current_ck CHECK (is_current IN (0, 1)),
            CONSTRAINT nih_project_source_file_fk FOREIGN KEY (nih_source_file_id)
                REFERENCES nih_source_file (nih_source_file_id)
        );

        CREATE INDEX IF NOT EXISTS nih_project_source_file_idx
            ON nih_project (nih_source_file_id);
        "#,
    )?;

    if create_term_table {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS nih_project_term (
                nih_project_term_id INTEGER PRIMARY KEY,
                nih_project_id INTEGER NOT NULL,
                term TEXT NOT NULL,
                CONSTRAINT nih_project_term_uk1 UNIQUE (nih_project_id, term),
                CONSTRAINT nih_project_term_fk1 FOREIGN KEY (nih_project_id)
                    REFERENCES nih_project (nih_project_id)
            );
            "#,
        )?;
    }

    if create_investigator_table {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS nih_project_investigator (
                nih_project_investigator_id INTEGER PRIMARY KEY,
                nih_project_id INTEGER NOT NULL,
                pi_id TEXT NOT NULL,
                pi_name TEXT NOT NULL,
                -- 只有姓名的 PI 的 pi_id 为空，键必须包含 pi_name
                CONSTRAINT nih_project_investigator_uk1 UNIQUE (nih_project_id, pi_id, pi_name),
                CONSTRAINT nih_project_investigator_fk1 FOREIGN KEY (nih_project_id)
                    REFERENCES nih_project (nih_project_id)
            );
            "#,
        )?;
    }

    Ok(())
}
