// ==========================================
// NIH ExPORTER 导入系统 - 加载配置
// ==========================================
// 职责: 加载选项（落库目标、子表开关、财年范围）
// 来源: JSON 文件 → 环境变量覆写 → 校验
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 环境变量名
pub mod env_keys {
    pub const DB_PATH: &str = "NIH_LOADER_DB_PATH";
    pub const STORE_TERMS: &str = "NIH_LOADER_STORE_TERMS";
    pub const STORE_INVESTIGATORS: &str = "NIH_LOADER_STORE_INVESTIGATORS";
    pub const FY_START: &str = "NIH_LOADER_FY_START";
    pub const FY_STOP: &str = "NIH_LOADER_FY_STOP";
}

/// ExPORTER 最早提供数据的财年
pub const EARLIEST_FISCAL_YEAR: i32 = 1985;

const DEFAULT_DB_FILE_NAME: &str = "nih_database.db";

fn is_true(v: &str) -> bool {
    matches!(
        v.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

// ==========================================
// FiscalYearRange - 已校验的财年闭区间
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalYearRange {
    pub start: i32,
    pub stop: i32,
}

impl FiscalYearRange {
    /// 解析并校验财年范围
    ///
    /// # 规则
    /// - 每个边界必须是 19xx/20xx（允许首尾空白）
    /// - stop 缺省时等于 start
    /// - start <= stop
    pub fn parse(start: &str, stop: Option<&str>) -> ConfigResult<Self> {
        let start_year = parse_fiscal_year("fiscal_year_start", start)?;
        let stop_year = match stop {
            Some(s) => parse_fiscal_year("fiscal_year_stop", s)?,
            None => start_year,
        };

        if start_year > stop_year {
            return Err(ConfigError::FiscalYearRangeOrder {
                start: start_year,
                stop: stop_year,
            });
        }

        Ok(Self {
            start: start_year,
            stop: stop_year,
        })
    }

    pub fn contains(&self, fiscal_year: i32) -> bool {
        fiscal_year >= self.start && fiscal_year <= self.stop
    }
}

/// 校验单个财年字符串（4 位，19xx 或 20xx）
pub fn parse_fiscal_year(field: &str, raw: &str) -> ConfigResult<i32> {
    let value = raw.trim();
    let looks_like_year = value.len() == 4
        && value.chars().all(|c| c.is_ascii_digit())
        && (value.starts_with("19") || value.starts_with("20"));

    if !looks_like_year {
        return Err(ConfigError::InvalidFiscalYear {
            field: field.to_string(),
            value: raw.to_string(),
        });
    }

    value.parse::<i32>().map_err(|_| ConfigError::InvalidFiscalYear {
        field: field.to_string(),
        value: raw.to_string(),
    })
}

/// 默认数据库路径
///
/// 顺序: NIH_LOADER_DB_PATH → 用户数据目录 → 当前目录
pub fn default_db_path() -> String {
    if let Ok(path) = std::env::var(env_keys::DB_PATH) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from(".").join(DEFAULT_DB_FILE_NAME);
    if let Some(data_dir) = dirs::data_dir() {
        let app_dir = data_dir.join("nih-exporter-loader");
        if std::fs::create_dir_all(&app_dir).is_ok() {
            path = app_dir.join(DEFAULT_DB_FILE_NAME);
        }
    }

    path.to_string_lossy().to_string()
}

// ==========================================
// LoaderConfig - 加载配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawLoaderConfig")]
pub struct LoaderConfig {
    /// SQLite 数据库文件路径
    pub db_path: String,
    /// 是否写入 nih_project_term 子表
    pub store_terms: bool,
    /// 是否写入 nih_project_investigator 子表
    pub store_investigators: bool,
    pub fiscal_year_start: String,
    pub fiscal_year_stop: Option<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        RawLoaderConfig::default().into()
    }
}

/// 配置文件的原始形态（所有字段可缺省）
#[derive(Debug, Default, Deserialize)]
struct RawLoaderConfig {
    db_path: Option<String>,
    store_terms: Option<bool>,
    store_investigators: Option<bool>,
    fiscal_year_start: Option<String>,
    fiscal_year_stop: Option<String>,
}

impl From<RawLoaderConfig> for LoaderConfig {
    /// 缺省规则
    /// - db_path 缺省时才计算默认路径
    /// - 只给 start 时 stop 保持缺省（单财年）
    /// - 两者都缺省时取 1985 至今年
    fn from(raw: RawLoaderConfig) -> Self {
        let (fiscal_year_start, fiscal_year_stop) = match (raw.fiscal_year_start, raw.fiscal_year_stop) {
            (None, None) => (
                EARLIEST_FISCAL_YEAR.to_string(),
                Some(chrono::Local::now().year().to_string()),
            ),
            (Some(start), stop) => (start, stop),
            (None, Some(stop)) => (EARLIEST_FISCAL_YEAR.to_string(), Some(stop)),
        };

        Self {
            db_path: raw.db_path.unwrap_or_else(default_db_path),
            store_terms: raw.store_terms.unwrap_or(false),
            store_investigators: raw.store_investigators.unwrap_or(false),
            fiscal_year_start,
            fiscal_year_stop,
        }
    }
}

impl LoaderConfig {
    /// 从 JSON 文件读取配置（缺失字段取默认值）
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        serde_json::from_str(&raw).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// 读取配置文件（可选）并应用环境变量覆写
    pub fn resolve(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// 应用进程环境变量覆写
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// 按给定查找函数应用覆写（空值忽略）
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get(env_keys::DB_PATH) {
            self.db_path = v;
        }
        if let Some(v) = get(env_keys::STORE_TERMS) {
            self.store_terms = is_true(&v);
        }
        if let Some(v) = get(env_keys::STORE_INVESTIGATORS) {
            self.store_investigators = is_true(&v);
        }
        if let Some(v) = get(env_keys::FY_START) {
            self.fiscal_year_start = v;
        }
        if let Some(v) = get(env_keys::FY_STOP) {
            self.fiscal_year_stop = Some(v);
        }
    }

    /// 校验并返回财年范围
    pub fn fiscal_year_range(&self) -> ConfigResult<FiscalYearRange> {
        FiscalYearRange::parse(&self.fiscal_year_start, self.fiscal_year_stop.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_fiscal_year_accepts_padded_years() {
        assert_eq!(parse_fiscal_year("start", " 2012 ").unwrap(), 2012);
        assert_eq!(parse_fiscal_year("start", "1999").unwrap(), 1999);
    }

    #[test]
    fn test_parse_fiscal_year_rejects_non_years() {
        for raw in ["12", "20121", "2O12", "1812", "", "   "] {
            let err = parse_fiscal_year("start", raw).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidFiscalYear { .. }), "{raw:?}");
        }
    }

    #[test]
    fn test_range_stop_defaults_to_start() {
        let range = FiscalYearRange::parse("2010", None).unwrap();
        assert_eq!(range, FiscalYearRange { start: 2010, stop: 2010 });
        assert!(range.contains(2010));
        assert!(!range.contains(2011));
    }

    #[test]
    fn test_range_rejects_start_after_stop() {
        let err = FiscalYearRange::parse("2013", Some("2012")).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::FiscalYearRangeOrder { start: 2013, stop: 2012 }
        ));
    }

    #[test]
    fn test_load_json_with_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"db_path": "x.db", "store_terms": true, "fiscal_year_start": "2000", "fiscal_year_stop": "2013"}}"#
        )
        .unwrap();

        let config = LoaderConfig::load(file.path()).unwrap();
        assert_eq!(config.db_path, "x.db");
        assert!(config.store_terms);
        assert!(!config.store_investigators);
        assert_eq!(
            config.fiscal_year_range().unwrap(),
            FiscalYearRange { start: 2000, stop: 2013 }
        );
    }

    #[test]
    fn test_load_json_with_only_start_year_loads_single_year() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"db_path": "x.db", "fiscal_year_start": "2014"}}"#).unwrap();

        let config = LoaderConfig::load(file.path()).unwrap();
        assert_eq!(config.db_path, "x.db");
        assert_eq!(config.fiscal_year_stop, None);
        assert_eq!(
            config.fiscal_year_range().unwrap(),
            FiscalYearRange { start: 2014, stop: 2014 }
        );
    }

    #[test]
    fn test_load_json_without_years_covers_earliest_to_current() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"db_path": "x.db"}}"#).unwrap();

        let config = LoaderConfig::load(file.path()).unwrap();
        let range = config.fiscal_year_range().unwrap();
        assert_eq!(range.start, EARLIEST_FISCAL_YEAR);
        assert_eq!(range.stop, chrono::Local::now().year());
    }

    #[test]
    fn test_load_json_with_only_stop_year_starts_at_earliest() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"db_path": "x.db", "fiscal_year_stop": "1990"}}"#).unwrap();

        let config = LoaderConfig::load(file.path()).unwrap();
        assert_eq!(
            config.fiscal_year_range().unwrap(),
            FiscalYearRange { start: EARLIEST_FISCAL_YEAR, stop: 1990 }
        );
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{ not json").unwrap();

        let err = LoaderConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_overrides_apply_and_ignore_blank_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (env_keys::DB_PATH, "/tmp/override.db"),
            (env_keys::STORE_INVESTIGATORS, "yes"),
            (env_keys::FY_START, "2011"),
            (env_keys::FY_STOP, "  "),
        ]);

        let mut config = LoaderConfig {
            db_path: "a.db".to_string(),
            store_terms: false,
            store_investigators: false,
            fiscal_year_start: "2000".to_string(),
            fiscal_year_stop: Some("2012".to_string()),
        };
        config.apply_overrides_from(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.db_path, "/tmp/override.db");
        assert!(config.store_investigators);
        assert!(!config.store_terms);
        assert_eq!(config.fiscal_year_start, "2011");
        assert_eq!(config.fiscal_year_stop.as_deref(), Some("2012"));
    }
}
