// ==========================================
// 配置与文件清单 集成测试
// ==========================================
// 测试目标: 验证财年范围筛选、配置校验先于 I/O、清单驱动的完整加载
// ==========================================


use nih_exporter_loader::config::{ConfigError, FileManifest, LoaderConfig};
use nih_exporter_loader::importer::{AwardLoaderImpl, ImportError};
use nih_exporter_loader::repository::SourceFileRepository;
use tempfile::tempdir;
use test_helpers::{create_test_db, exporter_xml, query_count, simple_rows, write_xml_file};

fn write_manifest(dir: &std::path::Path, json: &str) -> FileManifest {
    let path = dir.join("manifest.json");
    std::fs::write(&path, json).unwrap();
    FileManifest::load(&path).expect("Failed to load manifest")
}

fn config(db_path: &str, start: &str, stop: Option<&str>) -> LoaderConfig {
    LoaderConfig {
        db_path: db_path.to_string(),
        store_terms: true,
        store_investigators: false,
        fiscal_year_start: start.to_string(),
        fiscal_year_stop: stop.map(str::to_string),
    }
}

#[test]
fn test_manifest_drives_fiscal_year_range_load() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let dir = tempdir().unwrap();

    write_xml_file(dir.path(), "fy2010.xml", &exporter_xml(&simple_rows(&["1"])));
    write_xml_file(dir.path(), "fy2011.xml", &exporter_xml(&simple_rows(&["1", "2"])));
    write_xml_file(dir.path(), "fy2012.xml", &exporter_xml(&simple_rows(&["2", "3"])));

    let manifest = write_manifest(
        dir.path(),
        r#"[
            {"fiscal_year": "2010", "file_date": "09/30/2010", "xml_file": "fy2010.xml"},
            {"fiscal_year": "2011", "file_date": "09/30/2011", "xml_file": "fy2011.xml"},
            {"fiscal_year": "2012", "file_date": "2012-09-30", "xml_file": "fy2012.xml"}
        ]"#,
    );

    let summary =
        AwardLoaderImpl::load_fiscal_year_range(&config(&db_path, "2011", Some("2012")), &manifest).unwrap();

    assert_eq!(summary.files_loaded, 2);
    assert_eq!(summary.rows_inserted, 4);

    let files = SourceFileRepository::new(&db_path).unwrap().list_all().unwrap();
    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["fy2012.xml", "fy2011.xml"]);
    assert_eq!(query_count(&db_path, "SELECT COUNT(*) FROM nih_project_term"), 0);
}

#[test]
fn test_single_year_when_stop_missing() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let dir = tempdir().unwrap();
    write_xml_file(dir.path(), "a.xml", &exporter_xml(&simple_rows(&["1"])));
    write_xml_file(dir.path(), "b.xml", &exporter_xml(&simple_rows(&["2"])));

    let manifest = write_manifest(
        dir.path(),
        r#"[
            {"fiscal_year": "2013", "file_date": "01/01/2013", "xml_file": "a.xml"},
            {"fiscal_year": "2014", "file_date": "01/01/2014", "xml_file": "b.xml"}
        ]"#,
    );

    let summary = AwardLoaderImpl::load_fiscal_year_range(&config(&db_path, " 2014 ", None), &manifest).unwrap();
    assert_eq!(summary.files_loaded, 1);
    assert_eq!(query_count(&db_path, "SELECT COUNT(*) FROM nih_project WHERE application_id = '2'"), 1);
}

#[test]
fn test_invalid_range_fails_before_touching_database() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("never_created.db");
    let manifest = FileManifest::new(Vec::new());

    let cases = [("2012", Some("2011")), ("12", None), ("1890", None), ("2011", Some("two"))];
    for (start, stop) in cases {
        let err = AwardLoaderImpl::load_fiscal_year_range(
            &config(db_path.to_str().unwrap(), start, stop),
            &manifest,
        )
        .unwrap_err();
        assert!(matches!(err, ImportError::Config(_)), "{start:?}/{stop:?} -> {err:?}");
    }

    assert!(!db_path.exists());
}

#[test]
fn test_empty_selection_is_reported() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("never_created.db");
    let manifest = write_manifest(
        dir.path(),
        r#"[{"fiscal_year": "2001", "file_date": "09/30/2001", "xml_file": "x.xml"}]"#,
    );

    let err = AwardLoaderImpl::load_fiscal_year_range(
        &config(db_path.to_str().unwrap(), "2005", Some("2006")),
        &manifest,
    )
    .unwrap_err();

    assert!(matches!(
        err,
        ImportError::Config(ConfigError::NoFilesInRange { start: 2005, stop: 2006 })
    ));
    assert!(!db_path.exists());
}
