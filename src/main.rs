// ==========================================
// NIH ExPORTER 导入系统 - 命令行入口
// ==========================================
// 用法: nih-loader <manifest.json> [config.json]
// 退出码: 0 成功；1 配置/抽取/落库失败
// ==========================================

use anyhow::{bail, Context, Result};
use nih_exporter_loader::config::{FileManifest, LoaderConfig};
use nih_exporter_loader::importer::{AwardLoaderImpl, ImportError};
use nih_exporter_loader::logging;
use std::path::PathBuf;

fn main() -> Result<()> {
    logging::init();

    let mut args = std::env::args_os().skip(1);
    let Some(manifest_path) = args.next().map(PathBuf::from) else {
        bail!("用法: nih-loader <manifest.json> [config.json]");
    };
    let config_path = args.next().map(PathBuf::from);

    tracing::info!("==================================================");
    tracing::info!("{} v{}", nih_exporter_loader::APP_NAME, nih_exporter_loader::VERSION);
    tracing::info!("==================================================");

    let config = LoaderConfig::resolve(config_path.as_deref()).context("读取加载配置失败")?;
    let manifest = FileManifest::load(&manifest_path)
        .with_context(|| format!("读取文件清单失败: {}", manifest_path.display()))?;
    tracing::info!(db_path = %config.db_path, "使用数据库");

    match AwardLoaderImpl::load_fiscal_year_range(&config, &manifest) {
        Ok(summary) => {
            tracing::info!(
                files_loaded = summary.files_loaded,
                files_skipped = summary.files_skipped,
                rows_inserted = summary.rows_inserted,
                terms_inserted = summary.terms_inserted,
                investigators_inserted = summary.investigators_inserted,
                elapsed_secs = summary.elapsed.as_secs_f64(),
                "本次运行完成"
            );
            Ok(())
        }
        Err(e) => {
            if let ImportError::Persistence { file_name, file_date, row, .. } = &e {
                tracing::error!(file = %file_name, date = %file_date, row = *row, "落库失败的文件与行");
            }
            Err(e).context("加载失败")
        }
    }
}
