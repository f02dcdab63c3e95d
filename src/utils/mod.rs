use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

const APP_DIR_NAME: &str = "study-support";
const LOG_FILE_NAME: &str = "study-support.log";

/// 应用数据目录：`$XDG_DATA_HOME/study-support`，否则 `~/.local/share/study-support`
pub fn get_app_data_dir() -> PathBuf {
    app_data_dir_from(env::var_os("XDG_DATA_HOME"), env::var_os("HOME"))
}

fn app_data_dir_from(
    xdg_data_home: Option<std::ffi::OsString>,
    home: Option<std::ffi::OsString>,
) -> PathBuf {
    let mut path = match (xdg_data_home, home) {
        (Some(xdg), _) if !xdg.is_empty() => PathBuf::from(xdg),
        (_, Some(home)) if !home.is_empty() => {
            let mut path = PathBuf::from(home);
            path.push(".local/share");
            path
        }
        _ => env::temp_dir(),
    };
    path.push(APP_DIR_NAME);
    path
}

pub fn get_log_path() -> PathBuf {
    let mut path = get_app_data_dir();
    path.push(LOG_FILE_NAME);
    path
}

/// 初始化文件日志。终端输出保持干净，日志只写入文件
pub fn init_logging(path: &Path, verbose: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }

    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        // 依赖库的调试输出过多
        .level_for("rustyline", log::LevelFilter::Warn)
        .level_for("reqwest", log::LevelFilter::Info)
        .level_for("hyper_util", log::LevelFilter::Info)
        .chain(
            fern::log_file(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?,
        )
        .apply()
        .context("logger already initialised")?;

    Ok(())
}
