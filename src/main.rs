use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use study_support::commands::{
    run, FormDefaults, RunOptions, SessionFlow, TerminalInput, TerminalView,
};
use study_support::models::{Goal, Language, SkillLevel};
use study_support::services::{GeminiClient, GeminiConfig};
use study_support::utils::{get_log_path, init_logging};

/// 命令行参数
#[derive(Parser, Debug)]
#[clap(
    name = "study-support",
    version,
    about = "プログラミング学習サポート (Gemini)"
)]
struct CliArgs {
    /// Gemini model id (overrides GEMINI_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Default language: python, html, css, javascript, sql or 1-5
    #[arg(long)]
    language: Option<Language>,

    /// Default goal: problem-solving or learning
    #[arg(long)]
    goal: Option<Goal>,

    /// Default skill level: beginner, can-read, can-write, can-debug or 1-4
    #[arg(long)]
    level: Option<SkillLevel>,

    /// Print the assembled prompt before sending it
    #[arg(long)]
    show_prompt: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Log file path
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, short)]
    verbose: bool,
}

/// 启动时的致命错误：输出后以状态码 1 退出
fn fatal(message: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", "エラー:".red().bold(), message);
    process::exit(1);
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    dotenvy::dotenv().ok();

    if args.no_color {
        colored::control::set_override(false);
    }

    let log_path = args.log_file.clone().unwrap_or_else(get_log_path);
    if let Err(e) = init_logging(&log_path, args.verbose) {
        eprintln!("{} {:#}", "warning: logging disabled:".yellow(), e);
    }

    let config = match GeminiConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("configuration error: {}", e);
            fatal(e);
        }
    };
    let config = match args.model.as_deref() {
        Some(model) => config.with_model(model).unwrap_or_else(|e| fatal(e)),
        None => config,
    };
    log::info!(
        "starting study-support {} with {:?}",
        env!("CARGO_PKG_VERSION"),
        config
    );

    let client = GeminiClient::new(config).unwrap_or_else(|e| fatal(e));

    let defaults = FormDefaults {
        language: args.language.unwrap_or(Language::Python),
        goal: args.goal.unwrap_or(Goal::ProblemSolving),
        level: args.level.unwrap_or(SkillLevel::Beginner),
    };

    let mut flow = SessionFlow::new(client);
    let mut input = TerminalInput::new(defaults)?;
    let mut view = TerminalView::stdout(!args.no_color);

    run(
        &mut flow,
        &mut input,
        &mut view,
        RunOptions {
            show_prompt: args.show_prompt,
            spinner: true,
        },
    )
    .await?;

    log::info!("[{}] session ended", flow.session_id());
    Ok(())
}
