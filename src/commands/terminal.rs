//! 终端前端
//! 输入提供者、输出视图，以及驱动会话的主循环

use anyhow::{bail, Context, Result};
use colored::{ColoredString, Colorize};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use spinners::{Spinner, Spinners};
use std::fmt::Display;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;

use crate::commands::session::{Phase, SessionFlow, SessionState};
use crate::models::{
    GradingResult, Goal, Language, Selection, SkillLevel, Submission, UploadedFile,
    ALLOWED_EXTENSIONS,
};
use crate::services::decoder::{DecodeFailure, DecodedText, NotebookSource};
use crate::services::gemini::GenerationService;
use crate::services::render::{render_markdown, RenderOptions};

/// 用户操作
#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    /// 提交新的问题
    Submit(Submission),
    /// 回答当前测验
    AnswerQuiz(String),
    Clear,
    /// 显示上一次发送的提示词
    ShowPrompt,
    /// 重新显示当前回答
    Show,
    Quit,
}

/// 输入提供者
pub trait InputProvider {
    fn next_action(&mut self, phase: Phase) -> Result<UserAction>;
}

/// 表单默认值，来自命令行参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormDefaults {
    pub language: Language,
    pub goal: Goal,
    pub level: SkillLevel,
}

impl Default for FormDefaults {
    fn default() -> Self {
        Self {
            language: Language::Python,
            goal: Goal::ProblemSolving,
            level: SkillLevel::Beginner,
        }
    }
}

/// 读取上传文件，检查扩展名白名单
pub fn load_upload(path: &Path) -> Result<UploadedFile> {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .with_context(|| format!("ファイル名を取得できません: {}", path.display()))?;

    let probe = UploadedFile::new(name.clone(), Vec::new());
    if !probe.is_allowed() {
        bail!(
            "対応していないファイル形式です: {}（対応形式: {}）",
            name,
            ALLOWED_EXTENSIONS.join(", ")
        );
    }

    let bytes = fs::read(path)
        .with_context(|| format!("ファイルを読み込めません: {}", path.display()))?;
    Ok(UploadedFile::new(name, bytes))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    New,
    Answer,
    Show,
    Prompt,
    Clear,
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    match line.trim().to_lowercase().as_str() {
        "n" | "new" => Some(Command::New),
        "a" | "answer" => Some(Command::Answer),
        "s" | "show" => Some(Command::Show),
        "p" | "prompt" => Some(Command::Prompt),
        "c" | "clear" => Some(Command::Clear),
        "q" | "quit" | "exit" => Some(Command::Quit),
        _ => None,
    }
}

fn menu(phase: Phase) -> String {
    let mut items = vec!["[n] 新しい質問"];
    if matches!(phase, Phase::QuizPending | Phase::Graded) {
        items.push("[a] クイズに解答");
    }
    if phase != Phase::Idle {
        items.push("[s] 回答を再表示");
        items.push("[p] プロンプトを表示");
        items.push("[c] クリア");
    }
    items.push("[q] 終了");
    items.join("  ")
}

/// 基于 rustyline 的交互式输入
pub struct TerminalInput {
    editor: DefaultEditor,
    defaults: FormDefaults,
}

impl TerminalInput {
    pub fn new(defaults: FormDefaults) -> Result<Self> {
        let editor = DefaultEditor::new().context("端末を初期化できません")?;
        Ok(Self { editor, defaults })
    }

    /// Ctrl-C / Ctrl-D 返回 `None`
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 空行结束的多行输入
    fn read_block(&mut self, title: &str) -> Result<Option<String>> {
        println!("{}", title.bright_cyan());
        println!("{}", "（空行で入力を終了）".bright_black());
        let mut lines = Vec::new();
        loop {
            match self.read_line("| ")? {
                Some(line) if line.trim().is_empty() => break,
                Some(line) => lines.push(line),
                None => return Ok(None),
            }
        }
        Ok(Some(lines.join("\n")))
    }

    fn read_choice<T>(&mut self, title: &str, options: &[T], default: T) -> Result<Option<T>>
    where
        T: FromStr + Copy + Display + PartialEq,
        T::Err: Display,
    {
        println!("{}", title.bright_cyan());
        for (index, option) in options.iter().enumerate() {
            let marker = if *option == default { "*" } else { " " };
            println!(" {}{}. {}", marker, index + 1, option);
        }
        loop {
            let line = match self.read_line(&format!("番号を選択 [{}]: ", default))? {
                Some(line) => line,
                None => return Ok(None),
            };
            if line.trim().is_empty() {
                return Ok(Some(default));
            }
            match line.parse::<T>() {
                Ok(choice) => return Ok(Some(choice)),
                Err(e) => println!("{}", e.to_string().yellow()),
            }
        }
    }

    fn read_file(&mut self) -> Result<Option<UploadedFile>> {
        loop {
            let line = match self.read_line("ファイルパス（省略可）: ")? {
                Some(line) => line,
                None => return Ok(None),
            };
            let path = line.trim();
            if path.is_empty() {
                return Ok(None);
            }
            match load_upload(Path::new(path)) {
                Ok(file) => return Ok(Some(file)),
                Err(e) => {
                    log::warn!("upload rejected: {:#}", e);
                    println!("{}", format!("{:#}", e).yellow());
                }
            }
        }
    }

    fn read_submission(&mut self) -> Result<Option<Submission>> {
        let Some(language) = self.read_choice("学習言語", &Language::ALL, self.defaults.language)?
        else {
            return Ok(None);
        };
        let Some(goal) = self.read_choice("目的", &Goal::ALL, self.defaults.goal)? else {
            return Ok(None);
        };
        let Some(level) = self.read_choice("技術レベル", &SkillLevel::ALL, self.defaults.level)?
        else {
            return Ok(None);
        };
        let Some(problem) = self.read_block("困っていること・質問（省略可）")? else {
            return Ok(None);
        };
        let file = self.read_file()?;

        Ok(Some(Submission {
            selection: Selection::new(language, goal, level).with_problem(problem),
            file,
        }))
    }
}

impl InputProvider for TerminalInput {
    fn next_action(&mut self, phase: Phase) -> Result<UserAction> {
        loop {
            println!();
            println!("{}", menu(phase).bright_black());
            let line = match self.read_line("> ")? {
                Some(line) => line,
                None => return Ok(UserAction::Quit),
            };
            let action = match parse_command(&line) {
                Some(Command::New) => match self.read_submission()? {
                    Some(submission) => UserAction::Submit(submission),
                    None => continue,
                },
                Some(Command::Answer) => match self.read_block("クイズの解答")? {
                    Some(answer) => UserAction::AnswerQuiz(answer),
                    None => continue,
                },
                Some(Command::Show) => UserAction::Show,
                Some(Command::Prompt) => UserAction::ShowPrompt,
                Some(Command::Clear) => UserAction::Clear,
                Some(Command::Quit) => UserAction::Quit,
                None => {
                    if !line.trim().is_empty() {
                        println!("{}", "不明なコマンドです。".yellow());
                    }
                    continue;
                }
            };
            return Ok(action);
        }
    }
}

/// 终端输出视图
pub struct TerminalView<W: Write> {
    out: W,
    color: bool,
}

impl TerminalView<io::Stdout> {
    pub fn stdout(color: bool) -> Self {
        Self::new(io::stdout(), color)
    }
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, text: &str, style: fn(ColoredString) -> ColoredString) -> String {
        if self.color {
            style(text.normal()).to_string()
        } else {
            text.to_string()
        }
    }

    fn markdown(&self, content: &str) -> String {
        render_markdown(
            content,
            RenderOptions {
                color: self.color,
                ..RenderOptions::default()
            },
        )
    }

    fn heading(&mut self, title: &str) -> io::Result<()> {
        let line = self.paint(&format!("━━ {} ━━", title), |s| s.bright_green().bold());
        writeln!(self.out)?;
        writeln!(self.out, "{}", line)
    }

    pub fn banner(&mut self) -> io::Result<()> {
        let title = self.paint("プログラミング学習サポート", |s| s.bright_cyan().bold());
        writeln!(self.out, "{}", title)?;
        let hint = self.paint(
            "言語・目的・レベルを選び、質問やファイルを送信してください。",
            |s| s.bright_black(),
        );
        writeln!(self.out, "{}", hint)
    }

    pub fn info(&mut self, message: &str) -> io::Result<()> {
        let line = self.paint(&format!("ℹ {}", message), |s| s.bright_blue());
        writeln!(self.out, "{}", line)
    }

    pub fn warning(&mut self, message: &str) -> io::Result<()> {
        let line = self.paint(&format!("⚠ {}", message), |s| s.yellow());
        writeln!(self.out, "{}", line)
    }

    pub fn error(&mut self, message: &str) -> io::Result<()> {
        let line = self.paint(&format!("✖ {}", message), |s| s.red().bold());
        writeln!(self.out, "{}", line)
    }

    /// 文件读取结果提示
    pub fn file_status(&mut self, decoded: &DecodedText) -> io::Result<()> {
        let name = decoded.file_name().to_string();
        match decoded.failure() {
            None => {
                if decoded.notebook() == NotebookSource::RawFallback {
                    self.warning(&format!(
                        "「{}」をノートブックとして解析できなかったため、テキストとして読み込みました。",
                        name
                    ))?;
                }
                if let NotebookSource::CodeCells(cells) = decoded.notebook() {
                    self.info(&format!(
                        "ノートブック「{}」からコードセルを{}件抽出しました。",
                        name, cells
                    ))?;
                }
                self.info(&format!(
                    "ファイル「{}」を読み込みました（文字コード: {}、{}文字）。",
                    name,
                    decoded.encoding().unwrap_or("不明"),
                    decoded.char_count().unwrap_or(0)
                ))
            }
            Some(DecodeFailure::Undecodable) => self.warning(&format!(
                "ファイル「{}」の文字コードを判別できませんでした。ファイル内容は送信されません。",
                name
            )),
            Some(DecodeFailure::TooLong { chars, limit }) => self.warning(&format!(
                "ファイル「{}」は{}文字で、上限の{}文字を超えています。ファイル内容は送信されません。",
                name, chars, limit
            )),
        }
    }

    pub fn prompt(&mut self, prompt: &str) -> io::Result<()> {
        self.heading("送信プロンプト")?;
        writeln!(self.out, "{}", prompt)
    }

    /// 显示当前回答、测验与评分
    pub fn state(&mut self, state: &SessionState) -> io::Result<()> {
        let Some(answer) = state.answer() else {
            return self.info("表示できる回答はまだありません。");
        };

        self.heading("AIからの回答")?;
        let rendered = self.markdown(&answer.explanation);
        writeln!(self.out, "{}", rendered)?;

        if let Some(quiz) = state.quiz() {
            self.heading("理解度チェック")?;
            let quiz = self.paint(quiz, |s| s.bold());
            writeln!(self.out, "{}", quiz)?;
            if !state.is_quiz_evaluated() {
                self.info("[a] でクイズに解答できます。")?;
            }
        } else if state.quiz_missing() {
            self.info("今回の回答からはクイズを抽出できませんでした。")?;
        }

        if let Some(feedback) = state.feedback() {
            self.feedback(feedback)?;
        }
        Ok(())
    }

    pub fn feedback(&mut self, result: &GradingResult) -> io::Result<()> {
        self.heading("採点結果")?;
        let rendered = self.markdown(&result.feedback);
        writeln!(self.out, "{}", rendered)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// 主循环选项
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// 发送前显示提示词
    pub show_prompt: bool,
    /// 等待时显示 spinner
    pub spinner: bool,
}

fn start_spinner(enabled: bool, message: &str) -> Option<Spinner> {
    enabled.then(|| Spinner::new(Spinners::Dots12, message.to_string()))
}

fn stop_spinner(spinner: Option<Spinner>) {
    if let Some(mut spinner) = spinner {
        spinner.stop();
        print!("\r\x1B[K");
        let _ = io::stdout().flush();
    }
}

/// 驱动会话直到用户退出
pub async fn run<G, I, W>(
    flow: &mut SessionFlow<G>,
    input: &mut I,
    view: &mut TerminalView<W>,
    options: RunOptions,
) -> Result<()>
where
    G: GenerationService,
    I: InputProvider,
    W: Write,
{
    view.banner()?;

    loop {
        view.flush()?;
        let action = input.next_action(flow.phase())?;
        log::debug!("[{}] action: {:?}", flow.session_id(), action);

        match action {
            UserAction::Quit => {
                view.info("終了します。")?;
                break;
            }
            UserAction::Clear => {
                flow.clear();
                view.info("回答をクリアしました。")?;
            }
            UserAction::Show => view.state(flow.state())?,
            UserAction::ShowPrompt => match flow.state().last_prompt() {
                Some(prompt) => {
                    let prompt = prompt.to_string();
                    view.prompt(&prompt)?;
                }
                None => view.info("送信済みのプロンプトはありません。")?,
            },
            UserAction::Submit(submission) => {
                let request = flow.prepare(&submission);
                if let Some(decoded) = &request.file {
                    view.file_status(decoded)?;
                }
                if options.show_prompt {
                    view.prompt(&request.prompt)?;
                }
                view.flush()?;

                let spinner = start_spinner(options.spinner, "AIが回答を生成中です...");
                let result = flow.generate(request).await;
                stop_spinner(spinner);

                match result {
                    Ok(state) => view.state(state)?,
                    Err(e) => view.error(&e.to_string())?,
                }
            }
            UserAction::AnswerQuiz(answer) => {
                let spinner = start_spinner(
                    options.spinner && !answer.trim().is_empty() && flow.state().is_quiz_active(),
                    "AIが採点中です...",
                );
                let result = flow.answer_quiz(&answer).await;
                stop_spinner(spinner);

                match result {
                    Ok(feedback) => view.feedback(&feedback)?,
                    Err(e) if e.is_validation() => view.warning(&e.to_string())?,
                    Err(e) => view.error(&e.to_string())?,
                }
            }
        }
    }

    view.flush()?;
    Ok(())
}
