//! 数据模型
//! 用户选择、上传文件、生成结果等会话内的临时数据

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::services::quiz::split_quiz;

/// 允许上传的文件扩展名
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "py", "html", "css", "js", "sql", "txt", "md", "log", "json", "yaml", "toml", "ini", "xml",
    "csv", "xhtml", "htm", "mjs", "cjs", "ipynb",
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectionError {
    #[error("不明な言語です: {0}")]
    UnknownLanguage(String),
    #[error("不明な目的です: {0}")]
    UnknownGoal(String),
    #[error("不明な技術レベルです: {0}")]
    UnknownLevel(String),
}

/// 学习对象语言
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Python,
    Html,
    Css,
    JavaScript,
    Sql,
}

/// 用户目的
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Goal {
    ProblemSolving,
    Learning,
}

/// 技术水平
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillLevel {
    Beginner,
    CanRead,
    CanWrite,
    CanDebug,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::Python,
        Language::Html,
        Language::Css,
        Language::JavaScript,
        Language::Sql,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Language::Python => "Python",
            Language::Html => "HTML",
            Language::Css => "CSS",
            Language::JavaScript => "JavaScript",
            Language::Sql => "SQL",
        }
    }

    /// 菜单序号 (从 1 开始) 转换
    pub fn from_index(index: usize) -> Option<Self> {
        index.checked_sub(1).and_then(|i| Self::ALL.get(i).copied())
    }
}

impl Goal {
    pub const ALL: [Goal; 2] = [Goal::ProblemSolving, Goal::Learning];

    pub fn label(&self) -> &'static str {
        match self {
            Goal::ProblemSolving => "困りごとの解決",
            Goal::Learning => "プログラミング学習",
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        index.checked_sub(1).and_then(|i| Self::ALL.get(i).copied())
    }
}

impl SkillLevel {
    pub const ALL: [SkillLevel; 4] = [
        SkillLevel::Beginner,
        SkillLevel::CanRead,
        SkillLevel::CanWrite,
        SkillLevel::CanDebug,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SkillLevel::Beginner => "初学者",
            SkillLevel::CanRead => "何となくコードを読める",
            SkillLevel::CanWrite => "自分でコーディングできる",
            SkillLevel::CanDebug => "自力でバグ解消できる",
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        index.checked_sub(1).and_then(|i| Self::ALL.get(i).copied())
    }
}

impl FromStr for Language {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        if let Some(language) = key.parse::<usize>().ok().and_then(Self::from_index) {
            return Ok(language);
        }
        match key.to_lowercase().as_str() {
            "python" | "py" => Ok(Language::Python),
            "html" => Ok(Language::Html),
            "css" => Ok(Language::Css),
            "javascript" | "js" => Ok(Language::JavaScript),
            "sql" => Ok(Language::Sql),
            _ => Err(SelectionError::UnknownLanguage(s.to_string())),
        }
    }
}

impl FromStr for Goal {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        if let Some(goal) = key.parse::<usize>().ok().and_then(Self::from_index) {
            return Ok(goal);
        }
        match key.to_lowercase().as_str() {
            "problem-solving" | "problem" | "solve" | "困りごとの解決" => Ok(Goal::ProblemSolving),
            "learning" | "learn" | "プログラミング学習" => Ok(Goal::Learning),
            _ => Err(SelectionError::UnknownGoal(s.to_string())),
        }
    }
}

impl FromStr for SkillLevel {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        if let Some(level) = key.parse::<usize>().ok().and_then(Self::from_index) {
            return Ok(level);
        }
        match key.to_lowercase().as_str() {
            "beginner" | "初学者" => Ok(SkillLevel::Beginner),
            "can-read" | "reader" | "何となくコードを読める" => Ok(SkillLevel::CanRead),
            "can-write" | "writer" | "自分でコーディングできる" => Ok(SkillLevel::CanWrite),
            "can-debug" | "debugger" | "自力でバグ解消できる" => Ok(SkillLevel::CanDebug),
            _ => Err(SelectionError::UnknownLevel(s.to_string())),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 一次请求的用户选择
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub language: Language,
    pub goal: Goal,
    pub level: SkillLevel,
    pub problem: Option<String>,
}

impl Selection {
    pub fn new(language: Language, goal: Goal, level: SkillLevel) -> Self {
        Self {
            language,
            goal,
            level,
            problem: None,
        }
    }

    /// 空白的问题描述视为未填写
    pub fn with_problem(mut self, problem: impl Into<String>) -> Self {
        let problem = problem.into();
        self.problem = if problem.trim().is_empty() {
            None
        } else {
            Some(problem)
        };
        self
    }
}

/// 上传的文件
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
    pub extension: String,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let extension = Path::new(&name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        Self {
            name,
            bytes,
            extension,
        }
    }

    pub fn is_allowed(&self) -> bool {
        ALLOWED_EXTENSIONS.contains(&self.extension.as_str())
    }

    pub fn is_notebook(&self) -> bool {
        self.extension == "ipynb"
    }
}

/// 一次提交：选择 + 可选文件
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub selection: Selection,
    pub file: Option<UploadedFile>,
}

/// 模型生成的回答
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub raw: String,
    pub explanation: String,
    pub quiz: Option<String>,
}

impl GeneratedAnswer {
    /// 只有学习目的才提取测验，其它目的保留完整文本
    pub fn for_goal(raw: impl Into<String>, goal: Goal) -> Self {
        match goal {
            Goal::Learning => Self::from_raw(raw),
            Goal::ProblemSolving => {
                let raw = raw.into();
                Self {
                    explanation: raw.clone(),
                    raw,
                    quiz: None,
                }
            }
        }
    }

    /// 拆分解说与末尾的测验行。解说为空时退回整段文本，避免空白显示
    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let (explanation, quiz) = split_quiz(&raw);
        let explanation = if explanation.trim().is_empty() {
            raw.clone()
        } else {
            explanation
        };
        Self {
            raw,
            explanation,
            quiz,
        }
    }
}

/// 评分结果
#[derive(Debug, Clone, PartialEq)]
pub struct GradingResult {
    pub feedback: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_parsing() {
        assert_eq!("python".parse::<Language>(), Ok(Language::Python));
        assert_eq!("JS".parse::<Language>(), Ok(Language::JavaScript));
        assert_eq!("5".parse::<Language>(), Ok(Language::Sql));
        assert!("rust".parse::<Language>().is_err());
        assert!("0".parse::<Language>().is_err());

        assert_eq!("learning".parse::<Goal>(), Ok(Goal::Learning));
        assert_eq!("困りごとの解決".parse::<Goal>(), Ok(Goal::ProblemSolving));
        assert_eq!("4".parse::<SkillLevel>(), Ok(SkillLevel::CanDebug));
        assert_eq!("beginner".parse::<SkillLevel>(), Ok(SkillLevel::Beginner));
    }

    #[test]
    fn test_uploaded_file_extension() {
        let file = UploadedFile::new("Main.PY", b"print(1)".to_vec());
        assert_eq!(file.extension, "py");
        assert!(file.is_allowed());
        assert!(!file.is_notebook());

        let notebook = UploadedFile::new("lesson.ipynb", Vec::new());
        assert!(notebook.is_notebook());

        let binary = UploadedFile::new("image.png", Vec::new());
        assert!(!binary.is_allowed());

        let no_ext = UploadedFile::new("Makefile", Vec::new());
        assert!(!no_ext.is_allowed());
    }

    #[test]
    fn test_blank_problem_is_absent() {
        let selection = Selection::new(Language::Css, Goal::Learning, SkillLevel::CanRead)
            .with_problem("   \n");
        assert_eq!(selection.problem, None);
    }

    #[test]
    fn test_generated_answer_falls_back_to_raw() {
        let answer = GeneratedAnswer::from_raw("Q: 変数とは何ですか？\n補足");
        assert_eq!(answer.explanation, "Q: 変数とは何ですか？\n補足");
        assert_eq!(answer.quiz.as_deref(), Some("Q: 変数とは何ですか？"));
    }

    #[test]
    fn test_problem_solving_answer_is_not_split() {
        let raw = "解決策です。\n\nQ: よくある質問\nA: 回答\n\n## 参考URL\n- https://docs.python.org/";
        let answer = GeneratedAnswer::for_goal(raw, Goal::ProblemSolving);
        assert_eq!(answer.explanation, raw);
        assert_eq!(answer.quiz, None);

        let learning = GeneratedAnswer::for_goal(raw, Goal::Learning);
        assert_eq!(learning.explanation, "解決策です。\n");
        assert_eq!(learning.quiz.as_deref(), Some("Q: よくある質問"));
    }
}
