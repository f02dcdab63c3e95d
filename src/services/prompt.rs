//! 提示词工程
//! 根据用户选择与上传文件组装发送给模型的请求，以及测验评分请求

use crate::models::{Goal, Selection};
use crate::services::decoder::{DecodeFailure, DecodedText};
use crate::services::quiz::QUIZ_MARKER;

/// 文件内容的起止标记
pub const FILE_BEGIN_MARKER: &str = "--- ファイル内容ここから ---";
pub const FILE_END_MARKER: &str = "--- ファイル内容ここまで ---";

/// 学习支援提示词
pub struct StudyPrompt;

impl StudyPrompt {
    const PERSONA: &'static str = "あなたはプログラミング学習をサポートする親切なAIアシスタントです。";

    const GENERIC_PROBLEM_SOLVING: &'static str = "具体的な質問は入力されていません。選択された言語とレベル、提供された情報（もしあればコードも含む）から、ユーザーが困っていそうな点を推測し、解決のための手順を提示してください。";

    const GENERIC_LEARNING: &'static str = "具体的な質問は入力されていません。選択された言語とレベルに合った、基本的で重要な概念を1つ選んで解説してください。";

    /// 构建主请求提示词
    ///
    /// 各段落顺序固定：角色、选择、问题、文件信息、目的相关指示
    pub fn request(selection: &Selection, file: Option<&DecodedText>) -> String {
        let mut parts: Vec<String> = vec![
            Self::PERSONA.to_string(),
            format!("対象言語: {}", selection.language.label()),
            format!("ユーザーの目的: {}", selection.goal.label()),
            format!("ユーザーの技術レベル: {}", selection.level.label()),
        ];

        match &selection.problem {
            Some(problem) => {
                parts.push("\n# ユーザーの質問:".to_string());
                parts.push(problem.clone());
            }
            None => {
                parts.push("\n# 依頼内容:".to_string());
                parts.push(
                    match selection.goal {
                        Goal::ProblemSolving => Self::GENERIC_PROBLEM_SOLVING,
                        Goal::Learning => Self::GENERIC_LEARNING,
                    }
                    .to_string(),
                );
            }
        }

        if let Some(decoded) = file {
            parts.push(Self::file_block(decoded));
        }

        parts.push("\n# 指示:".to_string());
        match selection.goal {
            Goal::ProblemSolving => {
                parts.push("- ユーザーが困っているであろう点を推測し、具体的な解決策やコード例を提示してください。".to_string());
                parts.push("- **重要:** 回答の最後に、参考文献として役立つWebサイトのURLを必ず3つから5つ、マークダウン形式のリストで提示してください。".to_string());
            }
            Goal::Learning => {
                parts.push(format!(
                    "- {}の{}レベルのユーザー向けに、提供された情報（もしあればコードも含む）に関連する基本的な概念や書き方を解説してください。",
                    selection.language.label(),
                    selection.level.label()
                ));
                parts.push(format!(
                    "- **重要:** 解説の最後に、理解度を確認するクイズを1つだけ作成し、回答の最終行に `{} [質問文]` の形式で1行で記述してください。クイズの行より後には何も書かないでください。",
                    QUIZ_MARKER
                ));
                parts.push("- **重要:** クイズの正解・解答例・ヒントは、出力のどこにも絶対に書かないでください。".to_string());
            }
        }
        parts.push("- 回答はマークダウン形式で、読みやすく記述してください。".to_string());

        parts.join("\n")
    }

    /// 文件信息块。只有解码成功时才附带文件内容
    fn file_block(decoded: &DecodedText) -> String {
        let status = match decoded.failure() {
            None => "読み込み成功".to_string(),
            Some(DecodeFailure::Undecodable) => {
                "読み込み失敗（文字コードを判別できませんでした）".to_string()
            }
            Some(DecodeFailure::TooLong { limit, .. }) => {
                format!("読み込み失敗（{}文字の上限を超えています）", limit)
            }
        };
        let char_count = decoded
            .char_count()
            .map(|count| count.to_string())
            .unwrap_or_else(|| "不明".to_string());
        let encoding = decoded.encoding().unwrap_or("不明");

        let mut block = vec![
            "\n# アップロードされたファイル:".to_string(),
            format!("- ファイル名: {}", decoded.file_name()),
            format!("- 状態: {}", status),
            format!("- 文字数: {}", char_count),
            format!("- 文字コード: {}", encoding),
        ];

        if let Some(text) = decoded.text() {
            block.push(FILE_BEGIN_MARKER.to_string());
            block.push(text.to_string());
            block.push(FILE_END_MARKER.to_string());
        }

        block.join("\n")
    }

    /// 构建评分提示词，嵌入原始生成文本与用户的原样回答
    pub fn grading(original: &str, answer: &str) -> String {
        format!(
            r#"あなたはプログラミングクイズの採点者です。
以下の「元の解説とクイズ」と「ユーザーの解答」を比較し、ユーザーの解答がクイズの意図に合っているか、正解と言えるかを判断してください。
判断結果と、その理由をユーザーにフィードバックしてください。
**重要:** 元の解説の中に正解が含まれていても、正解そのものは絶対に明かさないでください。評価とその理由の説明だけを行ってください。

# 元の解説とクイズ:
{}

# ユーザーの解答:
{}

# フィードバック形式:
- 採点結果（例：正解です！、惜しい！もう少しです、不正解です、など）
- 解説（なぜその評価なのかを簡潔に。正解そのものは書かないこと）"#,
            original, answer
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Language, SkillLevel, UploadedFile};
    use crate::services::decoder::TextDecoder;

    fn beginner_python(goal: Goal) -> Selection {
        Selection::new(Language::Python, goal, SkillLevel::Beginner)
    }

    #[test]
    fn test_problem_solving_without_input() {
        let prompt = StudyPrompt::request(&beginner_python(Goal::ProblemSolving), None);

        assert!(prompt.starts_with(StudyPrompt::PERSONA));
        assert!(prompt.contains("対象言語: Python"));
        assert!(prompt.contains("ユーザーの目的: 困りごとの解決"));
        assert!(prompt.contains("ユーザーの技術レベル: 初学者"));
        assert!(prompt.contains(StudyPrompt::GENERIC_PROBLEM_SOLVING));
        assert!(prompt.contains("URLを必ず3つから5つ"));
        assert!(!prompt.contains("# アップロードされたファイル:"));
        assert!(!prompt.contains("# ユーザーの質問:"));
        assert!(!prompt.contains(QUIZ_MARKER));
    }

    #[test]
    fn test_learning_requires_single_hidden_quiz() {
        let prompt = StudyPrompt::request(&beginner_python(Goal::Learning), None);

        assert!(prompt.contains(StudyPrompt::GENERIC_LEARNING));
        assert!(prompt.contains("`Q: [質問文]`"));
        assert!(prompt.contains("正解・解答例・ヒントは、出力のどこにも絶対に書かないでください"));
        assert!(!prompt.contains("3つから5つ"));
    }

    #[test]
    fn test_free_text_is_verbatim() {
        let problem = "for文で IndexError が出ます\n  list[i+1] の部分です";
        let selection = beginner_python(Goal::ProblemSolving).with_problem(problem);
        let prompt = StudyPrompt::request(&selection, None);

        assert!(prompt.contains(&format!("# ユーザーの質問:\n{}", problem)));
        assert!(!prompt.contains(StudyPrompt::GENERIC_PROBLEM_SOLVING));
    }

    #[test]
    fn test_file_content_between_markers() {
        let decoded = TextDecoder::default()
            .decode(&UploadedFile::new("app.js", b"console.log(1);".to_vec()));
        let prompt = StudyPrompt::request(&beginner_python(Goal::Learning), Some(&decoded));

        assert!(prompt.contains("- ファイル名: app.js"));
        assert!(prompt.contains("- 状態: 読み込み成功"));
        assert!(prompt.contains("- 文字数: 15"));
        assert!(prompt.contains("- 文字コード: UTF-8"));
        assert!(prompt.contains(&format!(
            "{}\nconsole.log(1);\n{}",
            FILE_BEGIN_MARKER, FILE_END_MARKER
        )));
    }

    #[test]
    fn test_oversized_file_has_info_but_no_content() {
        let content = "x".repeat(20_000);
        let decoded = TextDecoder::default()
            .decode(&UploadedFile::new("big.py", content.into_bytes()));
        let prompt = StudyPrompt::request(&beginner_python(Goal::ProblemSolving), Some(&decoded));

        assert!(prompt.contains("- ファイル名: big.py"));
        assert!(prompt.contains("15000文字の上限を超えています"));
        assert!(prompt.contains("- 文字数: 20000"));
        assert!(!prompt.contains(FILE_BEGIN_MARKER));
        assert!(!prompt.contains("xxxxxxxxxx"));
    }

    #[test]
    fn test_section_order() {
        let decoded = TextDecoder::default()
            .decode(&UploadedFile::new("q.sql", b"SELECT 1;".to_vec()));
        let selection = Selection::new(Language::Sql, Goal::Learning, SkillLevel::CanWrite)
            .with_problem("JOINの使い方");
        let prompt = StudyPrompt::request(&selection, Some(&decoded));

        let persona = prompt.find(StudyPrompt::PERSONA).unwrap();
        let question = prompt.find("# ユーザーの質問:").unwrap();
        let file = prompt.find("# アップロードされたファイル:").unwrap();
        let instructions = prompt.find("# 指示:").unwrap();
        assert!(persona < question && question < file && file < instructions);
    }

    #[test]
    fn test_request_is_deterministic() {
        let decoded = TextDecoder::default()
            .decode(&UploadedFile::new("style.css", b"body { margin: 0; }".to_vec()));
        let selection = Selection::new(Language::Css, Goal::Learning, SkillLevel::CanRead)
            .with_problem("余白を消したい");

        let first = StudyPrompt::request(&selection, Some(&decoded));
        let second = StudyPrompt::request(&selection, Some(&decoded));
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn test_grading_embeds_original_and_answer() {
        let original = "Concept explanation.\n\nQ: What does X do?";
        let prompt = StudyPrompt::grading(original, "it does Y");

        assert!(prompt.contains(original));
        assert!(prompt.contains("# ユーザーの解答:\nit does Y"));
        assert!(prompt.contains("正解そのものは絶対に明かさないでください"));
    }
}
