//! 测验行提取
//! 从生成文本中分离出解说部分与末尾的测验问题行

use once_cell::sync::Lazy;
use regex::Regex;

/// 提示词中要求模型使用的测验标记
pub const QUIZ_MARKER: &str = "Q:";

/// 等价的测验标记：Q / Question / Quiz / 問題 / クイズ / 問，允许 markdown 强调符号，半角或全角冒号
static QUIZ_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:[-*>]\s+)?[*_]*\s*(?:q|question|quiz|問題|クイズ|問)\s*[*_]*\s*[:：]")
        .unwrap()
});

/// 判断一行是否为测验行
pub fn is_quiz_line(line: &str) -> bool {
    QUIZ_LINE.is_match(line)
}

/// 拆分文本
///
/// 第一条匹配的行为测验问题，之前的行构成解说，该行之后的内容全部丢弃。
/// 没有匹配时返回原文与 `None`。
pub fn split_quiz(text: &str) -> (String, Option<String>) {
    let lines: Vec<&str> = text.lines().collect();

    match lines.iter().position(|line| is_quiz_line(line)) {
        Some(index) => {
            let explanation = lines[..index].join("\n");
            let quiz = lines[index].trim().to_string();
            (explanation, Some(quiz))
        }
        None => (text.to_string(), None),
    }
}
