//! 上传文件解码
//! 按顺序尝试编码列表，超过字符上限的文件整体拒绝

use encoding_rs::{Encoding, SHIFT_JIS, UTF_8};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::UploadedFile;

/// 文件文本的字符上限
pub const MAX_FILE_CHARS: usize = 15_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeFailure {
    #[error("undecodable")]
    Undecodable,
    #[error("too long: {chars} > {limit} characters")]
    TooLong { chars: usize, limit: usize },
}

/// Notebook 的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotebookSource {
    /// 普通文本文件
    NotNotebook,
    /// 提取了代码单元
    CodeCells(usize),
    /// JSON 解析失败，按纯文本处理
    RawFallback,
}

/// 解码结果。只有成功时才持有文本
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedText {
    file_name: String,
    text: Option<String>,
    encoding: Option<&'static str>,
    char_count: Option<usize>,
    failure: Option<DecodeFailure>,
    notebook: NotebookSource,
}

impl DecodedText {
    fn succeeded(
        file_name: &str,
        text: String,
        encoding: &'static str,
        notebook: NotebookSource,
    ) -> Self {
        let char_count = text.chars().count();
        Self {
            file_name: file_name.to_string(),
            text: Some(text),
            encoding: Some(encoding),
            char_count: Some(char_count),
            failure: None,
            notebook,
        }
    }

    fn failed(
        file_name: &str,
        failure: DecodeFailure,
        encoding: Option<&'static str>,
        notebook: NotebookSource,
    ) -> Self {
        let char_count = match &failure {
            DecodeFailure::TooLong { chars, .. } => Some(*chars),
            DecodeFailure::Undecodable => None,
        };
        Self {
            file_name: file_name.to_string(),
            text: None,
            encoding,
            char_count,
            failure: Some(failure),
            notebook,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn encoding(&self) -> Option<&'static str> {
        self.encoding
    }

    /// 解码后的字符数。无法解码时为 `None`
    pub fn char_count(&self) -> Option<usize> {
        self.char_count
    }

    pub fn failure(&self) -> Option<&DecodeFailure> {
        self.failure.as_ref()
    }

    pub fn notebook(&self) -> NotebookSource {
        self.notebook
    }
}

#[derive(Debug, Deserialize)]
struct Notebook {
    #[serde(default)]
    cells: Vec<NotebookCell>,
}

#[derive(Debug, Deserialize)]
struct NotebookCell {
    #[serde(default)]
    cell_type: Option<String>,
    #[serde(default)]
    source: Value,
}

impl NotebookCell {
    fn is_code(&self) -> bool {
        self.cell_type.as_deref() == Some("code")
    }

    /// source 可以是字符串或字符串数组；null 与非字符串元素视为空
    fn source_text(&self) -> String {
        match &self.source {
            Value::String(text) => text.clone(),
            Value::Array(lines) => lines.iter().filter_map(Value::as_str).collect(),
            _ => String::new(),
        }
    }
}

/// 提取 notebook 中所有代码单元的源码，以空行分隔
pub fn extract_notebook_code(bytes: &[u8]) -> Result<(String, usize), serde_json::Error> {
    let notebook: Notebook = serde_json::from_slice(bytes)?;
    let sources: Vec<String> = notebook
        .cells
        .iter()
        .filter(|cell| cell.is_code())
        .map(NotebookCell::source_text)
        .collect();
    let count = sources.len();
    Ok((sources.join("\n\n"), count))
}

/// 文本解码器
#[derive(Debug, Clone)]
pub struct TextDecoder {
    encodings: Vec<&'static Encoding>,
    max_chars: usize,
}

impl Default for TextDecoder {
    fn default() -> Self {
        Self {
            encodings: vec![UTF_8, SHIFT_JIS],
            max_chars: MAX_FILE_CHARS,
        }
    }
}

impl TextDecoder {
    pub fn new(encodings: Vec<&'static Encoding>, max_chars: usize) -> Self {
        Self {
            encodings,
            max_chars,
        }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn decode(&self, file: &UploadedFile) -> DecodedText {
        let mut notebook = NotebookSource::NotNotebook;

        if file.is_notebook() {
            match extract_notebook_code(&file.bytes) {
                Ok((code, cells)) => {
                    return self.check_length(
                        &file.name,
                        code,
                        UTF_8.name(),
                        NotebookSource::CodeCells(cells),
                    );
                }
                Err(e) => {
                    log::warn!("notebook parse failed for {}: {}", file.name, e);
                    notebook = NotebookSource::RawFallback;
                }
            }
        }

        match self.decode_bytes(&file.bytes) {
            Some((text, encoding)) => self.check_length(&file.name, text, encoding, notebook),
            None => DecodedText::failed(&file.name, DecodeFailure::Undecodable, None, notebook),
        }
    }

    /// 依次尝试每种编码，返回第一个成功的结果
    fn decode_bytes(&self, bytes: &[u8]) -> Option<(String, &'static str)> {
        for encoding in &self.encodings {
            if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes)
            {
                let text: &str = &text;
                let text = text.strip_prefix('\u{feff}').unwrap_or(text).to_string();
                return Some((text, encoding.name()));
            }
            log::debug!("decoding as {} failed", encoding.name());
        }
        None
    }

    fn check_length(
        &self,
        file_name: &str,
        text: String,
        encoding: &'static str,
        notebook: NotebookSource,
    ) -> DecodedText {
        let chars = text.chars().count();
        if chars > self.max_chars {
            return DecodedText::failed(
                file_name,
                DecodeFailure::TooLong {
                    chars,
                    limit: self.max_chars,
                },
                Some(encoding),
                notebook,
            );
        }
        DecodedText::succeeded(file_name, text, encoding, notebook)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(name: &str, bytes: &[u8]) -> DecodedText {
        TextDecoder::default().decode(&UploadedFile::new(name, bytes.to_vec()))
    }

    #[test]
    fn test_utf8_is_primary() {
        let result = decode("main.py", "print('こんにちは')".as_bytes());
        assert!(result.is_success());
        assert_eq!(result.encoding(), Some("UTF-8"));
        assert_eq!(result.text(), Some("print('こんにちは')"));
        assert_eq!(result.char_count(), Some(14));
        assert_eq!(result.notebook(), NotebookSource::NotNotebook);
    }

    #[test]
    fn test_shift_jis_fallback() {
        // Shift_JIS 编码的「日本語」
        let result = decode("memo.txt", b"\x93\xfa\x96\x7b\x8c\xea");
        assert!(result.is_success());
        assert_eq!(result.encoding(), Some("Shift_JIS"));
        assert_eq!(result.text(), Some("日本語"));
    }

    #[test]
    fn test_undecodable() {
        let result = decode("data.csv", b"\xff\xfe\xfd");
        assert!(!result.is_success());
        assert_eq!(result.failure(), Some(&DecodeFailure::Undecodable));
        assert_eq!(result.text(), None);
        assert_eq!(result.char_count(), None);
    }

    #[test]
    fn test_too_long_is_rejected_not_truncated() {
        let content = "a".repeat(20_000);
        let result = decode("big.py", content.as_bytes());
        assert!(!result.is_success());
        assert_eq!(result.text(), None);
        assert_eq!(
            result.failure(),
            Some(&DecodeFailure::TooLong {
                chars: 20_000,
                limit: MAX_FILE_CHARS
            })
        );
        assert_eq!(result.encoding(), Some("UTF-8"));
    }

    #[test]
    fn test_limit_counts_characters_not_bytes() {
        // 按字符计数，三字节字符也不超限
        let content = "あ".repeat(MAX_FILE_CHARS);
        let result = decode("kana.txt", content.as_bytes());
        assert!(result.is_success());
        assert_eq!(result.char_count(), Some(MAX_FILE_CHARS));

        let over = "あ".repeat(MAX_FILE_CHARS + 1);
        assert!(!decode("kana.txt", over.as_bytes()).is_success());
    }

    #[test]
    fn test_bom_is_stripped() {
        let result = decode("bom.txt", b"\xef\xbb\xbfhello");
        assert_eq!(result.text(), Some("hello"));
    }

    #[test]
    fn test_notebook_code_cells() {
        let notebook = r##"{
            "cells": [
                {"cell_type": "markdown", "source": ["# Title\n"]},
                {"cell_type": "code", "source": ["import os\n", "print(os.name)"]},
                {"cell_type": "raw", "source": "ignored"},
                {"cell_type": "code", "source": "x = 1"},
                {"cell_type": "markdown", "source": "notes"}
            ],
            "metadata": {},
            "nbformat": 4
        }"##;
        let result = decode("lesson.ipynb", notebook.as_bytes());
        assert!(result.is_success());
        assert_eq!(result.text(), Some("import os\nprint(os.name)\n\nx = 1"));
        assert_eq!(result.notebook(), NotebookSource::CodeCells(2));
    }

    #[test]
    fn test_notebook_tolerates_irregular_sources() {
        let notebook = r#"{
            "cells": [
                {"cell_type": "code", "source": null},
                {"cell_type": "code", "source": ["a = 1\n", 42, null, "b = 2"]},
                {"cell_type": "code"},
                {"cell_type": null, "source": "skipped"}
            ]
        }"#;
        let result = decode("odd.ipynb", notebook.as_bytes());
        assert!(result.is_success());
        assert_eq!(result.notebook(), NotebookSource::CodeCells(3));
        assert_eq!(result.text(), Some("\n\na = 1\nb = 2\n\n"));
    }

    #[test]
    fn test_notebook_parse_failure_falls_back_to_text() {
        let result = decode("broken.ipynb", b"{ not json");
        assert!(result.is_success());
        assert_eq!(result.text(), Some("{ not json"));
        assert_eq!(result.notebook(), NotebookSource::RawFallback);
    }

    #[test]
    fn test_custom_encoding_order() {
        let decoder = TextDecoder::new(vec![encoding_rs::WINDOWS_1252], 100);
        let result = decoder.decode(&UploadedFile::new("latin.txt", b"caf\xe9".to_vec()));
        assert_eq!(result.encoding(), Some("windows-1252"));
        assert_eq!(result.text(), Some("café"));
    }
}
