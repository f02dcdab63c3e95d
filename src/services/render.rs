//! Markdown 终端渲染
//! 使用 pulldown-cmark 的 Pull 模式把模型输出转换为适合终端显示的文本

use colored::Colorize;
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

/// 渲染选项
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub color: bool,
    pub width: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            color: true,
            width: 60,
        }
    }
}

/// 列表状态：有序列表记录下一个序号
#[derive(Debug)]
enum ListKind {
    Bullet,
    Ordered(u64),
}

struct TerminalRenderer {
    options: RenderOptions,
    output: String,
    lists: Vec<ListKind>,
    in_code_block: bool,
    heading: Option<HeadingLevel>,
    strong: bool,
    emphasis: bool,
    link_target: Option<String>,
    quote_depth: usize,
    table_cells: usize,
}

impl TerminalRenderer {
    fn new(options: RenderOptions) -> Self {
        Self {
            options,
            output: String::new(),
            lists: Vec::new(),
            in_code_block: false,
            heading: None,
            strong: false,
            emphasis: false,
            link_target: None,
            quote_depth: 0,
            table_cells: 0,
        }
    }

    fn ensure_newline(&mut self) {
        if !self.output.is_empty() && !self.output.ends_with('\n') {
            self.output.push('\n');
        }
    }

    fn blank_line(&mut self) {
        self.ensure_newline();
        if !self.output.is_empty() && !self.output.ends_with("\n\n") {
            self.output.push('\n');
        }
    }

    /// 引用块内每行开头加竖线
    fn line_prefix(&mut self) {
        if self.quote_depth > 0 && (self.output.is_empty() || self.output.ends_with('\n')) {
            self.output.push_str(&"│ ".repeat(self.quote_depth));
        }
    }

    fn styled(&self, text: &str) -> String {
        if !self.options.color {
            return text.to_string();
        }
        if self.heading.is_some() {
            text.bright_cyan().bold().to_string()
        } else if self.strong {
            text.bold().to_string()
        } else if self.emphasis {
            text.italic().to_string()
        } else {
            text.to_string()
        }
    }

    fn push_text(&mut self, text: &str) {
        if self.in_code_block {
            for line in text.lines() {
                self.line_prefix();
                let line = format!("    {}", line);
                if self.options.color {
                    self.output.push_str(&line.bright_yellow().to_string());
                } else {
                    self.output.push_str(&line);
                }
                self.output.push('\n');
            }
            return;
        }
        self.line_prefix();
        let styled = self.styled(text);
        self.output.push_str(&styled);
    }

    fn process_event(&mut self, event: Event) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                self.blank_line();
                self.heading = Some(level);
                if level == HeadingLevel::H1 || level == HeadingLevel::H2 {
                    // 保留层级提示
                    let marker = if level == HeadingLevel::H1 { "■ " } else { "▶ " };
                    let marker = self.styled(marker);
                    self.output.push_str(&marker);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                self.heading = None;
                self.output.push('\n');
            }
            Event::Start(Tag::Paragraph) => {
                if self.lists.is_empty() && self.quote_depth == 0 {
                    self.blank_line();
                }
            }
            Event::End(TagEnd::Paragraph) => {
                self.ensure_newline();
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                self.blank_line();
                self.in_code_block = true;
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        let label = format!("    [{}]", lang);
                        if self.options.color {
                            self.output.push_str(&label.bright_black().to_string());
                        } else {
                            self.output.push_str(&label);
                        }
                        self.output.push('\n');
                    }
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                self.in_code_block = false;
            }
            Event::Start(Tag::List(start)) => {
                if self.lists.is_empty() {
                    self.blank_line();
                } else {
                    self.ensure_newline();
                }
                self.lists.push(match start {
                    Some(n) => ListKind::Ordered(n),
                    None => ListKind::Bullet,
                });
            }
            Event::End(TagEnd::List(_)) => {
                self.lists.pop();
                self.ensure_newline();
            }
            Event::Start(Tag::Item) => {
                self.ensure_newline();
                let depth = self.lists.len().saturating_sub(1);
                let indent = "  ".repeat(depth);
                let bullet = match self.lists.last_mut() {
                    Some(ListKind::Ordered(n)) => {
                        let bullet = format!("{}. ", n);
                        *n += 1;
                        bullet
                    }
                    _ => "• ".to_string(),
                };
                self.line_prefix();
                self.output.push_str(&indent);
                self.output.push_str(&bullet);
            }
            Event::End(TagEnd::Item) => {
                self.ensure_newline();
            }
            Event::Start(Tag::Strong) => self.strong = true,
            Event::End(TagEnd::Strong) => self.strong = false,
            Event::Start(Tag::Emphasis) => self.emphasis = true,
            Event::End(TagEnd::Emphasis) => self.emphasis = false,
            Event::Start(Tag::Link { dest_url, .. }) => {
                self.link_target = Some(dest_url.to_string());
            }
            Event::End(TagEnd::Link) => {
                if let Some(url) = self.link_target.take() {
                    let suffix = format!(" <{}>", url);
                    if self.options.color {
                        self.output.push_str(&suffix.underline().to_string());
                    } else {
                        self.output.push_str(&suffix);
                    }
                }
            }
            Event::Start(Tag::BlockQuote) => {
                if self.quote_depth == 0 {
                    self.blank_line();
                } else {
                    self.ensure_newline();
                }
                self.quote_depth += 1;
            }
            Event::End(TagEnd::BlockQuote) => {
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.ensure_newline();
            }
            Event::Start(Tag::Table(_)) => {
                self.blank_line();
            }
            Event::End(TagEnd::Table) => {
                self.ensure_newline();
            }
            Event::Start(Tag::TableHead) | Event::Start(Tag::TableRow) => {
                self.ensure_newline();
                self.table_cells = 0;
            }
            Event::End(TagEnd::TableHead) => {
                // 表头下的分隔行
                let separator = vec!["---"; self.table_cells].join(" | ");
                self.output.push('\n');
                self.output.push_str(&separator);
                self.output.push('\n');
            }
            Event::End(TagEnd::TableRow) => {
                self.output.push('\n');
            }
            Event::Start(Tag::TableCell) => {
                if self.table_cells > 0 {
                    self.output.push_str(" | ");
                }
                self.table_cells += 1;
            }
            Event::Text(text) => self.push_text(&text),
            Event::Code(code) => {
                self.line_prefix();
                let code = format!("`{}`", code);
                if self.options.color {
                    self.output.push_str(&code.bright_yellow().to_string());
                } else {
                    self.output.push_str(&code);
                }
            }
            Event::SoftBreak => self.output.push(' '),
            Event::HardBreak => self.output.push('\n'),
            Event::Rule => {
                self.blank_line();
                self.output.push_str(&"─".repeat(self.options.width));
                self.output.push('\n');
            }
            Event::Html(html) => self.output.push_str(&html),
            _ => {}
        }
    }

    fn finish(self) -> String {
        self.output.trim_end().to_string()
    }
}

/// 将 Markdown 渲染为终端文本
pub fn render_markdown(content: &str, options: RenderOptions) -> String {
    let mut parser_options = Options::empty();
    parser_options.insert(Options::ENABLE_STRIKETHROUGH);
    parser_options.insert(Options::ENABLE_TABLES);
    parser_options.insert(Options::ENABLE_TASKLISTS);

    let mut renderer = TerminalRenderer::new(options);
    for event in Parser::new_ext(content, parser_options) {
        renderer.process_event(event);
    }
    renderer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(content: &str) -> String {
        render_markdown(
            content,
            RenderOptions {
                color: false,
                width: 10,
            },
        )
    }

    #[test]
    fn test_headings_and_paragraphs() {
        let rendered = plain("# タイトル\n\n本文です。\n\n## 小見出し\n続き");
        assert_eq!(rendered, "■ タイトル\n\n本文です。\n\n▶ 小見出し\n\n続き");
    }

    #[test]
    fn test_lists() {
        let rendered = plain("- one\n- two\n\n1. first\n2. second");
        assert!(rendered.contains("• one\n• two"));
        assert!(rendered.contains("1. first\n2. second"));
    }

    #[test]
    fn test_code_block_is_indented() {
        let rendered = plain("```python\nprint(1)\nx = 2\n```");
        assert_eq!(rendered, "    [python]\n    print(1)\n    x = 2");
    }

    #[test]
    fn test_inline_code_and_links() {
        let rendered = plain("use `len()` see [docs](https://docs.python.org/)");
        assert_eq!(rendered, "use `len()` see docs <https://docs.python.org/>");
    }

    #[test]
    fn test_rule_uses_width() {
        let rendered = plain("a\n\n---\n\nb");
        assert!(rendered.contains(&"─".repeat(10)));
    }

    #[test]
    fn test_table_cells_are_separated() {
        let rendered = plain("| 型 | 例 |\n|---|---|\n| int | 1 |\n| str | \"a\" |");
        assert_eq!(rendered, "型 | 例\n--- | ---\nint | 1\nstr | \"a\"");
    }

    #[test]
    fn test_block_quote_prefixes_lines() {
        let rendered = plain("前文\n\n> 注意\n> 二行目\n>\n> 続き\n\n後文");
        assert_eq!(rendered, "前文\n\n│ 注意 二行目\n│ 続き\n\n後文");
    }
}
