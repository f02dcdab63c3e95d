// 服务模块
// 提供核心业务逻辑服务

pub mod decoder;
pub mod gemini;
pub mod prompt;
pub mod quiz;
pub mod render;

pub use decoder::{
    extract_notebook_code,
    DecodeFailure,
    DecodedText,
    NotebookSource,
    TextDecoder,
    MAX_FILE_CHARS,
};

pub use gemini::{
    ConfigError,
    GeminiClient,
    GeminiConfig,
    GenerationError,
    GenerationService,
};

pub use prompt::StudyPrompt;

pub use quiz::{is_quiz_line, split_quiz, QUIZ_MARKER};

pub use render::{render_markdown, RenderOptions};
