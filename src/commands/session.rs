//! 会话流程控制
//! 会话状态是一个显式的值，状态迁移为纯函数；`SessionFlow` 持有生成服务并驱动迁移

use thiserror::Error;
use uuid::Uuid;

use crate::models::{GeneratedAnswer, Goal, GradingResult, Submission};
use crate::services::decoder::{DecodedText, TextDecoder};
use crate::services::gemini::{GenerationError, GenerationService};
use crate::services::prompt::StudyPrompt;

/// 流程错误。校验类错误不改变状态
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("解答を入力してください。")]
    EmptyAnswer,
    #[error("採点できるクイズがありません。先に「プログラミング学習」で解説を生成してください。")]
    NoActiveQuiz,
    #[error("回答の生成中にエラーが発生しました: {0}")]
    Generation(#[source] GenerationError),
    #[error("採点中にエラーが発生しました: {0}")]
    Grading(#[source] GenerationError),
}

impl FlowError {
    /// 是否为输入校验错误
    pub fn is_validation(&self) -> bool {
        matches!(self, FlowError::EmptyAnswer | FlowError::NoActiveQuiz)
    }
}

/// 会话所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Answered,
    QuizPending,
    Graded,
}

/// 会话状态
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    answer: Option<GeneratedAnswer>,
    goal: Option<Goal>,
    quiz_active: bool,
    quiz_evaluated: bool,
    feedback: Option<GradingResult>,
    last_prompt: Option<String>,
}

impl SessionState {
    /// 生成成功后的新状态，覆盖之前的一切
    pub fn generated(prompt: String, goal: Goal, answer: GeneratedAnswer) -> Self {
        let quiz_active = goal == Goal::Learning && answer.quiz.is_some();
        Self {
            answer: Some(answer),
            goal: Some(goal),
            quiz_active,
            quiz_evaluated: false,
            feedback: None,
            last_prompt: Some(prompt),
        }
    }

    /// 评分成功后的新状态。测验仍可再次作答
    pub fn graded(self, feedback: GradingResult) -> Self {
        Self {
            quiz_evaluated: true,
            feedback: Some(feedback),
            ..self
        }
    }

    /// 评分失败后回到待作答，不保留上一次的评分
    pub fn grading_failed(self) -> Self {
        Self {
            quiz_evaluated: false,
            feedback: None,
            ..self
        }
    }

    pub fn phase(&self) -> Phase {
        match (&self.answer, self.quiz_active, self.quiz_evaluated) {
            (None, _, _) => Phase::Idle,
            (Some(_), true, true) => Phase::Graded,
            (Some(_), true, false) => Phase::QuizPending,
            (Some(_), false, _) => Phase::Answered,
        }
    }

    pub fn answer(&self) -> Option<&GeneratedAnswer> {
        self.answer.as_ref()
    }

    pub fn goal(&self) -> Option<Goal> {
        self.goal
    }

    pub fn quiz(&self) -> Option<&str> {
        if self.quiz_active {
            self.answer.as_ref().and_then(|answer| answer.quiz.as_deref())
        } else {
            None
        }
    }

    pub fn is_quiz_active(&self) -> bool {
        self.quiz_active
    }

    pub fn is_quiz_evaluated(&self) -> bool {
        self.quiz_evaluated
    }

    pub fn feedback(&self) -> Option<&GradingResult> {
        self.feedback.as_ref()
    }

    pub fn last_prompt(&self) -> Option<&str> {
        self.last_prompt.as_deref()
    }

    /// 学习目的下未能提取到测验
    pub fn quiz_missing(&self) -> bool {
        self.goal == Some(Goal::Learning) && self.answer.is_some() && !self.quiz_active
    }
}

/// 已组装好的请求
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub goal: Goal,
    pub prompt: String,
    pub file: Option<DecodedText>,
}

/// 会话驱动器
pub struct SessionFlow<G: GenerationService> {
    generator: G,
    decoder: TextDecoder,
    state: SessionState,
    session_id: Uuid,
}

impl<G: GenerationService> SessionFlow<G> {
    pub fn new(generator: G) -> Self {
        Self::with_decoder(generator, TextDecoder::default())
    }

    pub fn with_decoder(generator: G, decoder: TextDecoder) -> Self {
        let session_id = Uuid::new_v4();
        log::info!("[{}] session started", session_id);
        Self {
            generator,
            decoder,
            state: SessionState::default(),
            session_id,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// 解码上传文件并组装提示词，不调用生成服务
    pub fn prepare(&self, submission: &Submission) -> PreparedRequest {
        let file = submission
            .file
            .as_ref()
            .map(|upload| self.decoder.decode(upload));
        let prompt = StudyPrompt::request(&submission.selection, file.as_ref());

        let selection = &submission.selection;
        log::info!(
            "[{}] submission: language={} goal={} level={} problem={} file={} prompt_chars={}",
            self.session_id,
            selection.language,
            selection.goal,
            selection.level,
            selection.problem.is_some(),
            file.as_ref()
                .map(|decoded| match decoded.failure() {
                    None => format!("{} (ok)", decoded.file_name()),
                    Some(failure) => format!("{} ({})", decoded.file_name(), failure),
                })
                .unwrap_or_else(|| "none".to_string()),
            prompt.chars().count()
        );

        PreparedRequest {
            goal: selection.goal,
            prompt,
            file,
        }
    }

    /// 发送请求。失败时清空会话状态
    pub async fn generate(
        &mut self,
        request: PreparedRequest,
    ) -> Result<&SessionState, FlowError> {
        match self.generator.generate(&request.prompt).await {
            Ok(raw) => {
                let answer = GeneratedAnswer::for_goal(raw, request.goal);
                log::info!(
                    "[{}] answer generated: chars={} quiz_found={}",
                    self.session_id,
                    answer.raw.chars().count(),
                    answer.quiz.is_some()
                );
                self.state = SessionState::generated(request.prompt, request.goal, answer);
                Ok(&self.state)
            }
            Err(e) => {
                log::error!("[{}] generation failed: {}", self.session_id, e);
                self.state = SessionState::default();
                Err(FlowError::Generation(e))
            }
        }
    }

    /// 提交测验解答。用户输入原样嵌入评分提示词
    pub async fn answer_quiz(&mut self, answer: &str) -> Result<GradingResult, FlowError> {
        let original = match (self.state.is_quiz_active(), self.state.answer()) {
            (true, Some(generated)) => generated.raw.clone(),
            _ => {
                log::warn!("[{}] quiz answer without an active quiz", self.session_id);
                return Err(FlowError::NoActiveQuiz);
            }
        };
        if answer.trim().is_empty() {
            return Err(FlowError::EmptyAnswer);
        }

        let prompt = StudyPrompt::grading(&original, answer);
        match self.generator.generate(&prompt).await {
            Ok(feedback) => {
                log::info!(
                    "[{}] quiz graded: answer_chars={} feedback_chars={}",
                    self.session_id,
                    answer.chars().count(),
                    feedback.chars().count()
                );
                let result = GradingResult { feedback };
                let state = std::mem::take(&mut self.state);
                self.state = state.graded(result.clone());
                Ok(result)
            }
            Err(e) => {
                log::error!("[{}] grading failed: {}", self.session_id, e);
                let state = std::mem::take(&mut self.state);
                self.state = state.grading_failed();
                Err(FlowError::Grading(e))
            }
        }
    }

    /// 清空会话
    pub fn clear(&mut self) {
        log::info!("[{}] session cleared", self.session_id);
        self.state = SessionState::default();
    }
}
