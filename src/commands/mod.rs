// 命令模块
// 会话流程与终端前端

pub mod session;
pub mod terminal;

pub use session::{FlowError, Phase, PreparedRequest, SessionFlow, SessionState};

pub use terminal::{
    load_upload,
    run,
    FormDefaults,
    InputProvider,
    RunOptions,
    TerminalInput,
    TerminalView,
    UserAction,
};
