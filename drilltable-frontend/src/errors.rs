use drilltable_core::errors::DocumentError;
use drilltable_engine::errors::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("命令 {command} 执行失败: {message}")]
    CommandFailed { command: String, message: String },
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Document(#[from] DocumentError),
}
