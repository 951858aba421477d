use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced to the console user.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("Initialize the configuration before using other commands.")]
    NotInitialized,
    #[error("Screen {0} already exists and is not finished!")]
    DuplicateScreen(String),
    #[error("No screen found with the name: {0}")]
    ScreenNotFound(String),
    #[error("Invalid screen option. Use '-r', '-s', or '-ls'.")]
    InvalidScreenOption,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type ShellResult<T> = Result<T, ShellError>;
