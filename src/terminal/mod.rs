//! `zed`-style command interpreter.
//!
//! A command line is tokenized, parsed into a [`command::Command`], resolved
//! against the registry in [`dispatch`] and handed to a [`CommandExecutor`].
//! Two executors exist: [`api::ApiExecutor`] talks to the SpiceDB HTTP
//! gateway directly, [`process::ProcessExecutor`] runs the real `zed` binary.

pub mod api;
pub mod command;
pub mod dispatch;
pub mod process;
pub mod result;
pub mod tokenizer;

use std::sync::Arc;

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use crate::errors::ConsoleError;
use crate::settings::{Settings, Strategy};
use crate::spicedb::SpiceDbClient;
use dispatch::{Dispatcher, Invocation};
use result::ExecutionResult;

/// Input rejected before dispatch.
#[derive(Debug, Error, Diagnostic)]
pub enum CommandError {
    #[error("Command is required")]
    #[diagnostic(code(zedconsole::terminal::empty))]
    Empty,

    #[error("Command must start with \"zed\" (got `{0}`)")]
    #[diagnostic(
        code(zedconsole::terminal::wrong_root),
        help("Commands look like: zed schema read")
    )]
    WrongRoot(String),

    #[error("Command contains disallowed character `{0}`")]
    #[diagnostic(
        code(zedconsole::terminal::disallowed_character),
        help("Shell metacharacters ; & | > < ` $ are not accepted")
    )]
    DisallowedCharacter(char),
}

/// Runs a resolved command and reports the outcome as data.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, invocation: &Invocation) -> ExecutionResult;

    /// Whether command text reaches a child process, which turns on
    /// metacharacter screening.
    fn spawns_process(&self) -> bool {
        false
    }
}

/// Build the dispatcher for the configured execution strategy.
pub fn dispatcher_from_settings(settings: &Settings) -> Result<Dispatcher, ConsoleError> {
    let executor: Arc<dyn CommandExecutor> = match settings.terminal.strategy {
        Strategy::Api => Arc::new(api::ApiExecutor::new(SpiceDbClient::new(
            &settings.spicedb,
        )?)),
        Strategy::Process => Arc::new(process::ProcessExecutor::new(
            &settings.terminal,
            &settings.spicedb,
        )),
    };
    tracing::info!(
        strategy = ?settings.terminal.strategy,
        flag_mode = ?settings.terminal.flag_mode,
        "Terminal executor configured"
    );
    Ok(Dispatcher::new(executor, settings.terminal.flag_mode))
}
