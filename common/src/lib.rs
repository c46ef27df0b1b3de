/*
Copyright 2023 The Flame Authors.
Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at
    http://www.apache.org/licenses/LICENSE-2.0
Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

pub mod exec;
pub mod prompt;

use std::path::Path;

use thiserror::Error;
use time::macros::format_description;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{FromEnvError, LevelFilter, ParseError};
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::prelude::*;

#[derive(Error, Debug)]
pub enum JansError {
    #[error("'{0}' not found")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),

    #[error("{0}")]
    Network(String),

    #[error("{0}")]
    InvalidConfig(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("<{command}> failed (exit code: {code:?}): {output}")]
    Command {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl From<ParseError> for JansError {
    fn from(value: ParseError) -> Self {
        JansError::InvalidConfig(value.to_string())
    }
}

impl From<FromEnvError> for JansError {
    fn from(value: FromEnvError) -> Self {
        JansError::InvalidConfig(value.to_string())
    }
}

impl From<dialoguer::Error> for JansError {
    fn from(value: dialoguer::Error) -> Self {
        JansError::Internal(value.to_string())
    }
}

pub fn init_logger() -> Result<(), JansError> {
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?
        .add_directive("hyper_util=error".parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("rustls=warn".parse()?);

    let time_format = LocalTime::new(format_description!(
        "[hour repr:24]:[minute]:[second].[subsecond digits:3]"
    ));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(time_format)
        .with_ansi(false)
        .with_target(true)
        .init();

    Ok(())
}

/// Logs INFO and above to the console and everything down to DEBUG into
/// `<dir>/<file>`. Buffered lines are flushed when the guard is dropped.
pub fn init_file_logger(dir: &Path, file: &str) -> Result<WorkerGuard, JansError> {
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file));

    let console = tracing_subscriber::fmt::layer()
        .with_timer(LocalTime::new(format_description!(
            "[hour repr:24]:[minute]:[second].[subsecond digits:3]"
        )))
        .with_ansi(false)
        .with_target(false)
        .with_filter(LevelFilter::INFO);

    let logfile = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_timer(LocalTime::new(format_description!(
            "[year]-[month]-[day] [hour repr:24]:[minute]:[second].[subsecond digits:3]"
        )))
        .with_ansi(false)
        .with_target(true)
        .with_filter(LevelFilter::DEBUG);

    tracing_subscriber::registry()
        .with(console)
        .with(logfile)
        .try_init()
        .map_err(|e| JansError::Internal(e.to_string()))?;

    Ok(guard)
}
