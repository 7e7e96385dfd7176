//! Centralised error hierarchy for the **QuasiLang front-end**.
//!
//! All subsystems (reader, grouper, expression parser, CLI) convert their
//! internal failure modes into one of the variants defined here.  Every
//! diagnostic is a single value of kind + message + position, which enables a
//! uniform `Result<T>` alias throughout the crate and ergonomic
//! inter-operation with `anyhow` at the binary boundary, while still
//! preserving rich detail.
//!
//! The module **does not** print diagnostics itself.

use std::io;

use log::info;
use thiserror::Error;

use crate::token::Position;

/// Canonical error type used throughout the front-end.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuasiError {
    /// Lexical (tokenizer) error with source position information.
    #[error("[reader] {message} at <{position}>")]
    Lex {
        /// Human-readable description.
        message: String,

        /// Position of the reader when the error was raised.
        position: Position,
    },

    /// Structural error: misplaced separators and brackets, malformed
    /// expressions, mismatched group kinds.
    #[error("[grouper] {message} at <{position}>")]
    Structure { message: String, position: Position },

    /// Classification error: keyword patterns that do not fit any
    /// control-flow form.
    #[error("[identify] {message} at <{position}>")]
    Identify { message: String, position: Position },

    /// Node budget violation: a group cannot be squeezed below its limit.
    #[error("[budget] {message}")]
    Budget { message: String, position: Position },

    /// A placeholder could not be re-expanded from the source stream.
    #[error("[placeholder] re-expansion failed at <{position}>, first token \"{token}\": {source}")]
    Placeholder {
        position: Position,
        token: String,
        source: Box<QuasiError>,
    },

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// UTF-8 decoding failure when ingesting external text.
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl QuasiError {
    /// Helper constructor for the **reader**.
    pub fn lex<S: Into<String>>(msg: S, position: Position) -> Self {
        let message: String = msg.into();

        info!("lex error: {} at <{}>", message, position);

        QuasiError::Lex { message, position }
    }

    /// Helper constructor for **structural** grouping failures.
    pub fn structure<S: Into<String>>(msg: S, position: Position) -> Self {
        let message: String = msg.into();

        info!("structure error: {} at <{}>", message, position);

        QuasiError::Structure { message, position }
    }

    /// Helper constructor for **classification** failures.
    pub fn identify<S: Into<String>>(msg: S, position: Position) -> Self {
        let message: String = msg.into();

        info!("identify error: {} at <{}>", message, position);

        QuasiError::Identify { message, position }
    }

    /// Helper constructor for **node budget** violations.
    pub fn budget<S: Into<String>>(msg: S, position: Position) -> Self {
        let message: String = msg.into();

        info!("budget error: {} at <{}>", message, position);

        QuasiError::Budget { message, position }
    }

    /// Wrap a failure raised while re-expanding a placeholder.
    pub fn placeholder(position: Position, token: String, inner: QuasiError) -> Self {
        info!("placeholder error at <{}>: {}", position, inner);

        QuasiError::Placeholder {
            position,
            token,
            source: Box::new(inner),
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, QuasiError>;
