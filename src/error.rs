//! Shared error utilities used across the compilation pipeline.
//!
//! Diagnostics are kept lightweight on purpose – one variant per failure
//! class, each anchored at the 1-based line/column of the offending token.
//! Every stage fails fast: the first error aborts the compilation and no
//! partial assembly is surfaced.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
pub enum CompileError {
  /// A byte in the input matched no lexical rule.
  #[snafu(display("{line}:{col}: lexical error: {message}"))]
  Lexical {
    line: u32,
    col: u32,
    message: String,
  },

  /// A construct did not match the expected token shape.
  #[snafu(display("{line}:{col}: syntax error: {message}"))]
  Syntax {
    line: u32,
    col: u32,
    message: String,
  },

  /// The program parsed but cannot be lowered (undefined variable,
  /// store through a non-pointer, value that fits no register).
  #[snafu(display("{line}:{col}: error: {message}"))]
  Semantic {
    line: u32,
    col: u32,
    message: String,
  },
}

impl CompileError {
  /// Construct a lexical error anchored at a source position.
  pub fn lexical(line: u32, col: u32, message: impl Into<String>) -> Self {
    Self::Lexical {
      line,
      col,
      message: message.into(),
    }
  }

  /// Construct a syntax error anchored at a source position.
  pub fn syntax(line: u32, col: u32, message: impl Into<String>) -> Self {
    Self::Syntax {
      line,
      col,
      message: message.into(),
    }
  }

  /// Construct a semantic error anchored at a source position.
  pub fn semantic(line: u32, col: u32, message: impl Into<String>) -> Self {
    Self::Semantic {
      line,
      col,
      message: message.into(),
    }
  }
}
