//! The error type shared by every reader in this crate.
use std::collections::TryReserveError;

use thiserror::Error;

/// Everything that can make a parse give up.
///
/// Content-level problems in text formats (bad numbers, unknown directives,
/// dangling material names) are not errors; they are logged and the parse
/// carries on with defaults.
#[derive(Debug, Error)]
pub enum Error {
  /// A required input was missing or had zero length.
  #[error("invalid parameter: {0}")]
  InvalidParameter(&'static str),
  /// The buffer produced no lines at all.
  #[error("input contains no lines")]
  EmptyInput,
  /// The resource collaborator has nothing under this path.
  #[error("resource not found: {0}")]
  ResourceNotFound(String),
  /// A referenced file (material library, texture) could not be read.
  #[error("failed to read `{file}`: {reason}")]
  FileOperation {
    /// The file name as written in the referencing document.
    file: String,
    /// Why the read failed.
    reason: String,
  },
  /// The data is not in a format or version this crate reads.
  #[error("unsupported format: {0}")]
  UnsupportedFormat(String),
  /// A binary section points outside the buffer or is otherwise inconsistent.
  #[error("malformed input: {0}")]
  MalformedInput(String),
  /// An output buffer could not be allocated.
  #[error("allocation failed: {0}")]
  Allocation(#[from] TryReserveError),
}

impl From<binrw::Error> for Error {
  fn from(err: binrw::Error) -> Error {
    Error::MalformedInput(err.to_string())
  }
}

/// Shorthand used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Creates an empty vector with room for exactly `n` elements, failing
/// instead of aborting when the allocation cannot be satisfied.
pub(crate) fn vec_with_capacity<T>(n: usize) -> Result<Vec<T>> {
  let mut v = Vec::new();
  v.try_reserve_exact(n)?;
  Ok(v)
}

#[test]
fn test_reserve_failure_is_reported() {
  let r = vec_with_capacity::<u64>(usize::MAX);
  assert!(matches!(r, Err(Error::Allocation(_))));
}

#[test]
fn test_binrw_errors_become_malformed_input() {
  use binrw::BinRead;
  use std::io::Cursor;

  let err = u32::read_le(&mut Cursor::new([0u8; 2])).unwrap_err();
  match Error::from(err) {
    Error::MalformedInput(_) => {}
    other => panic!("unexpected {:?}", other),
  }
}
