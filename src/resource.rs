//! Resolution of files referenced from inside a model, such as the material
//! library named by `mtllib`.
//!
//! The readers never touch the file system. Whoever calls them supplies a
//! [`ResourceLoader`] that knows where the bytes live: an archive, an
//! embedded asset table, a network cache, or the disk.
use std::collections::HashMap;

use crate::error::{Error, Result};

/// Fetches the full contents of a referenced file.
pub trait ResourceLoader {
  /// Returns the bytes of `file`, interpreted relative to `working_dir`,
  /// or [`Error::ResourceNotFound`].
  fn load(&self, file: &str, working_dir: &str) -> Result<Vec<u8>>;
}

impl<F> ResourceLoader for F
where
  F: Fn(&str, &str) -> Result<Vec<u8>>,
{
  fn load(&self, file: &str, working_dir: &str) -> Result<Vec<u8>> {
    self(file, working_dir)
  }
}

/// A loader that has nothing. Useful for models without external references.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoResources;

impl ResourceLoader for NoResources {
  fn load(&self, file: &str, working_dir: &str) -> Result<Vec<u8>> {
    Err(Error::ResourceNotFound(resolve_path(file, working_dir)))
  }
}

/// Joins a referenced file name onto the directory of the referencing file.
pub fn resolve_path(file: &str, working_dir: &str) -> String {
  let path = if working_dir.is_empty() {
    file.to_owned()
  } else {
    format!("{}/{}", working_dir, file)
  };

  match path.strip_prefix("./") {
    Some(stripped) => stripped.to_owned(),
    None => path,
  }
}

/// An in-memory table of resources keyed by their resolved path.
#[derive(Clone, Debug, Default)]
pub struct ResourceMap {
  entries: HashMap<String, Vec<u8>>,
}

impl ResourceMap {
  /// An empty table.
  pub fn new() -> ResourceMap {
    ResourceMap::default()
  }

  /// Stores `data` under `path`, replacing whatever was there.
  pub fn insert<P: Into<String>, D: Into<Vec<u8>>>(&mut self, path: P, data: D) {
    self.entries.insert(path.into(), data.into());
  }

  /// Looks up a resolved path.
  pub fn get(&self, path: &str) -> Option<&[u8]> {
    self.entries.get(path).map(Vec::as_slice)
  }

  /// Number of stored resources.
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// Whether the table is empty.
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

impl ResourceLoader for ResourceMap {
  fn load(&self, file: &str, working_dir: &str) -> Result<Vec<u8>> {
    let path = resolve_path(file, working_dir);
    match self.get(&path) {
      Some(data) => Ok(data.to_vec()),
      None => Err(Error::ResourceNotFound(path)),
    }
  }
}

#[test]
fn test_resolve_path() {
  assert_eq!(resolve_path("a.mtl", ""), "a.mtl");
  assert_eq!(resolve_path("a.mtl", "models"), "models/a.mtl");
  assert_eq!(resolve_path("a.mtl", "."), "a.mtl");
  assert_eq!(resolve_path("./a.mtl", ""), "a.mtl");
}

#[test]
fn test_resource_map() {
  let mut res = ResourceMap::new();
  res.insert("models/cube.mtl", "newmtl A\n");

  assert_eq!(res.load("cube.mtl", "models").unwrap(), b"newmtl A\n".to_vec());
  match res.load("cube.mtl", "") {
    Err(Error::ResourceNotFound(path)) => assert_eq!(path, "cube.mtl"),
    other => panic!("unexpected {:?}", other),
  }
}

#[test]
fn test_closure_loader() {
  let loader = |file: &str, _: &str| -> Result<Vec<u8>> { Ok(file.as_bytes().to_vec()) };
  assert_eq!(loader.load("x", "y").unwrap(), b"x".to_vec());
  assert!(NoResources.load("x", "").is_err());
}
