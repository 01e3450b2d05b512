use std::collections::HashMap;

use deferscript_loader::{ApiError, ApiObject, CallPath, SharedApi};
use serde::de::DeserializeOwned;
use serde_json::Value;

type Handler = Box<dyn Fn(&[Value]) -> Result<Value, ApiError> + Send + Sync>;

/// An [`ApiObject`] assembled from closures keyed by path.
///
/// Exact paths are tried first, then mounted sub-objects by longest prefix.
#[derive(Default)]
pub struct DispatchTable {
  handlers: HashMap<CallPath, Handler>,
  mounts: Vec<(CallPath, SharedApi)>,
}

impl DispatchTable {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(
    mut self,
    path: impl Into<CallPath>,
    handler: impl Fn(&[Value]) -> Result<Value, ApiError> + Send + Sync + 'static,
  ) -> Self {
    self.insert(path, handler);
    self
  }

  pub fn insert(
    &mut self,
    path: impl Into<CallPath>,
    handler: impl Fn(&[Value]) -> Result<Value, ApiError> + Send + Sync + 'static,
  ) {
    self.handlers.insert(path.into(), Box::new(handler));
  }

  /// Delegate every path under `prefix` to `api`, with the prefix stripped.
  pub fn mount(mut self, prefix: impl Into<CallPath>, api: SharedApi) -> Self {
    self.mounts.push((prefix.into(), api));
    self
  }

  /// Registered handler paths, sorted.
  pub fn paths(&self) -> Vec<String> {
    let mut paths: Vec<_> = self.handlers.keys().map(|p| p.to_string()).collect();
    paths.sort();
    paths
  }
}

impl ApiObject for DispatchTable {
  fn invoke(&self, path: &CallPath, args: &[Value]) -> Result<Value, ApiError> {
    if let Some(handler) = self.handlers.get(path) {
      return handler(args);
    }

    let segments = path.segments();
    let mount = self
      .mounts
      .iter()
      .filter(|(prefix, _)| segments.starts_with(prefix.segments()))
      .max_by_key(|(prefix, _)| prefix.segments().len());

    match mount {
      Some((prefix, api)) => {
        let rest = CallPath::from(segments[prefix.segments().len()..].to_vec());
        api.invoke(&rest, args)
      }
      None => Err(ApiError::UnknownPath {
        path: path.to_string(),
      }),
    }
  }
}

impl std::fmt::Debug for DispatchTable {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("DispatchTable")
      .field("paths", &self.paths())
      .field("mounts", &self.mounts.len())
      .finish()
  }
}

/// Deserialize positional argument `index` for the call at `path`.
pub fn arg<T: DeserializeOwned>(path: &str, args: &[Value], index: usize) -> Result<T, ApiError> {
  let value = args.get(index).cloned().unwrap_or(Value::Null);
  serde_json::from_value(value).map_err(|e| ApiError::InvalidArguments {
    path: path.to_string(),
    message: format!("argument {}: {}", index, e),
  })
}
