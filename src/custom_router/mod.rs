//! Custom Router Loader (spec §4.6): loads an operator-supplied script exposing a
//! `route(request, config)` function, sandboxed with bounded execution limits.
//!
//! The spec leaves the evaluation mechanism an implementation choice; this gateway
//! uses `rhai` as a safe, embeddable scripting engine rather than shelling out to an
//! external interpreter.

use rhai::{Dynamic, Engine, Scope, AST};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CustomRouterError {
    #[error("failed to read custom router script {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("custom router script {path} failed to compile: {source}")]
    Compile {
        path: PathBuf,
        #[source]
        source: Box<rhai::ParseError>,
    },
    #[error("custom router script raised an error: {0}")]
    Evaluation(String),
    #[error("custom router returned a non-string route: {0}")]
    InvalidReturn(String),
}

fn sandboxed_engine() -> Engine {
    let mut engine = Engine::new();
    engine.set_max_operations(500_000);
    engine.set_max_expr_depths(64, 64);
    engine.set_max_string_size(1 << 20);
    engine.set_max_array_size(10_000);
    engine.set_max_map_size(10_000);
    engine
}

/// A compiled, ready-to-invoke custom router script.
pub struct CustomRouter {
    engine: Engine,
    ast: AST,
    path: PathBuf,
}

impl CustomRouter {
    /// Compile the script at `path`. Does not execute it.
    pub fn load(path: &Path) -> Result<Self, CustomRouterError> {
        let source = std::fs::read_to_string(path).map_err(|source| CustomRouterError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let engine = sandboxed_engine();
        let ast = engine
            .compile(&source)
            .map_err(|source| CustomRouterError::Compile {
                path: path.to_path_buf(),
                source: Box::new(source),
            })?;
        Ok(Self {
            engine,
            ast,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Invoke `route(request, config)`, returning the chosen `"provider,model"` string,
    /// or `None` if the script returns an empty string to defer to the normal rules
    /// (spec §4.6: an empty return means "no opinion", not an invalid one).
    pub fn route(
        &self,
        request: &serde_json::Value,
        config: &serde_json::Value,
    ) -> Result<Option<String>, CustomRouterError> {
        let request_dynamic = json_to_dynamic(request);
        let config_dynamic = json_to_dynamic(config);
        let mut scope = Scope::new();

        let result: Dynamic = self
            .engine
            .call_fn(&mut scope, &self.ast, "route", (request_dynamic, config_dynamic))
            .map_err(|err| CustomRouterError::Evaluation(err.to_string()))?;

        let target = result
            .into_string()
            .map_err(|ty| CustomRouterError::InvalidReturn(ty.to_string()))?;
        if target.is_empty() {
            Ok(None)
        } else {
            Ok(Some(target))
        }
    }
}

/// A loader holding the last successfully compiled router, so a reload that fails to
/// compile leaves routing on the previous binding instead of falling over (spec §4.6:
/// "a script that fails to load or evaluate must not take down routing").
#[derive(Clone, Default)]
pub struct CustomRouterSlot {
    current: Option<Arc<CustomRouter>>,
}

impl CustomRouterSlot {
    pub fn empty() -> Self {
        Self { current: None }
    }

    pub fn get(&self) -> Option<Arc<CustomRouter>> {
        self.current.clone()
    }

    /// Attempt to (re)load from `path`. On success, replaces the active binding and
    /// returns it. On failure, the prior binding (if any) is left untouched and the
    /// error is returned for the caller to log/surface.
    pub fn reload(&mut self, path: &Path) -> Result<Arc<CustomRouter>, CustomRouterError> {
        let router = Arc::new(CustomRouter::load(path)?);
        self.current = Some(router.clone());
        Ok(router)
    }
}

fn json_to_dynamic(value: &serde_json::Value) -> Dynamic {
    match value {
        serde_json::Value::Null => Dynamic::UNIT,
        serde_json::Value::Bool(b) => Dynamic::from(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Dynamic::from(i)
            } else {
                Dynamic::from(n.as_f64().unwrap_or_default())
            }
        }
        serde_json::Value::String(s) => Dynamic::from(s.clone()),
        serde_json::Value::Array(items) => {
            Dynamic::from(items.iter().map(json_to_dynamic).collect::<Vec<_>>())
        }
        serde_json::Value::Object(map) => {
            let mut rhai_map = rhai::Map::new();
            for (k, v) in map {
                rhai_map.insert(k.as_str().into(), json_to_dynamic(v));
            }
            Dynamic::from_map(rhai_map)
        }
    }
}
