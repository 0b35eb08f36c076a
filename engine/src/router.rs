//! Route-keyed message handler registry.

use std::collections::BTreeMap;

use basalt_primitives::ExecResult;

use crate::context::Context;
use crate::error::EngineError;

/// What a successful message handler returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MsgResult {
    pub data: Vec<u8>,
    pub log: String,
}

/// A message handler. Events go through the context.
pub type Handler<M> = Box<dyn Fn(&mut Context<'_>, &M) -> ExecResult<MsgResult> + Send + Sync>;

pub struct Router<M> {
    routes: BTreeMap<String, Handler<M>>,
}

impl<M> Default for Router<M> {
    fn default() -> Self {
        Self {
            routes: BTreeMap::new(),
        }
    }
}

impl<M> Router<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `route`. Routes must be non-empty,
    /// alphanumeric, and unique.
    pub fn add_route(
        &mut self,
        route: &str,
        handler: Handler<M>,
    ) -> Result<&mut Self, EngineError> {
        if route.is_empty() || !route.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(EngineError::InvalidRoute(route.to_string()));
        }
        if self.routes.contains_key(route) {
            return Err(EngineError::DuplicateRoute(route.to_string()));
        }
        self.routes.insert(route.to_string(), handler);
        Ok(self)
    }

    pub fn route(&self, route: &str) -> Option<&Handler<M>> {
        self.routes.get(route)
    }

    pub fn has_route(&self, route: &str) -> bool {
        self.routes.contains_key(route)
    }
}
