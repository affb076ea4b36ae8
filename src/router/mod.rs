//! Routing
//!
//! Everything decided before the first backend call: which task family a
//! request belongs to, which models form its escalation ladder, and which
//! decoding options every candidate of that family uses.

mod classifier;
pub mod decoding;
mod registry;

pub use classifier::Classifier;
pub use decoding::DecodingOptions;
pub use registry::{ModelInfo, ModelRegistry};

use std::collections::BTreeMap;

use crate::ai::validation::Signal;
use crate::config::{Config, RouteConfig};
use crate::types::{EscalatorError, Result, TaskFamily};

/// Model selection argument that defers to the task map
pub const AUTO_MODEL: &str = "auto";

/// Immutable routing tables built once from [`Config`]
#[derive(Debug, Clone)]
pub struct Router {
    classifier: Classifier,
    registry: ModelRegistry,
    task_map: BTreeMap<String, RouteConfig>,
    escalate_on: Vec<Signal>,
}

impl Router {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            classifier: Classifier::from_config(&config.routing)?,
            registry: ModelRegistry::new(&config.models),
            task_map: config.routing.task_map.clone(),
            escalate_on: config.routing.escalate_on.clone(),
        })
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    fn route(&self, family: &TaskFamily) -> Result<&RouteConfig> {
        self.task_map.get(family.as_str()).ok_or_else(|| {
            EscalatorError::unknown_key("task family", family.as_str(), self.task_map.keys())
        })
    }

    /// Starting model for `family`
    pub fn initial(&self, family: &TaskFamily) -> Result<ModelInfo> {
        self.registry.resolve(&self.route(family)?.initial)
    }

    /// Escalation chain for `family`, weakest first
    pub fn chain(&self, family: &TaskFamily) -> Result<Vec<ModelInfo>> {
        self.route(family)?
            .chain
            .iter()
            .map(|name| self.registry.resolve(name))
            .collect()
    }

    /// Models tried for one request: the starting model followed by the
    /// chain, without repeating the starting model when it heads the chain.
    /// `pinned` of `None` or `"auto"` starts from the task map's initial model.
    pub fn ladder(&self, family: &TaskFamily, pinned: Option<&str>) -> Result<Vec<ModelInfo>> {
        let start = match pinned {
            Some(name) if name != AUTO_MODEL => self.registry.resolve(name)?,
            _ => self.initial(family)?,
        };
        let chain = self.chain(family)?;

        let mut ladder = Vec::with_capacity(chain.len() + 1);
        let skip_head = chain.first().is_some_and(|head| head.key == start.key);
        ladder.push(start);
        ladder.extend(chain.into_iter().skip(usize::from(skip_head)));
        Ok(ladder)
    }

    /// A signal set forces escalation when it intersects `routing.escalate_on`
    pub fn must_escalate(&self, signals: &[Signal]) -> bool {
        signals.iter().any(|s| self.escalate_on.contains(s))
    }
}
