//! Ordered, name-keyed registry of agent factories.
//!
//! The registry decides which stages run and in what order. Callers swap a
//! stage by registering a factory under the same name; new names append to
//! the end of the sequence.

use crate::agent::Agent;
use crate::agents::{AudioAgent, BackupAgent, CaptionsAgent, ThumbnailsAgent, VideoAgent};

/// Constructor for a pipeline stage.
pub type AgentFactory = Box<dyn Fn() -> Box<dyn Agent> + Send + Sync>;

/// Ordered collection of named agent factories.
pub struct AgentRegistry {
    factories: Vec<(String, AgentFactory)>,
}

impl AgentRegistry {
    /// An empty registry with no stages.
    pub fn empty() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// The standard five-stage pipeline in execution order.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register("backup", || Box::new(BackupAgent));
        registry.register("audio", || Box::new(AudioAgent));
        registry.register("captions", || Box::new(CaptionsAgent));
        registry.register("video", || Box::new(VideoAgent));
        registry.register("thumbnails", || Box::new(ThumbnailsAgent));
        registry
    }

    /// Register a factory under `name`.
    ///
    /// An existing entry with the same name is replaced in place, keeping
    /// its position in the sequence; a new name is appended.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn Agent> + Send + Sync + 'static,
    {
        let factory: AgentFactory = Box::new(factory);
        match self.factories.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = factory,
            None => self.factories.push((name.to_string(), factory)),
        }
    }

    /// Stage names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.factories.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Instantiate all registered agents in order.
    pub fn build(&self) -> Vec<Box<dyn Agent>> {
        self.factories.iter().map(|(_, f)| f()).collect()
    }

    /// Number of registered stages.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether no stages are registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
