//! Processor registry: operator key -> handler.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;

use stagec_core::flow::OperatorDesc;

use crate::traits::Processor;

/// Lookup surface the compiler depends on.
pub trait ProcessorRegistry: Send + Sync {
    fn find(&self, desc: &OperatorDesc) -> Option<Arc<dyn Processor>>;
}

static EMPTY: Lazy<Arc<dyn Processor>> = Lazy::new(|| Arc::new(crate::pass::Empty));

/// The shared no-op placeholder for unregistered operators.
pub fn empty_processor() -> Arc<dyn Processor> {
    Arc::clone(&EMPTY)
}

#[derive(Default, Clone)]
pub struct Registry {
    processors: HashMap<String, Arc<dyn Processor>>,
}

impl Registry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in processor.
    pub fn with_builtins() -> Self {
        let mut r = Self::new();
        r.register("identity", crate::pass::Identity);
        r.register("pseudo", crate::pass::Pseudo);
        r.register("project", crate::map::Project);
        r.register("set", crate::map::Set);
        r.register("lookup", crate::lookup::Lookup);
        r.register("branch", crate::branch::Branch);
        r.register("fold", crate::fold::Fold);
        r.register("cogroup", crate::cogroup::CoGroup);
        r
    }

    pub fn register(&mut self, key: impl Into<String>, processor: impl Processor) {
        self.processors.insert(key.into(), Arc::new(processor));
    }

    pub fn register_arc(&mut self, key: impl Into<String>, processor: Arc<dyn Processor>) {
        self.processors.insert(key.into(), processor);
    }

    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.processors.keys().map(|k| k.as_str()).collect();
        keys.sort_unstable();
        keys
    }
}

impl ProcessorRegistry for Registry {
    fn find(&self, desc: &OperatorDesc) -> Option<Arc<dyn Processor>> {
        self.processors.get(&desc.key).cloned()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("keys", &self.keys()).finish()
    }
}
