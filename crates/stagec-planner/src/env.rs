//! Compile environment threaded through every phase of one stage pass.

use std::sync::Arc;

use stagec_core::config::CompilerConfig;
use stagec_core::diag::Diagnostics;
use stagec_core::schema::ShapeRegistry;
use stagec_operators::registry::ProcessorRegistry;

#[derive(Clone)]
pub struct CompileEnv {
    pub config: CompilerConfig,
    pub processors: Arc<dyn ProcessorRegistry>,
    pub shapes: Arc<dyn ShapeRegistry>,
    pub diagnostics: Arc<Diagnostics>,
}

impl CompileEnv {
    pub fn new(
        config: CompilerConfig,
        processors: Arc<dyn ProcessorRegistry>,
        shapes: Arc<dyn ShapeRegistry>,
    ) -> Self {
        Self {
            config,
            processors,
            shapes,
            diagnostics: Arc::new(Diagnostics::new()),
        }
    }

    /// Share an existing sink (parallel stage passes report to one place).
    pub fn with_diagnostics(mut self, diagnostics: Arc<Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn has_error(&self) -> bool {
        self.diagnostics.has_error()
    }

    pub fn error(&self, phase: &str, message: impl Into<String>) {
        self.diagnostics.error(phase, message);
    }
}

impl std::fmt::Debug for CompileEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompileEnv")
            .field("config", &self.config)
            .field("errors", &self.diagnostics.error_count())
            .finish()
    }
}
