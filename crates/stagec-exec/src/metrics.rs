//! Record counters for one exchange and the per-stage compile summary.
//!
//! Both are logged at debug level when the `tracing` feature is on.

use serde::Serialize;

use stagec_core::manifest::CompileManifest;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExchangeStats {
    /// Records fed to the map task.
    pub input_records: usize,
    /// Records written by the map task.
    pub shuffled: usize,
    /// Records left after the combine task; equals `shuffled` without one.
    pub combined: usize,
    pub partitions: u32,
    /// Groups handed to the reduce task, summed over partitions.
    pub groups: usize,
    pub sink_records: usize,
}

impl ExchangeStats {
    #[cfg(feature = "tracing")]
    pub fn report(&self, stage: u32) {
        tracing::debug!(
            stage,
            input_records = self.input_records,
            shuffled = self.shuffled,
            combined = self.combined,
            partitions = self.partitions,
            groups = self.groups,
            sink_records = self.sink_records,
            "exchange finished"
        );
    }

    #[cfg(not(feature = "tracing"))]
    pub fn report(&self, _stage: u32) {}
}

#[cfg(feature = "tracing")]
pub fn report_compiled(manifest: &CompileManifest) {
    tracing::debug!(
        stage = manifest.stage,
        map_units = manifest.map_units,
        reduce_units = manifest.reduce_units,
        segments = manifest.segments,
        combinable = manifest.combinable,
        fingerprint = %manifest.fingerprint().to_hex(),
        "stage compiled"
    );
}

#[cfg(not(feature = "tracing"))]
pub fn report_compiled(_manifest: &CompileManifest) {}
