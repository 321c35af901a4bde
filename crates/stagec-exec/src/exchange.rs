//! In-memory exchange: runs a compiled stage's tasks end to end.
//!
//! Map output is optionally combined (sorted and grouped locally), then
//! partitioned, sorted with the byte comparator and grouped with the
//! grouping comparator before every group reaches the reduce task.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Range;
use std::rc::Rc;

use stagec_core::block::BlockPortRef;
use stagec_core::types::Record;
use stagec_shuffle::compare::{ByteComparator, ObjectComparator};
use stagec_shuffle::key::ShuffleValue;

use crate::compiler::CompiledStage;
use crate::error::{ExecError, Result};
use crate::metrics::ExchangeStats;
use crate::runtime::{ShuffleBuffer, ShuffleEntry, SinkBuffer};

#[derive(Debug, Clone, Default)]
pub struct ExchangeOutput {
    /// Records per sink name.
    pub sinks: BTreeMap<String, Vec<Record>>,
    pub stats: ExchangeStats,
}

impl ExchangeOutput {
    /// `{ sink: [[v, ...], ...], ... }` with rows in emission order.
    pub fn to_json(&self) -> serde_json::Value {
        let sinks = self
            .sinks
            .iter()
            .map(|(name, records)| {
                let rows = records.iter().map(Record::to_json_row).collect();
                (name.clone(), serde_json::Value::Array(rows))
            })
            .collect();
        serde_json::Value::Object(sinks)
    }
}

pub struct LocalExchange<'c> {
    compiled: &'c CompiledStage,
    partitions: u32,
    verify: bool,
}

impl<'c> LocalExchange<'c> {
    pub fn new(compiled: &'c CompiledStage) -> Self {
        Self {
            compiled,
            partitions: compiled.config.partitions,
            verify: compiled.config.verify_comparators,
        }
    }

    pub fn with_partitions(mut self, partitions: u32) -> Self {
        self.partitions = partitions;
        self
    }

    /// Cross-check object and byte comparators on every sorted neighbour pair.
    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn run(&self, inputs: &BTreeMap<BlockPortRef, Vec<Record>>) -> Result<ExchangeOutput> {
        let compiled = self.compiled;
        let mut stats = ExchangeStats {
            partitions: self.partitions,
            ..Default::default()
        };
        let sinks: Vec<SinkBuffer> = compiled
            .model
            .sinks()
            .iter()
            .map(|_| Rc::new(RefCell::new(Vec::new())))
            .collect();

        let shuffle = new_buffer();
        let mut map = compiled.map_task();
        map.setup(&compiled.context(Rc::clone(&shuffle), sinks.clone()))?;
        let mapped = inputs.iter().try_for_each(|(port, records)| {
            records.iter().try_for_each(|record| {
                stats.input_records += 1;
                let mut record = record.clone();
                map.run(*port, &mut record)
            })
        });
        map.cleanup();
        mapped?;
        let mut entries = shuffle.take();
        stats.shuffled = entries.len();

        if let Some(mut combine) = compiled.combine_task() {
            self.sort(&mut entries)?;
            let bounds = self.groups(&entries)?;
            let combined = new_buffer();
            combine.setup(&compiled.context(Rc::clone(&combined), sinks.clone()))?;
            let result = bounds
                .into_iter()
                .try_for_each(|range| combine.run_group(&mut entries[range]));
            combine.cleanup();
            result?;
            entries = combined.take();
        }
        stats.combined = entries.len();

        if !entries.is_empty() {
            let mut reduce = compiled.reduce_task().ok_or_else(|| {
                ExecError::Invalid("shuffle output without a reduce task".into())
            })?;
            let mut partitions: Vec<Vec<ShuffleEntry>> =
                (0..self.partitions).map(|_| Vec::new()).collect();
            for entry in entries {
                let p = compiled
                    .codec
                    .partitioner
                    .try_partition(&entry.key, self.partitions)?;
                partitions[p as usize].push(entry);
            }

            reduce.setup(&compiled.context(new_buffer(), sinks.clone()))?;
            let result = partitions.into_iter().try_for_each(|mut partition| {
                self.sort(&mut partition)?;
                let bounds = self.groups(&partition)?;
                stats.groups += bounds.len();
                let mut values: Vec<ShuffleValue> =
                    partition.into_iter().map(|e| e.value).collect();
                bounds
                    .into_iter()
                    .try_for_each(|range| reduce.run_group(&mut values[range]))
            });
            reduce.cleanup();
            result?;
        }

        let mut output = ExchangeOutput::default();
        for (sink, buffer) in compiled.model.sinks().iter().zip(&sinks) {
            let records = buffer.take();
            stats.sink_records += records.len();
            output.sinks.insert(sink.name.clone(), records);
        }

        stats.report(compiled.model.number());
        output.stats = stats;
        Ok(output)
    }

    /// Stable sort by the byte comparator; the first comparator error wins.
    fn sort(&self, entries: &mut [ShuffleEntry]) -> Result<()> {
        let comparator = &self.compiled.codec.sort;
        let mut failure = None;
        entries.sort_by(|a, b| match comparator.try_compare_bytes(&a.key, &b.key) {
            Ok(ord) => ord,
            Err(e) => {
                failure.get_or_insert(e);
                Ordering::Equal
            }
        });
        if let Some(e) = failure {
            return Err(e.into());
        }
        if self.verify {
            self.verify_sorted(entries)?;
        }
        Ok(())
    }

    fn verify_sorted(&self, entries: &[ShuffleEntry]) -> Result<()> {
        let codec = &self.compiled.codec;
        for (index, pair) in entries.windows(2).enumerate() {
            let bytes = codec.sort.try_compare_bytes(&pair[0].key, &pair[1].key)?;
            let a = codec.keys.decode(&pair[0].key)?;
            let b = codec.keys.decode(&pair[1].key)?;
            let objects = codec.sort.try_compare(&a, &b)?;
            if bytes != objects {
                return Err(ExecError::ComparatorMismatch {
                    index,
                    bytes,
                    objects,
                });
            }
        }
        Ok(())
    }

    /// Ranges of consecutive entries the grouping comparator calls equal.
    fn groups(&self, entries: &[ShuffleEntry]) -> Result<Vec<Range<usize>>> {
        let grouping = &self.compiled.codec.grouping;
        let mut bounds = Vec::new();
        let mut start = 0;
        for i in 1..entries.len() {
            if grouping.try_compare_bytes(&entries[start].key, &entries[i].key)? != Ordering::Equal {
                bounds.push(start..i);
                start = i;
            }
        }
        if !entries.is_empty() {
            bounds.push(start..entries.len());
        }
        Ok(bounds)
    }
}

fn new_buffer() -> ShuffleBuffer {
    Rc::new(RefCell::new(Vec::new()))
}
