//! Per-generation progress records and result aggregation.
//!
//! Every population writes one [`GenerationRecord`] per generation into its
//! own [`ProcessLog`] and forwards it to the run's [`ProgressSink`]. When the
//! run ends, [`ResultAggregator::finalize`] merges the logs into
//! [`RunResults`], marking the log of the population that terminated the run
//! as the `"result"` entry.

use super::types::{Individual, MinMaxRule};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Key of the `"result"` entry in [`RunResults::to_map`].
pub const RESULT_KEY: &str = "result";

/// Summary of one generation of one population.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GenerationRecord {
    pub generation: usize,
    pub min_fitness: f64,
    pub min_individual: Individual,
    pub max_fitness: f64,
    pub max_individual: Individual,
    pub avg_fitness: f64,
    pub timestamp: DateTime<Utc>,
}

impl GenerationRecord {
    /// Summarizes an evaluated population.
    ///
    /// Returns `None` for an empty population. NaN fitness values are
    /// skipped when looking for the extremes.
    pub fn from_population(
        generation: usize,
        population: &[Individual],
        fitness: &[f64],
    ) -> Option<Self> {
        let min_idx = MinMaxRule::Min.best_index(fitness)?;
        let max_idx = MinMaxRule::Max.best_index(fitness)?;
        let avg_fitness = fitness.iter().sum::<f64>() / fitness.len() as f64;
        Some(Self {
            generation,
            min_fitness: fitness[min_idx],
            min_individual: population.get(min_idx)?.clone(),
            max_fitness: fitness[max_idx],
            max_individual: population.get(max_idx)?.clone(),
            avg_fitness,
            timestamp: Utc::now(),
        })
    }

    /// Best fitness and individual under `rule`.
    pub fn best(&self, rule: MinMaxRule) -> (f64, &Individual) {
        match rule {
            MinMaxRule::Min => (self.min_fitness, &self.min_individual),
            MinMaxRule::Max => (self.max_fitness, &self.max_individual),
        }
    }
}

/// Append-only log of one population's generation records.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProcessLog {
    key: String,
    records: Vec<GenerationRecord>,
}

impl ProcessLog {
    /// Log of the single master-worker population (`process_0`).
    pub fn master() -> Self {
        Self::named("process_0")
    }

    /// Log of island `index` (`island_<index>`).
    pub fn island(index: usize) -> Self {
        Self::named(format!("island_{index}"))
    }

    pub fn named(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            records: Vec::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Appends a record. Generations must be strictly increasing.
    pub fn push(&mut self, record: GenerationRecord) {
        debug_assert!(
            self.records
                .last()
                .map_or(true, |last| last.generation < record.generation),
            "generation records must be strictly increasing"
        );
        self.records.push(record);
    }

    pub fn records(&self) -> &[GenerationRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&GenerationRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Receives generation records as they are produced.
///
/// Island populations report concurrently, so implementations must be
/// thread safe.
pub trait ProgressSink: Send + Sync {
    fn record(&self, process_key: &str, record: &GenerationRecord);
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn record(&self, _process_key: &str, _record: &GenerationRecord) {}
}

/// Keeps every record in memory, in arrival order.
#[derive(Debug, Default)]
pub struct CollectingSink {
    records: Mutex<Vec<(String, GenerationRecord)>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records received so far.
    pub fn records(&self) -> Vec<(String, GenerationRecord)> {
        self.records.lock().clone()
    }

    /// Records of one process, in arrival order.
    pub fn for_process(&self, process_key: &str) -> Vec<GenerationRecord> {
        self.records
            .lock()
            .iter()
            .filter(|(key, _)| key == process_key)
            .map(|(_, record)| record.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl ProgressSink for CollectingSink {
    fn record(&self, process_key: &str, record: &GenerationRecord) {
        self.records
            .lock()
            .push((process_key.to_string(), record.clone()));
    }
}

/// Final per-process logs of a run.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunResults {
    /// Records of every population, keyed by process key.
    pub processes: BTreeMap<String, Vec<GenerationRecord>>,
    /// Key of the process whose log is the run result.
    pub result_key: Option<String>,
    /// Records of the process that terminated the run.
    pub result: Vec<GenerationRecord>,
}

impl RunResults {
    /// Process logs plus the `"result"` entry, the shape the run results
    /// are exported in.
    pub fn to_map(&self) -> BTreeMap<String, Vec<GenerationRecord>> {
        let mut map = self.processes.clone();
        map.insert(RESULT_KEY.to_string(), self.result.clone());
        map
    }

    /// Records of one process.
    pub fn process(&self, key: &str) -> Option<&[GenerationRecord]> {
        self.processes.get(key).map(Vec::as_slice)
    }

    /// Last record of the result process.
    pub fn final_record(&self) -> Option<&GenerationRecord> {
        self.result.last()
    }

    /// [`to_map`](Self::to_map) as a JSON value.
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self.to_map())
    }
}

/// Merges process logs into [`RunResults`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator;

impl ResultAggregator {
    /// Builds the final results once every writer has finished.
    ///
    /// The result entry is the log of `terminating_key`; when no process
    /// terminated (a stopped or failed run) it is the log with the smallest
    /// key.
    pub fn finalize(logs: Vec<ProcessLog>, terminating_key: Option<&str>) -> RunResults {
        let processes: BTreeMap<String, Vec<GenerationRecord>> = logs
            .into_iter()
            .map(|log| (log.key, log.records))
            .collect();

        let result_key = terminating_key
            .filter(|key| processes.contains_key(*key))
            .map(str::to_string)
            .or_else(|| processes.keys().next().cloned());
        let result = result_key
            .as_ref()
            .and_then(|key| processes.get(key))
            .cloned()
            .unwrap_or_default();

        RunResults {
            processes,
            result_key,
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(generation: usize) -> GenerationRecord {
        let pop = vec![vec![0.0], vec![1.0], vec![2.0]];
        GenerationRecord::from_population(generation, &pop, &[3.0, 1.0, 2.0]).unwrap()
    }

    #[test]
    fn test_record_summary() {
        let r = record(1);
        assert_eq!(r.min_fitness, 1.0);
        assert_eq!(r.min_individual, vec![1.0]);
        assert_eq!(r.max_fitness, 3.0);
        assert_eq!(r.max_individual, vec![0.0]);
        assert!((r.avg_fitness - 2.0).abs() < 1e-12);
        assert_eq!(r.best(MinMaxRule::Min).0, 1.0);
        assert_eq!(r.best(MinMaxRule::Max).1, &vec![0.0]);
    }

    #[test]
    fn test_record_empty_population() {
        assert!(GenerationRecord::from_population(1, &[], &[]).is_none());
    }

    #[test]
    fn test_process_keys() {
        assert_eq!(ProcessLog::master().key(), "process_0");
        assert_eq!(ProcessLog::island(2).key(), "island_2");
    }

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingSink::new();
        sink.record("island_0", &record(1));
        sink.record("island_1", &record(1));
        sink.record("island_0", &record(2));
        assert_eq!(sink.len(), 3);
        let island0: Vec<usize> = sink.for_process("island_0").iter().map(|r| r.generation).collect();
        assert_eq!(island0, vec![1, 2]);
    }

    #[test]
    fn test_finalize_uses_terminating_process() {
        let mut a = ProcessLog::island(0);
        a.push(record(1));
        let mut b = ProcessLog::island(1);
        b.push(record(1));
        b.push(record(2));

        let results = ResultAggregator::finalize(vec![a, b], Some("island_1"));
        assert_eq!(results.result_key.as_deref(), Some("island_1"));
        assert_eq!(results.result.len(), 2);
        assert_eq!(results.final_record().map(|r| r.generation), Some(2));

        let map = results.to_map();
        assert_eq!(
            map.keys().collect::<Vec<_>>(),
            vec!["island_0", "island_1", "result"]
        );
    }

    #[test]
    fn test_finalize_without_terminating_process() {
        let mut log = ProcessLog::master();
        log.push(record(1));
        let results = ResultAggregator::finalize(vec![log], None);
        assert_eq!(results.result_key.as_deref(), Some("process_0"));
        assert_eq!(results.process("process_0").map(<[_]>::len), Some(1));

        let empty = ResultAggregator::finalize(Vec::new(), None);
        assert!(empty.result.is_empty());
        assert!(empty.result_key.is_none());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_results_to_json() {
        let mut log = ProcessLog::master();
        log.push(record(1));
        let json = ResultAggregator::finalize(vec![log], None).to_json().unwrap();
        assert_eq!(json["result"][0]["generation"], 1);
        assert_eq!(json["process_0"][0]["min_fitness"], 1.0);
    }
}
