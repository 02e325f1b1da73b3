//! Per-query timing metadata, accumulated by the timing facade
//!
//! Mirrors `klee::SolverQueryMetaData` (one instance per call site in the
//! engine, reused across queries) and the RAII phase-timer idiom from
//! `CompilationProfiler`/`PhaseTimer`: a guard that adds its elapsed time
//! to the target on drop, so every early return still accounts for time
//! spent.

use std::time::{Duration, Instant};

/// Accumulates solver time and query count for one call site.
#[derive(Debug, Default, Clone)]
pub struct SolverQueryMetaData {
    /// Total time spent below the facade answering queries issued
    /// through this metadata instance.
    pub query_cost: Duration,
    /// Number of queries that actually reached a `QueryTimer` (the
    /// constant fast path never starts one, so it's not counted here).
    pub query_count: u64,
}

impl SolverQueryMetaData {
    pub fn new() -> Self {
        Self::default()
    }
}

/// RAII guard that adds its elapsed time to a `SolverQueryMetaData` when
/// dropped, regardless of which return path was taken.
pub struct QueryTimer<'a> {
    metadata: &'a mut SolverQueryMetaData,
    start: Instant,
}

impl<'a> QueryTimer<'a> {
    pub fn start(metadata: &'a mut SolverQueryMetaData) -> Self {
        Self { metadata, start: Instant::now() }
    }
}

impl Drop for QueryTimer<'_> {
    fn drop(&mut self) {
        self.metadata.query_cost += self.start.elapsed();
        self.metadata.query_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn accumulates_across_calls() {
        let mut meta = SolverQueryMetaData::new();
        {
            let _t = QueryTimer::start(&mut meta);
            thread::sleep(Duration::from_millis(5));
        }
        {
            let _t = QueryTimer::start(&mut meta);
            thread::sleep(Duration::from_millis(5));
        }
        assert!(meta.query_cost >= Duration::from_millis(10));
    }
}
