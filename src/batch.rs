//! Batched-select scheduler: a bounded worker pool that drains a queue of select jobs
//! against one shared [`ClientContext`] (§4.9, §4.11).
//!
//! Hand-rolled with `std::thread::scope` and `parking_lot::Mutex`, building the
//! concurrency primitives in house rather than reaching for an external thread-pool
//! crate — "drain" joins the scope, it does not spin-wait on a counter pair (Design
//! Notes §9).

use std::collections::VecDeque;

use parking_lot::Mutex;
use tracing::debug;

use crate::column::Column;
use crate::config::Config;
use crate::context::ClientContext;
use crate::select;

/// One queued select: the output slot name, the column to scan, and the range.
pub struct SelectJob<'a> {
    pub out_name: String,
    pub column: &'a Column,
    pub low: Option<i32>,
    pub high: Option<i32>,
}

/// Run every queued job to completion using `config.batch_workers` scope threads,
/// writing each result into its declared slot of `ctx`. Returns once every job has
/// completed (the pipeline's DRAINING -> NORMAL transition, §4.11).
pub fn drain(jobs: Vec<SelectJob<'_>>, ctx: &ClientContext, config: &Config) {
    let queue = Mutex::new(VecDeque::from(jobs));
    let worker_count = config.batch_workers.max(1).min(queue.lock().len().max(1));
    debug!(jobs = queue.lock().len(), workers = worker_count, "draining batched selects");

    std::thread::scope(|scope| {
        for _ in 0..worker_count {
            let queue = &queue;
            scope.spawn(move || loop {
                let job = {
                    let mut q = queue.lock();
                    q.pop_front()
                };
                let Some(job) = job else { break };
                let result = select::select_base(job.column, job.low, job.high, config);
                ctx.set(&job.out_name, result);
            });
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::TypedVec;

    fn loaded_column(values: &[i32]) -> Column {
        let mut col = Column::create_in_memory("a");
        for &v in values {
            col.push(v).unwrap();
        }
        col
    }

    #[test]
    fn batched_selects_match_sequential_execution() {
        let col = loaded_column(&(0..500).collect::<Vec<_>>());
        let config = Config::default();
        let ctx = ClientContext::new();

        let jobs = vec![
            SelectJob { out_name: "h1".into(), column: &col, low: Some(10), high: Some(50) },
            SelectJob { out_name: "h2".into(), column: &col, low: Some(100), high: Some(120) },
        ];
        drain(jobs, &ctx, &config);

        let expect1 = select::select_base(&col, Some(10), Some(50), &config);
        let expect2 = select::select_base(&col, Some(100), Some(120), &config);

        let (TypedVec::I64(got1), TypedVec::I64(want1)) = (ctx.get("h1").unwrap(), expect1) else {
            panic!("expected I64");
        };
        let (TypedVec::I64(got2), TypedVec::I64(want2)) = (ctx.get("h2").unwrap(), expect2) else {
            panic!("expected I64");
        };
        assert_eq!(got1, want1);
        assert_eq!(got2, want2);
    }
}
