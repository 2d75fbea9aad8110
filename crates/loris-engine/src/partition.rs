//! Parallel proof-partition reader.
//!
//! Proof artifacts are stored pre-partitioned; assembly fans out one
//! worker per partition (bounded by the worker budget), each filling its
//! slot in a shared table under a mutex. A condvar signals fan-in
//! completion, and an atomic abort flag makes the first failure cancel
//! the remaining reads. The assembled pairs seed an
//! [`Engine::from_states`](crate::explore::Engine::from_states) run.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::thread;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PartitionError {
    #[error("partition {index} is corrupt: {message}")]
    Corrupt { index: usize, message: String },
    #[error("partition read was aborted")]
    Aborted,
}

/// A store of proof partitions, readable out of order and in parallel.
pub trait PartitionSource: Sync {
    type State: Send;
    type Precision: Send;

    fn partition_count(&self) -> usize;

    /// Read one partition into (state, precision) pairs.
    fn read_partition(
        &self,
        index: usize,
    ) -> Result<Vec<(Self::State, Self::Precision)>, PartitionError>;
}

struct FanIn<T> {
    table: Mutex<FanInTable<T>>,
    done: Condvar,
}

struct FanInTable<T> {
    slots: Vec<Option<T>>,
    remaining: usize,
    failure: Option<PartitionError>,
}

/// Read all partitions of `source` with at most `workers` threads,
/// preserving partition order in the result.
///
/// The first failing partition aborts the remaining reads and is the
/// error returned; partitions already read are discarded.
pub fn read_partitions<Src: PartitionSource>(
    source: &Src,
    workers: usize,
) -> Result<Vec<Vec<(Src::State, Src::Precision)>>, PartitionError> {
    let count = source.partition_count();
    if count == 0 {
        return Ok(Vec::new());
    }
    let workers = workers.max(1).min(count);

    let fan_in = FanIn {
        table: Mutex::new(FanInTable {
            slots: (0..count).map(|_| None).collect(),
            remaining: count,
            failure: None,
        }),
        done: Condvar::new(),
    };
    let abort = AtomicBool::new(false);
    let next_index = AtomicUsize::new(0);

    thread::scope(|scope| {
        for worker in 0..workers {
            let fan_in = &fan_in;
            let abort = &abort;
            let next_index = &next_index;
            scope.spawn(move || loop {
                if abort.load(Ordering::Acquire) {
                    return;
                }
                let index = next_index.fetch_add(1, Ordering::Relaxed);
                if index >= count {
                    return;
                }
                debug!(worker, index, "reading proof partition");
                match source.read_partition(index) {
                    Ok(pairs) => {
                        let mut table = fan_in.table.lock().expect("partition table poisoned");
                        table.slots[index] = Some(pairs);
                        table.remaining -= 1;
                        if table.remaining == 0 {
                            fan_in.done.notify_all();
                        }
                    }
                    Err(err) => {
                        abort.store(true, Ordering::Release);
                        let mut table = fan_in.table.lock().expect("partition table poisoned");
                        if table.failure.is_none() {
                            table.failure = Some(err);
                        }
                        fan_in.done.notify_all();
                        return;
                    }
                }
            });
        }

        // Fan-in barrier: wait until every slot is filled or a reader
        // has failed. Scope join below then reaps the workers.
        let mut table = fan_in.table.lock().expect("partition table poisoned");
        while table.remaining > 0 && table.failure.is_none() {
            table = fan_in
                .done
                .wait(table)
                .expect("partition table poisoned");
        }
    });

    let mut table = fan_in.table.into_inner().expect("partition table poisoned");
    if let Some(err) = table.failure.take() {
        return Err(err);
    }
    Ok(table
        .slots
        .into_iter()
        .map(|slot| slot.expect("partition slot left unfilled"))
        .collect())
}

/// Flatten partitions into one seed list, preserving partition order.
pub fn assembled_states<S, P>(partitions: Vec<Vec<(S, P)>>) -> Vec<(S, P)> {
    partitions.into_iter().flatten().collect()
}
