//! Slice-parallel dispatch within one node step.
//!
//! A step with embarrassingly-parallel work (per-channel, per-row, per-cell)
//! hands the unit range to a [`SliceExecutor`], which partitions it across
//! up to a configured number of worker threads and joins them all before
//! returning — node-level scheduling never observes the fan-out.
//!
//! The partition is exact: for unit count `U` and job count `W`, job `j`
//! covers `[U*j/W, U*(j+1)/W)` in integer arithmetic, which tiles `[0, U)`
//! with no gaps and no overlaps for every `U` and `W`.

use crate::error::{Error, ErrorCode, Result};
use std::num::NonZeroUsize;
use std::thread;

/// A contiguous, non-overlapping sub-range of the unit range, assigned to
/// one job for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceRange {
    /// First unit (inclusive).
    pub start: usize,
    /// One past the last unit (exclusive).
    pub end: usize,
}

impl SliceRange {
    /// Number of units in this slice.
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the slice is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// What one job sees: its slice, its index, and the job count.
#[derive(Debug, Clone, Copy)]
pub struct SliceJob {
    /// This job's slice of the unit range.
    pub range: SliceRange,
    /// Job index in `[0, jobs)`.
    pub index: usize,
    /// Total number of jobs dispatched for this step.
    pub jobs: usize,
}

/// Compute job `j`'s slice of `[0, units)` split `jobs` ways.
pub fn slice_range(units: usize, jobs: usize, j: usize) -> SliceRange {
    debug_assert!(j < jobs);
    SliceRange {
        start: units * j / jobs,
        end: units * (j + 1) / jobs,
    }
}

/// Fans one computation out across worker threads for the duration of a
/// single node step.
#[derive(Debug, Clone)]
pub struct SliceExecutor {
    max_workers: usize,
}

impl SliceExecutor {
    /// Executor with an explicit worker cap.
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    /// Executor capped at the machine's available parallelism.
    pub fn with_default_parallelism() -> Self {
        let workers = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self::new(workers)
    }

    /// The configured worker cap.
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run `job` over `[0, units)`, split across up to `max_workers` jobs.
    ///
    /// Blocks until every job has completed; per-job results are collected
    /// and the first error *by job index* is surfaced. Already-running
    /// sibling jobs are never preempted — there is no cancellation, and a
    /// failing job's slice may hold partial output (explicitly undefined).
    ///
    /// Jobs must only write inside their own slice of any shared output;
    /// the exact partition makes that a static discipline, not a lock.
    pub fn execute<F>(&self, units: usize, job: F) -> Result<()>
    where
        F: Fn(SliceJob) -> std::result::Result<(), ErrorCode> + Sync,
    {
        if units == 0 {
            return Err(Error::InvalidData("slice dispatch over zero units".into()));
        }
        let jobs = self.max_workers.min(units);
        if jobs == 1 {
            return job(SliceJob {
                range: SliceRange {
                    start: 0,
                    end: units,
                },
                index: 0,
                jobs: 1,
            })
            .map_err(|code| Error::SliceJob { job: 0, code });
        }

        let job = &job;
        let mut results: Vec<std::result::Result<(), ErrorCode>> = Vec::new();
        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(jobs - 1);
            for index in 1..jobs {
                handles.push(scope.spawn(move || {
                    job(SliceJob {
                        range: slice_range(units, jobs, index),
                        index,
                        jobs,
                    })
                }));
            }
            // Job 0 runs on the dispatching thread.
            results.push(job(SliceJob {
                range: slice_range(units, jobs, 0),
                index: 0,
                jobs,
            }));
            for handle in handles {
                results.push(match handle.join() {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::error!("slice job panicked");
                        Err(ErrorCode::InvalidData)
                    }
                });
            }
        });

        for (index, result) in results.into_iter().enumerate() {
            if let Err(code) = result {
                return Err(Error::SliceJob { job: index, code });
            }
        }
        Ok(())
    }

    /// Run `job` over `data`, each job receiving its own slice mutably.
    ///
    /// The split points are exactly [`slice_range`]'s, so jobs cover the
    /// buffer with no gaps or overlaps and never alias each other's
    /// elements. Error collection and the no-cancellation rule match
    /// [`execute`](Self::execute).
    pub fn execute_over<T, F>(&self, data: &mut [T], job: F) -> Result<()>
    where
        T: Send,
        F: Fn(SliceJob, &mut [T]) -> std::result::Result<(), ErrorCode> + Sync,
    {
        let units = data.len();
        if units == 0 {
            return Err(Error::InvalidData("slice dispatch over zero units".into()));
        }
        let jobs = self.max_workers.min(units);
        if jobs == 1 {
            return job(
                SliceJob {
                    range: SliceRange {
                        start: 0,
                        end: units,
                    },
                    index: 0,
                    jobs: 1,
                },
                data,
            )
            .map_err(|code| Error::SliceJob { job: 0, code });
        }

        let mut chunks = Vec::with_capacity(jobs);
        let mut rest = data;
        let mut start = 0;
        for j in 0..jobs {
            let end = units * (j + 1) / jobs;
            let (chunk, tail) = rest.split_at_mut(end - start);
            chunks.push(chunk);
            rest = tail;
            start = end;
        }

        let job = &job;
        let mut results: Vec<std::result::Result<(), ErrorCode>> = Vec::new();
        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(jobs - 1);
            let mut chunks = chunks.into_iter();
            let first = chunks.next().expect("jobs >= 1");
            for (index, chunk) in (1..jobs).zip(chunks) {
                handles.push(scope.spawn(move || {
                    job(
                        SliceJob {
                            range: slice_range(units, jobs, index),
                            index,
                            jobs,
                        },
                        chunk,
                    )
                }));
            }
            results.push(job(
                SliceJob {
                    range: slice_range(units, jobs, 0),
                    index: 0,
                    jobs,
                },
                first,
            ));
            for handle in handles {
                results.push(match handle.join() {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::error!("slice job panicked");
                        Err(ErrorCode::InvalidData)
                    }
                });
            }
        });

        for (index, result) in results.into_iter().enumerate() {
            if let Err(code) = result {
                return Err(Error::SliceJob { job: index, code });
            }
        }
        Ok(())
    }
}

impl Default for SliceExecutor {
    fn default() -> Self {
        Self::with_default_parallelism()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn test_slice_ranges_partition_exactly() {
        // No gaps, no overlaps, union equals [0, U) — for a grid of
        // (units, jobs) including non-divisible splits.
        for units in 1..=64usize {
            for jobs in 1..=16usize {
                let mut next = 0;
                for j in 0..jobs {
                    let range = slice_range(units, jobs, j);
                    assert_eq!(range.start, next, "gap or overlap at U={units} W={jobs} j={j}");
                    assert!(range.end >= range.start);
                    next = range.end;
                }
                assert_eq!(next, units, "union short of [0,{units}) for W={jobs}");
            }
        }
    }

    #[test]
    fn test_slice_ranges_u10_w3() {
        assert_eq!(slice_range(10, 3, 0), SliceRange { start: 0, end: 3 });
        assert_eq!(slice_range(10, 3, 1), SliceRange { start: 3, end: 6 });
        assert_eq!(slice_range(10, 3, 2), SliceRange { start: 6, end: 10 });
    }

    #[test]
    fn test_execute_touches_every_unit_once() {
        let executor = SliceExecutor::new(4);
        let units = 1000;
        let counters: Vec<AtomicUsize> = (0..units).map(|_| AtomicUsize::new(0)).collect();

        executor
            .execute(units, |job| {
                for unit in job.range.start..job.range.end {
                    counters[unit].fetch_add(1, Ordering::Relaxed);
                }
                Ok(())
            })
            .unwrap();

        assert!(counters.iter().all(|c| c.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn test_execute_caps_jobs_at_units() {
        let executor = SliceExecutor::new(8);
        let seen = Mutex::new(Vec::new());
        executor
            .execute(3, |job| {
                assert_eq!(job.jobs, 3);
                seen.lock().unwrap().push(job.index);
                Ok(())
            })
            .unwrap();
        let mut seen = seen.into_inner().unwrap();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn test_execute_surfaces_first_error_by_index() {
        let executor = SliceExecutor::new(4);
        let err = executor
            .execute(4, |job| {
                if job.index >= 2 {
                    Err(ErrorCode::InvalidData)
                } else {
                    Ok(())
                }
            })
            .unwrap_err();
        match err {
            Error::SliceJob { job, code } => {
                assert_eq!(job, 2);
                assert_eq!(code, ErrorCode::InvalidData);
            }
            other => panic!("expected slice job error, got {other}"),
        }
    }

    #[test]
    fn test_execute_siblings_complete_despite_error() {
        let executor = SliceExecutor::new(4);
        let completed = AtomicUsize::new(0);
        let _ = executor.execute(4, |job| {
            completed.fetch_add(1, Ordering::Relaxed);
            if job.index == 0 {
                Err(ErrorCode::OutOfMemory)
            } else {
                Ok(())
            }
        });
        // No cancellation: every job ran to completion.
        assert_eq!(completed.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn test_execute_zero_units_is_invalid() {
        let executor = SliceExecutor::new(2);
        assert!(executor.execute(0, |_| Ok(())).is_err());
    }

    #[test]
    fn test_execute_over_writes_disjoint_slices() {
        let executor = SliceExecutor::new(3);
        let mut data = vec![0u32; 10];
        executor
            .execute_over(&mut data, |job, chunk| {
                assert_eq!(chunk.len(), job.range.len());
                for (offset, value) in chunk.iter_mut().enumerate() {
                    *value = (job.range.start + offset) as u32;
                }
                Ok(())
            })
            .unwrap();
        let expected: Vec<u32> = (0..10).collect();
        assert_eq!(data, expected);
    }
}
