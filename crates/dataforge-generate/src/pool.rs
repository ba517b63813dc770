//! Bounded worker pool with per-task deadlines.
//!
//! Tasks run on a dedicated rayon pool and report back over a channel; the
//! calling thread is the join barrier and sees every outcome in completion
//! order. Returning an error from the completion callback stops the run:
//! tasks that have not started yet are skipped, running ones are abandoned.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::errors::GenerationError;

/// Why a task produced no value.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskFailure {
    Panicked(String),
    TimedOut(Duration),
}

impl std::fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskFailure::Panicked(message) => write!(f, "panicked: {message}"),
            TaskFailure::TimedOut(limit) => {
                write!(f, "deadline of {limit:?} exceeded")
            }
        }
    }
}

/// Completion of the task at `index` in the submitted job list.
#[derive(Debug)]
pub struct TaskDone<T> {
    pub index: usize,
    pub elapsed: Duration,
    pub outcome: Result<T, TaskFailure>,
}

enum TaskEvent<T> {
    Started {
        index: usize,
        at: Instant,
    },
    Finished {
        index: usize,
        elapsed: Duration,
        outcome: Result<T, TaskFailure>,
    },
}

pub struct BoundedPool {
    pool: rayon::ThreadPool,
    deadline: Option<Duration>,
}

impl BoundedPool {
    pub fn new(
        name: &'static str,
        workers: usize,
        deadline: Option<Duration>,
    ) -> Result<Self, GenerationError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(move |index| format!("{name}-{index}"))
            .build()?;
        Ok(Self { pool, deadline })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `work` over every job and hand each completion to `on_complete`.
    ///
    /// At most one task per worker is scheduled at a time; the next job is
    /// submitted only after a completion has been handed to `on_complete`,
    /// so finished results never pile up behind a slow consumer.
    pub fn run<J, T, F, C>(
        &self,
        jobs: Vec<J>,
        work: Arc<F>,
        mut on_complete: C,
    ) -> Result<(), GenerationError>
    where
        J: Send + 'static,
        T: Send + 'static,
        F: Fn(J) -> T + Send + Sync + 'static,
        C: FnMut(TaskDone<T>) -> Result<(), GenerationError>,
    {
        let total = jobs.len();
        let cancelled = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        let mut pending = jobs.into_iter().enumerate();

        let mut submit_next = || {
            let Some((index, job)) = pending.next() else {
                return;
            };
            let tx = tx.clone();
            let work = Arc::clone(&work);
            let cancelled = Arc::clone(&cancelled);
            self.pool.spawn(move || {
                if cancelled.load(Ordering::Acquire) {
                    return;
                }
                let started = Instant::now();
                let _ = tx.send(TaskEvent::Started { index, at: started });
                let outcome = catch_unwind(AssertUnwindSafe(|| work(job)))
                    .map_err(|panic| TaskFailure::Panicked(panic_message(panic)));
                let _ = tx.send(TaskEvent::Finished {
                    index,
                    elapsed: started.elapsed(),
                    outcome,
                });
            });
        };

        for _ in 0..self.workers() {
            submit_next();
        }

        let result = self.collect(total, &rx, &mut on_complete, &mut submit_next);
        if result.is_err() {
            cancelled.store(true, Ordering::Release);
        }
        result
    }

    fn collect<T, C, S>(
        &self,
        total: usize,
        rx: &Receiver<TaskEvent<T>>,
        on_complete: &mut C,
        submit_next: &mut S,
    ) -> Result<(), GenerationError>
    where
        C: FnMut(TaskDone<T>) -> Result<(), GenerationError>,
        S: FnMut(),
    {
        let mut running: HashMap<usize, Instant> = HashMap::new();
        let mut expired: HashSet<usize> = HashSet::new();
        let mut finished = 0;

        while finished < total {
            let next = match (self.deadline, earliest(&running)) {
                (Some(limit), Some((index, started))) => {
                    // Queued events are drained before a deadline is declared expired.
                    let wait = (started + limit).saturating_duration_since(Instant::now());
                    match rx.recv_timeout(wait) {
                        Ok(event) => event,
                        Err(RecvTimeoutError::Timeout) => {
                            running.remove(&index);
                            expired.insert(index);
                            finished += 1;
                            on_complete(TaskDone {
                                index,
                                elapsed: started.elapsed(),
                                outcome: Err(TaskFailure::TimedOut(limit)),
                            })?;
                            submit_next();
                            continue;
                        }
                        Err(RecvTimeoutError::Disconnected) => return Err(disconnected()),
                    }
                }
                _ => rx.recv().map_err(|_| disconnected())?,
            };

            match next {
                TaskEvent::Started { index, at } => {
                    running.insert(index, at);
                }
                TaskEvent::Finished {
                    index,
                    elapsed,
                    outcome,
                } => {
                    running.remove(&index);
                    if expired.contains(&index) {
                        continue;
                    }
                    finished += 1;
                    on_complete(TaskDone {
                        index,
                        elapsed,
                        outcome,
                    })?;
                    submit_next();
                }
            }
        }

        Ok(())
    }
}

fn earliest(running: &HashMap<usize, Instant>) -> Option<(usize, Instant)> {
    running
        .iter()
        .min_by_key(|(_, started)| **started)
        .map(|(index, started)| (*index, *started))
}

fn disconnected() -> GenerationError {
    GenerationError::Pool("worker channel closed before all tasks reported".to_string())
}

pub(crate) fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic during generation".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_second_deadlines_are_reported_exactly() {
        let message = TaskFailure::TimedOut(Duration::from_millis(50)).to_string();
        assert!(message.contains("50ms"), "{message}");
    }

    #[test]
    fn every_job_completes_once() {
        let pool = BoundedPool::new("test-pool", 3, None).unwrap();
        let mut seen = Vec::new();
        pool.run((0..20u64).collect(), Arc::new(|n: u64| n * 2), |done| {
            seen.push((done.index, done.outcome.unwrap()));
            Ok(())
        })
        .unwrap();
        seen.sort();
        assert_eq!(seen.len(), 20);
        assert!(seen.iter().all(|(index, value)| *value == *index as u64 * 2));
    }

    #[test]
    fn panics_are_reported_as_failures() {
        let pool = BoundedPool::new("test-pool", 2, None).unwrap();
        let mut failures = 0;
        pool.run(
            vec![1u32, 2, 3],
            Arc::new(|n: u32| {
                if n == 2 {
                    panic!("boom");
                }
                n
            }),
            |done| {
                if let Err(TaskFailure::Panicked(message)) = done.outcome {
                    assert_eq!(message, "boom");
                    failures += 1;
                }
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(failures, 1);
    }

    #[test]
    fn slow_tasks_time_out() {
        let pool = BoundedPool::new("test-pool", 2, Some(Duration::from_millis(50))).unwrap();
        let result = pool.run(
            vec![0u64, 2_000],
            Arc::new(|millis: u64| std::thread::sleep(Duration::from_millis(millis))),
            |done| match done.outcome {
                Err(TaskFailure::TimedOut(_)) => Err(GenerationError::Pool("timed out".to_string())),
                _ => Ok(()),
            },
        );
        assert!(matches!(result, Err(GenerationError::Pool(message)) if message == "timed out"));
    }

    #[test]
    fn finished_results_wait_for_the_consumer() {
        use std::sync::atomic::AtomicUsize;

        let pool = BoundedPool::new("test-pool", 2, None).unwrap();
        let produced = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&produced);
        let mut consumed = 0;
        let mut backlog = 0;
        pool.run(
            (0..32u32).collect(),
            Arc::new(move |n: u32| {
                counter.fetch_add(1, Ordering::SeqCst);
                n
            }),
            |done| {
                assert!(done.outcome.is_ok());
                backlog = backlog.max(produced.load(Ordering::SeqCst) - consumed);
                consumed += 1;
                std::thread::sleep(Duration::from_millis(5));
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(consumed, 32);
        assert!(backlog <= 2, "{backlog} finished results were queued");
    }
}
