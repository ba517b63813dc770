use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use dataforge_core::{BatchDescriptor, ConfigError};

use crate::errors::{GenerationError, SamplerError};
use crate::model::BatchReport;
use crate::pool::BoundedPool;
use crate::seed::batch_seed;

/// Split `[0, total_rows)` into contiguous batches.
///
/// The batch count is the worker count, raised to honor `max_batch_rows`
/// and capped at `total_rows` so no batch is empty. Every batch but the last
/// holds `floor(total_rows / count)` rows; the last absorbs the remainder.
pub fn plan_batches(
    total_rows: u64,
    workers: usize,
    max_batch_rows: Option<u64>,
    run_seed: u64,
) -> Result<Vec<BatchDescriptor>, GenerationError> {
    if total_rows == 0 {
        return Err(
            ConfigError::InvalidRowCount("total_rows must be greater than zero".into()).into(),
        );
    }
    if workers == 0 {
        return Err(
            ConfigError::InvalidParallelism("workers must be greater than zero".into()).into(),
        );
    }

    let mut count = workers as u64;
    if let Some(max_rows) = max_batch_rows {
        if max_rows == 0 {
            return Err(ConfigError::InvalidParallelism(
                "max_batch_rows must be greater than zero".into(),
            )
            .into());
        }
        count = count.max(total_rows.div_ceil(max_rows));
    }
    let count = count.min(total_rows);
    if count > u32::MAX as u64 {
        return Err(ConfigError::InvalidParallelism(format!(
            "{count} batches exceed the batch id range"
        ))
        .into());
    }

    let size = total_rows / count;
    let batches = (0..count)
        .map(|index| {
            let batch_id = index as u32;
            let start_index = index * size;
            let end_index = if index + 1 == count {
                total_rows
            } else {
                start_index + size
            };
            BatchDescriptor {
                batch_id,
                start_index,
                end_index,
                seed: batch_seed(run_seed, batch_id),
            }
        })
        .collect();
    Ok(batches)
}

/// Execute `job` for every batch on a pool of `workers` threads.
///
/// `on_batch` runs on the calling thread as each batch completes, in
/// completion order. The first batch error, panic or expired deadline stops
/// the dispatch with [`GenerationError::WorkerFailure`]; batches that have
/// not started are skipped and results not yet handed over are dropped.
pub fn dispatch<T, F, C>(
    batches: &[BatchDescriptor],
    workers: usize,
    batch_timeout: Option<Duration>,
    job: F,
    mut on_batch: C,
) -> Result<(), GenerationError>
where
    T: Send + 'static,
    F: Fn(&BatchDescriptor) -> Result<T, SamplerError> + Send + Sync + 'static,
    C: FnMut(BatchReport, T) -> Result<(), GenerationError>,
{
    let pool = BoundedPool::new("dataforge-batch", workers, batch_timeout)?;
    let work = Arc::new(move |batch: BatchDescriptor| job(&batch));

    pool.run(batches.to_vec(), work, |done| {
        let batch = batches[done.index];
        let duration_ms = done.elapsed.as_millis() as u64;
        let cause = match done.outcome {
            Ok(Ok(value)) => {
                debug!(
                    batch_id = batch.batch_id,
                    rows = batch.len(),
                    duration_ms,
                    "batch completed"
                );
                return on_batch(BatchReport::new(&batch, duration_ms), value);
            }
            Ok(Err(err)) => err.to_string(),
            Err(failure) => failure.to_string(),
        };

        warn!(
            batch_id = batch.batch_id,
            start_index = batch.start_index,
            end_index = batch.end_index,
            error = %cause,
            "batch failed"
        );
        Err(GenerationError::WorkerFailure {
            batch_id: batch.batch_id,
            start_index: batch.start_index,
            end_index: batch.end_index,
            cause,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(batches: &[BatchDescriptor]) -> Vec<(u64, u64)> {
        batches
            .iter()
            .map(|batch| (batch.start_index, batch.end_index))
            .collect()
    }

    #[test]
    fn thousand_rows_over_four_workers() {
        let batches = plan_batches(1000, 4, None, 42).unwrap();
        assert_eq!(
            ranges(&batches),
            vec![(0, 250), (250, 500), (500, 750), (750, 1000)]
        );
        let ids: Vec<u32> = batches.iter().map(|batch| batch.batch_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn last_batch_absorbs_remainder() {
        let batches = plan_batches(10, 4, None, 1).unwrap();
        assert_eq!(ranges(&batches), vec![(0, 2), (2, 4), (4, 6), (6, 10)]);
    }

    #[test]
    fn batch_count_never_exceeds_rows() {
        let batches = plan_batches(3, 8, None, 1).unwrap();
        assert_eq!(ranges(&batches), vec![(0, 1), (1, 2), (2, 3)]);
    }

    #[test]
    fn max_batch_rows_raises_batch_count() {
        let batches = plan_batches(1000, 2, Some(100), 1).unwrap();
        assert_eq!(batches.len(), 10);
        assert!(batches.iter().all(|batch| batch.len() == 100));
    }

    #[test]
    fn ranges_cover_rows_exactly() {
        for total in [1u64, 7, 999, 1000, 1001, 123_457] {
            for workers in [1usize, 2, 3, 8, 13] {
                let batches = plan_batches(total, workers, None, 5).unwrap();
                let mut next = 0;
                for batch in &batches {
                    assert_eq!(batch.start_index, next);
                    assert!(batch.end_index > batch.start_index);
                    next = batch.end_index;
                }
                assert_eq!(next, total);
                assert_eq!(batches.iter().map(|b| b.len()).sum::<u64>(), total);
            }
        }
    }

    #[test]
    fn failing_batch_aborts_dispatch() {
        let batches = plan_batches(800, 8, None, 42).unwrap();
        let mut delivered = 0;
        let result = dispatch(
            &batches,
            8,
            None,
            |batch: &BatchDescriptor| {
                if batch.batch_id == 5 {
                    return Err(SamplerError::OutOfRange {
                        sampler: "test",
                        message: "forced".to_string(),
                    });
                }
                Ok(batch.len())
            },
            |_, _| {
                delivered += 1;
                Ok(())
            },
        );
        match result {
            Err(GenerationError::WorkerFailure {
                batch_id,
                start_index,
                end_index,
                ..
            }) => {
                assert_eq!(batch_id, 5);
                assert_eq!((start_index, end_index), (500, 600));
            }
            other => panic!("expected worker failure, got {other:?}"),
        }
        assert!(delivered < 8);
    }
}
