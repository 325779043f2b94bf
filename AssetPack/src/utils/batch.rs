//! Bounded parallel execution for per-file work
//!
//! Each stage hands its file list to [`run_bounded`], which runs the work on a
//! dedicated rayon pool of `concurrency` threads. Results come back in input
//! order; progress is reported as each item starts.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use crate::error::{Error, Result};

/// Progress update for a batch stage.
#[derive(Debug, Clone)]
pub struct Progress {
    /// 1-based index of the item being started.
    pub current: usize,
    /// Total number of items in the batch.
    pub total: usize,
    /// Display name of the item.
    pub item: String,
}

/// Run `work` over `items` with at most `concurrency` items in flight.
pub fn run_bounded<R, F, P>(
    items: &[PathBuf],
    concurrency: usize,
    progress: P,
    work: F,
) -> Result<Vec<R>>
where
    R: Send,
    F: Fn(&PathBuf) -> R + Send + Sync,
    P: Fn(&Progress) + Send + Sync,
{
    let pool = ThreadPoolBuilder::new()
        .num_threads(concurrency.max(1))
        .thread_name(|i| format!("assetpack-worker-{i}"))
        .build()
        .map_err(|e| Error::ThreadPool(e.to_string()))?;

    let started = AtomicUsize::new(0);
    let total = items.len();

    Ok(pool.install(|| {
        items
            .par_iter()
            .map(|item| {
                let current = started.fetch_add(1, Ordering::SeqCst) + 1;
                progress(&Progress {
                    current,
                    total,
                    item: item.display().to_string(),
                });
                work(item)
            })
            .collect()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_results_keep_input_order() {
        let items: Vec<PathBuf> = (0..20).map(|i| PathBuf::from(format!("{i}.png"))).collect();
        let results = run_bounded(&items, 3, |_| {}, |p| p.display().to_string()).unwrap();
        let expected: Vec<String> = items.iter().map(|p| p.display().to_string()).collect();
        assert_eq!(results, expected);
    }

    #[test]
    fn test_progress_counts_every_item() {
        let items: Vec<PathBuf> = (0..5).map(|i| PathBuf::from(format!("{i}.glb"))).collect();
        let seen = Mutex::new(Vec::new());
        run_bounded(&items, 2, |p| seen.lock().unwrap().push(p.current), |_| ()).unwrap();
        let mut seen = seen.into_inner().unwrap();
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_zero_concurrency_still_runs() {
        let items = vec![PathBuf::from("a")];
        assert_eq!(run_bounded(&items, 0, |_| {}, |_| 1).unwrap(), vec![1]);
    }
}
