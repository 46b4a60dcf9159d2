use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Concurrency cap for decode/analyze and normalization subprocess work.
pub(crate) const MAX_PARALLEL_JOBS: usize = 4;

/// Run `job(0..count)` on up to `cap` worker threads, returning the results
/// in index order. Workers pull the next free index from a shared cursor so
/// the pool stays saturated regardless of per-item runtime.
pub(crate) fn run_indexed<T, F>(count: usize, cap: usize, job: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync,
{
    if count == 0 {
        return Vec::new();
    }
    let workers = cap.max(1).min(count);
    let cursor = AtomicUsize::new(0);
    let slots: Mutex<Vec<Option<T>>> = Mutex::new((0..count).map(|_| None).collect());

    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                loop {
                    let idx = cursor.fetch_add(1, Ordering::Relaxed);
                    if idx >= count {
                        break;
                    }
                    let result = job(idx);
                    slots.lock().expect("batch slots mutex poisoned")[idx] = Some(result);
                }
            });
        }
    });

    slots
        .into_inner()
        .expect("batch slots mutex poisoned")
        .into_iter()
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_preserve_caller_order() {
        let results = run_indexed(16, 4, |idx| idx * 10);
        assert_eq!(results, (0..16).map(|i| i * 10).collect::<Vec<_>>());
    }

    #[test]
    fn concurrency_never_exceeds_the_cap() {
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        run_indexed(32, 4, |_| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(5));
            active.fetch_sub(1, Ordering::SeqCst);
        });
        assert!(peak.load(Ordering::SeqCst) <= 4);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let results: Vec<u32> = run_indexed(0, 4, |_| 1);
        assert!(results.is_empty());
    }
}
