//! Bounded worker pool and cancellation

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Default ceiling on concurrent file operations
pub const DEFAULT_CONCURRENCY: usize = 12;

/// Cooperative cancellation signal.
///
/// Honored between generator units and between individual file writes,
/// never in the middle of one unit's work.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Run `work` over `items` on at most `concurrency` scoped threads.
///
/// Each worker builds its own state with `init`, so state that must not be
/// shared across threads (a schema engine context) never is. Results come
/// back in input order; items skipped after cancellation are `None`.
pub fn run_bounded<T, R, S, I, F>(
    items: &[T],
    concurrency: usize,
    cancel: &CancelToken,
    init: I,
    work: F,
) -> Vec<Option<R>>
where
    T: Sync,
    R: Send,
    I: Fn() -> S + Sync,
    F: Fn(&mut S, &T) -> R + Sync,
{
    let slots: Mutex<Vec<Option<R>>> = Mutex::new((0..items.len()).map(|_| None).collect());
    let next = AtomicUsize::new(0);
    let jobs = concurrency.max(1).min(items.len().max(1));

    std::thread::scope(|scope| {
        for _ in 0..jobs {
            scope.spawn(|| {
                let mut state = init();
                loop {
                    if cancel.is_cancelled() {
                        return;
                    }
                    let idx = next.fetch_add(1, Ordering::Relaxed);
                    if idx >= items.len() {
                        return;
                    }
                    let result = work(&mut state, &items[idx]);
                    slots.lock()[idx] = Some(result);
                }
            });
        }
    });

    slots.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results_keep_input_order() {
        let items: Vec<u32> = (0..50).collect();
        let out = run_bounded(&items, 4, &CancelToken::new(), || (), |_, n| n * 2);
        let out: Vec<u32> = out.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(out, items.iter().map(|n| n * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_state_is_per_worker() {
        let items: Vec<u32> = (0..20).collect();
        let out = run_bounded(
            &items,
            3,
            &CancelToken::new(),
            || 0usize,
            |seen, _| {
                *seen += 1;
                *seen
            },
        );
        assert!(out.iter().all(|r| r.is_some()));
    }

    #[test]
    fn test_cancelled_before_start_runs_nothing() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let items = vec![1, 2, 3];
        let out = run_bounded(&items, 2, &cancel, || (), |_, n| *n);
        assert!(out.iter().all(Option::is_none));
    }

    #[test]
    fn test_empty_input() {
        let items: Vec<u8> = Vec::new();
        assert!(run_bounded(&items, 12, &CancelToken::new(), || (), |_, n| *n).is_empty());
    }
}
