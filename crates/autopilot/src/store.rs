//! Ambient result and output store.
//!
//! Check helpers deep inside a command body record findings with [`append`] and
//! [`set_output`] without threading a context through every call. The store lives in a
//! thread-local: an app runs single-threaded, so it behaves as the process-wide singleton the
//! protocol expects, while tests running in parallel threads never see each other's results.
//!
//! [`crate::App`] clears the store once at the start of every invocation. Tests isolate
//! themselves with [`protect`] / [`protect_results`], which swap in an empty store and restore
//! the previous contents on every exit path, panics included.

use std::cell::RefCell;

use autopilot_protocol::{CheckResult, OutputMap};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultStore {
    pub results: Vec<CheckResult>,
    pub outputs: OutputMap,
}

thread_local! {
    static STORE: RefCell<ResultStore> = RefCell::new(ResultStore::default());
}

fn with_store<T>(f: impl FnOnce(&mut ResultStore) -> T) -> T {
    STORE.with(|store| f(&mut store.borrow_mut()))
}

pub fn append(result: CheckResult) {
    with_store(|store| store.results.push(result));
}

pub fn append_all(results: impl IntoIterator<Item = CheckResult>) {
    with_store(|store| store.results.extend(results));
}

pub fn set_output(key: impl Into<String>, value: impl Into<String>) {
    with_store(|store| {
        store.outputs.insert(key, value);
    });
}

pub fn results() -> Vec<CheckResult> {
    with_store(|store| store.results.clone())
}

/// Results appended after the first `start` ones.
pub fn results_since(start: usize) -> Vec<CheckResult> {
    with_store(|store| store.results.get(start..).unwrap_or_default().to_vec())
}

pub fn len() -> usize {
    with_store(|store| store.results.len())
}

pub fn is_empty() -> bool {
    len() == 0
}

pub fn outputs() -> OutputMap {
    with_store(|store| store.outputs.clone())
}

pub fn clear() {
    with_store(|store| *store = ResultStore::default());
}

/// Replaces the store contents, returning what was there before.
pub fn replace(contents: ResultStore) -> ResultStore {
    with_store(|store| std::mem::replace(store, contents))
}

/// Scoped reset: the store is empty while the guard lives and gets its previous contents back
/// when the guard is dropped.
#[must_use = "the store is restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ProtectedResults {
    saved: Option<ResultStore>,
}

pub fn protect() -> ProtectedResults {
    ProtectedResults {
        saved: Some(replace(ResultStore::default())),
    }
}

impl Drop for ProtectedResults {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            // try_with: the thread-local may already be gone during thread teardown.
            let _ = STORE.try_with(|store| {
                if let Ok(mut store) = store.try_borrow_mut() {
                    *store = saved;
                }
            });
        }
    }
}

/// Closure form of [`protect`].
pub fn protect_results<T>(f: impl FnOnce() -> T) -> T {
    let _guard = protect();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protect_restores_previous_contents() {
        clear();
        append(CheckResult::fulfilled("outer", "kept"));
        set_output("outer", "1");

        protect_results(|| {
            assert!(is_empty());
            assert!(outputs().is_empty());
            append(CheckResult::unfulfilled("inner", "dropped"));
            set_output("inner", "2");
            assert_eq!(len(), 1);
        });

        assert_eq!(results(), vec![CheckResult::fulfilled("outer", "kept")]);
        assert_eq!(outputs().get("outer"), Some("1"));
        assert!(!outputs().contains_key("inner"));
    }

    #[test]
    fn protect_restores_after_panic() {
        clear();
        append(CheckResult::fulfilled("outer", "kept"));

        let outcome = std::panic::catch_unwind(|| {
            protect_results(|| {
                append(CheckResult::unfulfilled("inner", "dropped"));
                panic!("boom");
            })
        });

        assert!(outcome.is_err());
        assert_eq!(results().len(), 1);
        assert_eq!(results()[0].criterion, "outer");
    }

    #[test]
    fn results_since_slices_the_tail() {
        let _guard = protect();
        append_all([
            CheckResult::fulfilled("a", ""),
            CheckResult::fulfilled("b", ""),
        ]);
        assert_eq!(results_since(1).len(), 1);
        assert_eq!(results_since(1)[0].criterion, "b");
        assert!(results_since(5).is_empty());
    }
}
