#![allow(unused_macros)]

/// Helper macro for locking items
///
/// ```rust, ignore
///  let mut state = lock!(sink.state);
///  state.cookie = None;
/// ```
macro_rules! lock {
    ($lock:expr) => {
        $lock.lock().expect("Failed to acquire lock")
    };
}

/// Helper macro for working on a locked item inside a closure, releasing the guard
/// before the result is returned
///
/// ```rust, ignore
///  let handlers = with_lock!(sink.state, |state| state.handlers_for(dispid));
/// ```
macro_rules! with_lock {
    ($lock:expr, $closure:expr) => {{
        let mut guard = $lock.lock().expect("Failed to acquire lock");
        $closure(&mut *guard)
    }};
}
