#![allow(unused_macros)]

/// Helper macro for locking items
///
/// ```rust, ignore
///  let mut pending = lock!(self.pending);
///  pending.push(callback);
/// ```
macro_rules! lock {
    ($lock:expr) => {
        $lock.lock().expect("Failed to acquire lock")
    };
}
