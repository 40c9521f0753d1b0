pub mod in_memory;
pub mod log_notifier;
pub mod mock;
pub mod postgres;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// テスト用アダプターの共有状態をロックする
///
/// パニックしたスレッドが残した状態もそのまま使う。
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
