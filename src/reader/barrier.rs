//! One-shot completion barrier
//!
//! 一次性完成屏障

use parking_lot::{Condvar, Mutex};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Lifecycle of a [`CompletionBarrier`]
///
/// [`CompletionBarrier`] 的生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierState {
    /// Waiting for arrivals
    ///
    /// 等待到达
    Armed { expected: usize, arrived: usize },

    /// The last arrival is running the finalize action
    ///
    /// 最后一个到达者正在执行收尾动作
    Triggered,

    /// Finalize has run; terminal
    ///
    /// 收尾动作已执行；终态
    Finalized,
}

type Finalize<'f, T> = Box<dyn FnOnce() -> T + Send + 'f>;

/// Releases exactly once after a fixed number of arrivals
///
/// 在固定次数的到达后恰好释放一次
///
/// The barrier hands out one [`Arrival`] token per expected participant.
/// Each token arrives exactly once, either explicitly or when dropped, so a
/// participant that fails or unwinds still releases its siblings. The last
/// arrival runs the finalize action on its own thread; every other explicit
/// [`Arrival::arrive`] blocks until finalize has completed.
///
/// 屏障为每个参与者发放一个 [`Arrival`] 令牌。每个令牌恰好到达一次，
/// 显式调用或在 drop 时自动到达，因此失败或 panic 的参与者也不会阻塞其他参与者。
/// 最后一个到达者在自己的线程上执行收尾动作；其余显式到达者阻塞直到收尾完成。
///
/// # Examples
///
/// ```
/// use ranged_lines::CompletionBarrier;
/// use std::num::NonZeroUsize;
///
/// let barrier = CompletionBarrier::new(NonZeroUsize::new(3).unwrap(), || "done");
/// let arrivals = barrier.arrivals().unwrap();
///
/// std::thread::scope(|s| {
///     for arrival in arrivals {
///         s.spawn(move || arrival.arrive());
///     }
/// });
///
/// assert_eq!(barrier.into_outcome(), Some("done"));
/// ```
pub struct CompletionBarrier<'f, T> {
    expected: usize,
    arrived: AtomicUsize,
    issued: AtomicBool,
    finalize: Mutex<Option<Finalize<'f, T>>>,
    outcome: Mutex<Option<T>>,
    finalized: Mutex<bool>,
    released: Condvar,
}

impl<'f, T> CompletionBarrier<'f, T> {
    /// Arm a barrier expecting `expected` arrivals
    ///
    /// 创建一个等待 `expected` 次到达的屏障
    pub fn new(expected: NonZeroUsize, finalize: impl FnOnce() -> T + Send + 'f) -> Self {
        Self {
            expected: expected.get(),
            arrived: AtomicUsize::new(0),
            issued: AtomicBool::new(false),
            finalize: Mutex::new(Some(Box::new(finalize))),
            outcome: Mutex::new(None),
            finalized: Mutex::new(false),
            released: Condvar::new(),
        }
    }

    /// Hand out the arrival tokens; only the first call returns them
    ///
    /// 发放到达令牌；只有第一次调用会返回
    pub fn arrivals(&self) -> Option<Vec<Arrival<'_, 'f, T>>> {
        if self.issued.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(
            (0..self.expected)
                .map(|_| Arrival { barrier: self, done: false })
                .collect(),
        )
    }

    #[inline]
    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn state(&self) -> BarrierState {
        if *self.finalized.lock() {
            return BarrierState::Finalized;
        }
        match self.arrived.load(Ordering::Acquire) {
            n if n >= self.expected => BarrierState::Triggered,
            arrived => BarrierState::Armed { expected: self.expected, arrived },
        }
    }

    /// Take the value produced by finalize, if it has run
    ///
    /// 取出收尾动作的结果（如已执行）
    pub fn take_outcome(&self) -> Option<T> {
        self.outcome.lock().take()
    }

    pub fn into_outcome(self) -> Option<T> {
        self.outcome.into_inner()
    }

    fn arrive(&self, wait: bool) {
        let arrived = self.arrived.fetch_add(1, Ordering::AcqRel) + 1;
        debug_assert!(arrived <= self.expected, "more arrivals than tokens");

        if arrived == self.expected {
            let finalize = self.finalize.lock().take();
            if let Some(finalize) = finalize {
                // Release waiters even if finalize unwinds.
                let _release = ReleaseOnDrop(self);
                let value = finalize();
                *self.outcome.lock() = Some(value);
            }
            return;
        }
        if !wait {
            return;
        }

        let mut finalized = self.finalized.lock();
        while !*finalized {
            self.released.wait(&mut finalized);
        }
    }

    fn release(&self) {
        *self.finalized.lock() = true;
        self.released.notify_all();
    }
}

struct ReleaseOnDrop<'a, 'f, T>(&'a CompletionBarrier<'f, T>);

impl<T> Drop for ReleaseOnDrop<'_, '_, T> {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Proof of participation in a [`CompletionBarrier`]
///
/// 参与 [`CompletionBarrier`] 的凭据
///
/// Dropping an unused token counts as arriving without waiting for finalize.
///
/// 未使用的令牌在 drop 时视为到达，但不等待收尾动作。
pub struct Arrival<'b, 'f, T> {
    barrier: &'b CompletionBarrier<'f, T>,
    done: bool,
}

impl<T> Arrival<'_, '_, T> {
    /// Arrive and block until finalize has run
    ///
    /// 到达并阻塞直到收尾动作完成
    pub fn arrive(mut self) {
        self.done = true;
        self.barrier.arrive(true);
    }
}

impl<T> Drop for Arrival<'_, '_, T> {
    fn drop(&mut self) {
        if !self.done {
            self.done = true;
            self.barrier.arrive(false);
        }
    }
}

impl<T> std::fmt::Debug for Arrival<'_, '_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arrival").field("done", &self.done).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn n(value: usize) -> NonZeroUsize {
        NonZeroUsize::new(value).unwrap()
    }

    #[test]
    fn test_single_arrival_finalizes() {
        let barrier = CompletionBarrier::new(n(1), || 42);
        let mut arrivals = barrier.arrivals().unwrap();
        assert_eq!(barrier.state(), BarrierState::Armed { expected: 1, arrived: 0 });

        arrivals.pop().unwrap().arrive();
        assert_eq!(barrier.state(), BarrierState::Finalized);
        assert_eq!(barrier.take_outcome(), Some(42));
    }

    #[test]
    fn test_tokens_issued_once() {
        let barrier = CompletionBarrier::new(n(2), || ());
        let first = barrier.arrivals();
        assert_eq!(first.as_ref().map(Vec::len), Some(2));
        assert!(barrier.arrivals().is_none());
    }

    #[test]
    fn test_finalize_runs_exactly_once_after_all() {
        let runs = AtomicU32::new(0);
        let arrived_before = AtomicUsize::new(0);
        let workers = 16;

        let barrier = CompletionBarrier::new(n(workers), || {
            runs.fetch_add(1, Ordering::SeqCst);
            arrived_before.load(Ordering::SeqCst)
        });
        let arrivals = barrier.arrivals().unwrap();

        std::thread::scope(|s| {
            for arrival in arrivals {
                let arrived_before = &arrived_before;
                s.spawn(move || {
                    arrived_before.fetch_add(1, Ordering::SeqCst);
                    arrival.arrive();
                });
            }
        });

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(barrier.into_outcome(), Some(workers));
    }

    #[test]
    fn test_no_arrival_returns_before_finalize() {
        let finished = AtomicBool::new(false);
        let barrier = CompletionBarrier::new(n(4), || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            finished.store(true, Ordering::SeqCst);
        });
        let arrivals = barrier.arrivals().unwrap();

        std::thread::scope(|s| {
            for arrival in arrivals {
                let finished = &finished;
                s.spawn(move || {
                    arrival.arrive();
                    assert!(finished.load(Ordering::SeqCst));
                });
            }
        });
    }

    #[test]
    fn test_dropped_token_counts_as_arrival() {
        let barrier = CompletionBarrier::new(n(3), || "released");
        let arrivals = barrier.arrivals().unwrap();

        std::thread::scope(|s| {
            for (i, arrival) in arrivals.into_iter().enumerate() {
                s.spawn(move || {
                    if i == 1 {
                        drop(arrival);
                    } else {
                        arrival.arrive();
                    }
                });
            }
        });

        assert_eq!(barrier.state(), BarrierState::Finalized);
        assert_eq!(barrier.into_outcome(), Some("released"));
    }

    #[test]
    fn test_panicking_participant_still_arrives() {
        let barrier = CompletionBarrier::new(n(2), || 7);
        let arrivals = barrier.arrivals().unwrap();

        std::thread::scope(|s| {
            let handles: Vec<_> = arrivals
                .into_iter()
                .enumerate()
                .map(|(i, arrival)| {
                    s.spawn(move || {
                        let _arrival = arrival;
                        if i == 0 {
                            panic!("worker failed");
                        }
                    })
                })
                .collect();
            let panicked = handles.into_iter().filter_map(|h| h.join().err()).count();
            assert_eq!(panicked, 1);
        });

        assert_eq!(barrier.into_outcome(), Some(7));
    }
}
