use crate::error::{Error, Result};
use futures::channel::oneshot;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use tracing::trace;

/// A continuation waiting for its tick.
/// 等待其 tick 的延续。
type Continuation = Box<dyn FnOnce()>;

/// Continuations filed by the tick on which they are due.
///
/// This struct encapsulates the logic for:
/// - Storing continuations in deadline-ordered bags.
/// - Managing a pool of vectors to reduce allocation overhead.
/// - Handing out the bags that are due on a given tick.
///
/// 按到期 tick 归档的延续。
///
/// 此结构体封装了以下逻辑：
/// - 将延续存储在按截止 tick 排序的袋子中。
/// - 管理向量池以减少分配开销。
/// - 交出在给定 tick 到期的袋子。
struct WaitSet {
    /// Bags ordered by deadline. Each element is (deadline, continuations in arming order).
    queue: VecDeque<(u64, Vec<Continuation>)>,
    /// Pool of empty vectors to reduce allocation.
    pool: Vec<Vec<Continuation>>,
    /// Total number of continuations in the queue.
    count: usize,
}

impl WaitSet {
    fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            pool: Vec::new(),
            count: 0,
        }
    }

    #[inline]
    fn len(&self) -> usize {
        self.count
    }

    /// File a continuation under `deadline`.
    ///
    /// Appends to the bag for that deadline if one exists, otherwise inserts a
    /// new bag (possibly reused from the pool) at its sorted position.
    ///
    /// 将延续归档到 `deadline` 下。
    /// 若该截止 tick 已有袋子则追加，否则在有序位置插入一个新袋子（可能从池中复用）。
    fn add(&mut self, continuation: Continuation, deadline: u64) {
        match self.queue.binary_search_by_key(&deadline, |(due, _)| *due) {
            Ok(index) => self.queue[index].1.push(continuation),
            Err(index) => {
                let mut bag = self.pool.pop().unwrap_or_else(|| Vec::with_capacity(4));
                bag.push(continuation);
                self.queue.insert(index, (deadline, bag));
            }
        }
        self.count += 1;
    }

    /// Take every bag due at or before `now`, in deadline order.
    fn take_due(&mut self, now: u64) -> Vec<Vec<Continuation>> {
        let mut due = Vec::new();
        while let Some((deadline, _)) = self.queue.front() {
            if *deadline > now {
                break;
            }
            if let Some((_, bag)) = self.queue.pop_front() {
                self.count -= bag.len();
                due.push(bag);
            }
        }
        due
    }

    fn recycle(&mut self, bag: Vec<Continuation>) {
        debug_assert!(bag.is_empty());
        self.pool.push(bag);
    }
}

struct ClockState {
    /// Ticks delivered so far.
    elapsed: u64,
    waits: WaitSet,
}

/// The host's once-per-frame clock, and the scheduler built on it.
///
/// The host calls [`FrameClock::tick`] once per rendered frame. Anything that
/// needs to happen "N frames from now" is scheduled with [`FrameClock::wait`]
/// (callback form) or [`FrameClock::wait_async`] (suspending form).
///
/// `FrameClock` is `!Send` and `!Sync`; it belongs to the UI thread.
///
/// **Re-entrancy**: continuations run after the clock has released its
/// internal state, so they may arm new waits. A wait armed from inside a tick
/// counts from the next tick.
///
/// 宿主的逐帧时钟，以及构建在其上的调度器。
/// 宿主每渲染一帧调用一次 [`FrameClock::tick`]。需要"N 帧之后"发生的事情
/// 通过 [`FrameClock::wait`]（回调形式）或 [`FrameClock::wait_async`]（挂起形式）调度。
/// **可重入性**：延续在时钟释放内部状态之后运行，因此它们可以安排新的等待。
/// 在 tick 内部安排的等待从下一个 tick 开始计数。
pub struct FrameClock {
    state: RefCell<ClockState>,
}

thread_local! {
    static MAIN_CLOCK: Rc<FrameClock> = Rc::new(FrameClock::new());
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(ClockState {
                elapsed: 0,
                waits: WaitSet::new(),
            }),
        }
    }

    /// The clock of the current thread, used by [`DriftReporter::shared`].
    ///
    /// [`DriftReporter::shared`]: crate::DriftReporter::shared
    pub fn main() -> Rc<FrameClock> {
        MAIN_CLOCK.with(Rc::clone)
    }

    /// Run `continuation` once `ticks` ticks have elapsed.
    ///
    /// With `ticks == 0` the continuation runs synchronously, before this call
    /// returns. Otherwise it runs exactly once, on the `ticks`-th call to
    /// [`tick`](Self::tick) from now. There is no way to cancel it.
    ///
    /// 在经过 `ticks` 个 tick 后运行 `continuation`。
    /// `ticks == 0` 时同步运行。否则恰好运行一次。无法取消。
    pub fn wait(&self, ticks: u32, continuation: impl FnOnce() + 'static) {
        if ticks == 0 {
            continuation();
            return;
        }
        let mut state = self.state.borrow_mut();
        let deadline = state.elapsed + u64::from(ticks);
        state.waits.add(Box::new(continuation), deadline);
        trace!(ticks, deadline, "armed tick wait");
    }

    /// Suspend until `ticks` ticks have elapsed.
    ///
    /// The wait is armed immediately, not on first poll, so ticks delivered
    /// before the future is polled still count. Resolves to
    /// [`Error::ClockStopped`] if the clock is dropped before the wait completes.
    ///
    /// 挂起直到经过 `ticks` 个 tick。等待立即被安排，而不是在首次 poll 时。
    /// 如果时钟在等待完成前被 drop，则返回 [`Error::ClockStopped`]。
    pub fn wait_async(&self, ticks: u32) -> TickWait {
        let (resume, receiver) = oneshot::channel();
        self.wait(ticks, move || {
            // The receiver may already be gone; nobody is left to resume.
            let _ = resume.send(());
        });
        TickWait { receiver }
    }

    /// Deliver one tick. Returns the number of continuations that ran.
    ///
    /// **Panics**: a panicking continuation (e.g. under
    /// [`ReportSink::AssertImmediate`]) unwinds out of `tick`. The continuations
    /// still due on this tick are dropped without running, so the anchors they
    /// would have checked stay marked as in flight.
    ///
    /// 投递一个 tick。返回运行的延续数量。
    /// 若某个延续 panic，本 tick 中其余到期的延续会被丢弃而不运行。
    ///
    /// [`ReportSink::AssertImmediate`]: crate::ReportSink::AssertImmediate
    pub fn tick(&self) -> usize {
        let due = {
            let mut state = self.state.borrow_mut();
            state.elapsed += 1;
            let now = state.elapsed;
            state.waits.take_due(now)
        };

        let mut fired = 0;
        for mut bag in due {
            for continuation in bag.drain(..) {
                continuation();
                fired += 1;
            }
            self.state.borrow_mut().waits.recycle(bag);
        }
        fired
    }

    /// Deliver `ticks` ticks in a row. Returns the total number of continuations run.
    pub fn advance(&self, ticks: u32) -> usize {
        (0..ticks).map(|_| self.tick()).sum()
    }

    /// Number of continuations still waiting.
    #[inline]
    pub fn pending(&self) -> usize {
        self.state.borrow().waits.len()
    }

    /// Ticks delivered since the clock was created.
    #[inline]
    pub fn elapsed(&self) -> u64 {
        self.state.borrow().elapsed
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("FrameClock")
            .field("elapsed", &state.elapsed)
            .field("pending", &state.waits.len())
            .finish()
    }
}

/// Future returned by [`FrameClock::wait_async`].
/// [`FrameClock::wait_async`] 返回的 future。
#[must_use = "futures do nothing unless polled"]
pub struct TickWait {
    receiver: oneshot::Receiver<()>,
}

impl Future for TickWait {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|resumed| resumed.map_err(|_| Error::ClockStopped))
    }
}
