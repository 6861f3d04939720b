use crate::anchor::{Anchor, AnchorKind};
use crate::clock::FrameClock;
use crate::error::Result;
use crate::identity::{Identity, WeakHandle};
use crate::lifecycle::HostAdapter;
use crate::registry::TetherRegistry;
use crate::report::{DriftReport, ReportItem};
use crate::retention::{DEFAULT_WAIT_TICKS, RetentionMode};
use crate::sink::{ReportSink, parse_sink_list};
use std::cell::{Cell, Ref, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

/// Environment variable read by [`ReporterBuilder::sinks_from_env`].
pub const SINKS_ENV: &str = "DRIFT_CHECK_SINKS";

/// Decides the retention mode of anchors without an explicit override.
/// 为没有显式覆盖的锚点决定保留模式。
pub type RetentionPolicy = Rc<dyn Fn(&dyn Anchor, &DriftReporter) -> RetentionMode>;

/// A check that runs when the host reports the anchor's destruction.
#[derive(Clone)]
pub(crate) struct DestructionCheck {
    pub(crate) anchor_type: &'static str,
    pub(crate) anchor: Option<Weak<dyn Anchor>>,
}

/// What an in-flight anchor is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Evaluation {
    /// A removal check is scheduled on the clock.
    Removal,
    /// A destruction check is armed and waits for the anchor to drop.
    Dealloc,
}

struct InstalledAdapter {
    adapter: Box<dyn HostAdapter>,
    installed: bool,
}

/// Builder for configuring a [`DriftReporter`].
///
/// # Example
/// ```
/// use drift_check::{DriftReporter, FrameClock, ReportSink};
/// use std::rc::Rc;
///
/// let reporter = DriftReporter::builder()
///     .clock(Rc::new(FrameClock::new()))
///     .sinks([ReportSink::Log])
///     .default_wait_ticks(3)
///     .build();
/// assert_eq!(reporter.default_wait_ticks(), 3);
/// ```
///
/// 用于配置 [`DriftReporter`] 的构建器。
pub struct ReporterBuilder {
    clock: Option<Rc<FrameClock>>,
    sinks: Vec<ReportSink>,
    default_wait_ticks: u32,
    policy: Option<RetentionPolicy>,
}

impl ReporterBuilder {
    /// Create a new builder with default settings.
    /// 创建一个带有默认设置的新构建器。
    #[inline]
    pub fn new() -> Self {
        Self {
            clock: None,
            sinks: ReportSink::defaults(),
            default_wait_ticks: DEFAULT_WAIT_TICKS,
            policy: None,
        }
    }

    /// Clock used for delayed checks.
    ///
    /// Default: the current thread's [`FrameClock::main`].
    #[inline]
    pub fn clock(mut self, clock: Rc<FrameClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replace the sink list.
    ///
    /// Default: `[Log, RuntimeWarning]`
    #[inline]
    pub fn sinks(mut self, sinks: impl IntoIterator<Item = ReportSink>) -> Self {
        self.sinks = sinks.into_iter().collect();
        self
    }

    /// Append one sink.
    #[inline]
    pub fn sink(mut self, sink: ReportSink) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Replace the sink list from a comma-separated list of names
    /// (`log`, `assert`, `breakpoint`, `runtime-warning`).
    ///
    /// 从逗号分隔的名称列表替换 sink 列表。
    pub fn sinks_from_str(mut self, list: &str) -> Result<Self> {
        self.sinks = parse_sink_list(list)?;
        Ok(self)
    }

    /// Replace the sink list from `DRIFT_CHECK_SINKS` when it is set.
    /// Leaves the list untouched when it is not.
    pub fn sinks_from_env(self) -> Result<Self> {
        match std::env::var(SINKS_ENV) {
            Ok(list) => self.sinks_from_str(&list),
            Err(_) => Ok(self),
        }
    }

    /// Wait used by the built-in policy for `OnRemovalFromHierarchy`.
    ///
    /// Default: `2`
    #[inline]
    pub fn default_wait_ticks(mut self, ticks: u32) -> Self {
        self.default_wait_ticks = ticks;
        self
    }

    /// Replace the built-in retention policy.
    #[inline]
    pub fn retention_policy(
        mut self,
        policy: impl Fn(&dyn Anchor, &DriftReporter) -> RetentionMode + 'static,
    ) -> Self {
        self.policy = Some(Rc::new(policy));
        self
    }

    pub fn build(self) -> Rc<DriftReporter> {
        Rc::new(DriftReporter {
            registry: RefCell::new(TetherRegistry::new()),
            overrides: RefCell::new(HashMap::new()),
            policy: RefCell::new(self.policy),
            in_flight: RefCell::new(HashMap::new()),
            destruction_checks: RefCell::new(HashMap::new()),
            sinks: RefCell::new(self.sinks),
            clock: self.clock.unwrap_or_else(FrameClock::main),
            default_wait_ticks: self.default_wait_ticks,
            adapters: RefCell::new(Vec::new()),
            started: Cell::new(false),
        })
    }
}

impl Default for ReporterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Monitors every anchor and tether, and reports objects that outlive their
/// anchor's retention window.
///
/// `DriftReporter` owns all of the auditor's state:
/// - the tether registry,
/// - explicit per-anchor retention modes,
/// - the retention policy,
/// - the set of anchors currently being evaluated,
/// - destruction-triggered checks waiting for their anchor to drop,
/// - the ordered list of report sinks.
///
/// It is `!Send` and `!Sync`: it lives on the UI thread, next to the host tree.
/// Every method releases its internal borrows before calling host code
/// (policies, sinks, continuations), so host code may call back in.
///
/// **Typical Usage**:
/// ```
/// use drift_check::DriftReporter;
///
/// // Once, early in the host's startup:
/// let reporter = DriftReporter::shared();
/// reporter.start();
/// ```
///
/// 监控所有锚点与系绳，并报告在锚点保留窗口结束后仍存活的对象。
/// `DriftReporter` 持有审计器的全部状态：系绳注册表、显式的逐锚点保留模式、
/// 保留策略、正在评估的锚点集合、等待锚点销毁的检查，以及有序的报告 sink 列表。
/// 它是 `!Send` 和 `!Sync` 的：它与宿主树一起位于 UI 线程上。
pub struct DriftReporter {
    registry: RefCell<TetherRegistry>,
    overrides: RefCell<HashMap<Identity, RetentionMode>>,
    policy: RefCell<Option<RetentionPolicy>>,
    in_flight: RefCell<HashMap<Identity, Evaluation>>,
    destruction_checks: RefCell<HashMap<Identity, DestructionCheck>>,
    sinks: RefCell<Vec<ReportSink>>,
    clock: Rc<FrameClock>,
    default_wait_ticks: u32,
    adapters: RefCell<Vec<InstalledAdapter>>,
    started: Cell<bool>,
}

thread_local! {
    static SHARED: Rc<DriftReporter> = ReporterBuilder::new().build();
}

impl DriftReporter {
    /// Create a reporter with default settings on the thread's main clock.
    #[inline]
    pub fn new() -> Rc<Self> {
        Self::builder().build()
    }

    #[inline]
    pub fn builder() -> ReporterBuilder {
        ReporterBuilder::new()
    }

    /// The thread's default reporter, used by anchors that do not name one.
    /// 线程的默认报告器，供未指定报告器的锚点使用。
    pub fn shared() -> Rc<Self> {
        SHARED.with(Rc::clone)
    }

    /// Start reporting: install the lifecycle hooks of every registered host
    /// adapter. Adapters registered later are installed immediately. Calling
    /// this more than once has no further effect.
    ///
    /// 开始报告：安装所有已注册宿主适配器的生命周期钩子。多次调用不会产生额外效果。
    pub fn start(&self) {
        if !self.started.replace(true) {
            debug!("drift reporting started");
        }
        self.install_pending_adapters();
    }

    #[inline]
    pub fn is_started(&self) -> bool {
        self.started.get()
    }

    /// Register the adapter for one host node kind.
    pub fn register_adapter(&self, adapter: Box<dyn HostAdapter>) {
        self.adapters.borrow_mut().push(InstalledAdapter {
            adapter,
            installed: false,
        });
        if self.is_started() {
            self.install_pending_adapters();
        }
    }

    fn install_pending_adapters(&self) {
        // Adapters run host code, which may register further adapters.
        let mut adapters = std::mem::take(&mut *self.adapters.borrow_mut());
        for entry in adapters.iter_mut().filter(|entry| !entry.installed) {
            entry.adapter.install();
            entry.installed = true;
            debug!(node_kind = entry.adapter.node_kind(), "installed lifecycle hooks");
        }
        let mut registered = self.adapters.borrow_mut();
        adapters.append(&mut *registered);
        *registered = adapters;
    }

    #[inline]
    pub fn clock(&self) -> &Rc<FrameClock> {
        &self.clock
    }

    #[inline]
    pub fn default_wait_ticks(&self) -> u32 {
        self.default_wait_ticks
    }

    // --- Sinks ---

    pub fn report_sinks(&self) -> Vec<ReportSink> {
        self.sinks.borrow().clone()
    }

    pub fn set_report_sinks(&self, sinks: impl IntoIterator<Item = ReportSink>) {
        *self.sinks.borrow_mut() = sinks.into_iter().collect();
    }

    // --- Retention modes ---

    pub fn set_retention_policy(
        &self,
        policy: impl Fn(&dyn Anchor, &DriftReporter) -> RetentionMode + 'static,
    ) {
        *self.policy.borrow_mut() = Some(Rc::new(policy));
    }

    /// Go back to [`default_retention_policy`].
    pub fn reset_retention_policy(&self) {
        *self.policy.borrow_mut() = None;
    }

    /// Effective mode of `anchor`: its explicit override, else the policy.
    pub fn retention_mode(&self, anchor: &dyn Anchor) -> RetentionMode {
        if let Some(mode) = self.retention_override(anchor.identity()) {
            return mode;
        }
        let policy = self.policy.borrow().clone();
        match policy {
            Some(policy) => policy(anchor, self),
            None => default_retention_policy(anchor, self),
        }
    }

    pub fn retention_override(&self, anchor: Identity) -> Option<RetentionMode> {
        self.overrides.borrow().get(&anchor).copied()
    }

    pub fn set_retention_mode(&self, anchor: Identity, mode: RetentionMode) {
        self.overrides.borrow_mut().insert(anchor, mode);
    }

    pub fn clear_retention_mode(&self, anchor: Identity) {
        self.overrides.borrow_mut().remove(&anchor);
    }

    // --- Tethers ---

    /// Read access to the tether registry.
    ///
    /// The returned guard must be dropped before tethering or evaluating.
    pub fn registry(&self) -> Ref<'_, TetherRegistry> {
        self.registry.borrow()
    }

    pub(crate) fn tether(&self, item: WeakHandle, anchor: Identity) {
        trace!(item = %item.id(), anchor = %anchor, "tether");
        self.registry.borrow_mut().register(item, anchor);
    }

    pub(crate) fn untether(&self, item: Identity, anchor: Identity) {
        trace!(item = %item, anchor = %anchor, "untether");
        self.registry.borrow_mut().unregister(item, anchor);
    }

    pub(crate) fn release_anchor(&self, anchor: Identity) -> usize {
        self.registry.borrow_mut().release_anchor(anchor)
    }

    // --- Evaluation state ---

    /// Whether `anchor` has a check in flight.
    pub fn is_evaluating(&self, anchor: Identity) -> bool {
        self.in_flight.borrow().contains_key(&anchor)
    }

    pub(crate) fn evaluation(&self, anchor: Identity) -> Option<Evaluation> {
        self.in_flight.borrow().get(&anchor).copied()
    }

    /// Mark `anchor` as in flight. Returns `false` if it already was.
    pub(crate) fn begin_evaluation(&self, anchor: Identity, evaluation: Evaluation) -> bool {
        let mut in_flight = self.in_flight.borrow_mut();
        if in_flight.contains_key(&anchor) {
            return false;
        }
        in_flight.insert(anchor, evaluation);
        true
    }

    pub(crate) fn finish_evaluation(&self, anchor: Identity) {
        self.in_flight.borrow_mut().remove(&anchor);
    }

    /// Whether a destruction-triggered check is armed for `anchor`.
    pub fn has_destruction_check(&self, anchor: Identity) -> bool {
        self.destruction_checks.borrow().contains_key(&anchor)
    }

    /// Arm (or re-arm) the destruction check of `anchor`, replacing any earlier one.
    pub(crate) fn arm_destruction_check(&self, anchor: Identity, check: DestructionCheck) {
        debug!(anchor = %anchor, anchor_type = check.anchor_type, "armed destruction check");
        self.destruction_checks.borrow_mut().insert(anchor, check);
    }

    /// Returns whether a check was armed.
    ///
    /// An in-flight `OnDealloc` evaluation ends with its check: nothing else
    /// would clear its marker.
    pub(crate) fn disarm_destruction_check(&self, anchor: Identity) -> bool {
        let disarmed = self.destruction_checks.borrow_mut().remove(&anchor).is_some();
        if disarmed {
            debug!(anchor = %anchor, "disarmed destruction check");
            if self.evaluation(anchor) == Some(Evaluation::Dealloc) {
                self.finish_evaluation(anchor);
            }
        }
        disarmed
    }

    pub(crate) fn take_destruction_check(&self, anchor: Identity) -> Option<DestructionCheck> {
        self.destruction_checks.borrow_mut().remove(&anchor)
    }

    /// Drain every tether of an anchor whose retention window has closed and
    /// report what is left.
    ///
    /// A drained object has drifted when it is still alive and no other anchor
    /// holds it. Dead objects and objects still anchored elsewhere are dropped
    /// silently. A report is produced (and dispatched to every sink, in order)
    /// when the anchor itself is still alive or at least one object drifted.
    ///
    /// The anchor's in-flight marker is cleared once the drain completes.
    ///
    /// 排空保留窗口已结束的锚点的所有系绳，并报告残留的对象。
    /// 若被排空的对象仍然存活且没有其他锚点持有它，则视为漂移。
    /// 当锚点本身仍然存活或至少有一个对象漂移时，生成报告并按顺序分发到每个 sink。
    pub fn check_for_drift(
        &self,
        anchor: Option<&dyn Anchor>,
        anchor_id: Identity,
        anchor_type: &'static str,
    ) -> Option<DriftReport> {
        let mut drifted = Vec::new();
        loop {
            let Some(handle) = self.registry.borrow_mut().pop_from(anchor_id) else {
                break;
            };
            let Some(item) = handle.upgrade() else {
                continue;
            };
            if self.registry.borrow().is_anchored(handle.id()) {
                continue;
            }
            drifted.push(ReportItem {
                id: handle.id(),
                type_name: handle.type_name(),
                retained: true,
                item: Some(handle.downgrade()),
            });
            // May run the object's destructor; no borrow is held here.
            drop(item);
        }
        self.finish_evaluation(anchor_id);

        let retained = anchor.is_some();
        if !retained && drifted.is_empty() {
            trace!(anchor = %anchor_id, "anchor and tethers released");
            return None;
        }

        let report = DriftReport {
            anchor_item: ReportItem {
                id: anchor_id,
                type_name: anchor_type,
                retained,
                item: None,
            },
            tethered_items: drifted,
        };
        debug!(
            anchor = %anchor_id,
            anchor_type,
            retained,
            drifted = report.tethered_items.len(),
            "drift detected"
        );
        for sink in self.report_sinks() {
            sink.handle(&report);
        }
        Some(report)
    }
}

impl std::fmt::Debug for DriftReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriftReporter")
            .field("started", &self.started.get())
            .field("tethered_anchors", &self.registry.borrow().anchor_count())
            .field("in_flight", &self.in_flight.borrow().len())
            .field("destruction_checks", &self.destruction_checks.borrow().len())
            .field("sinks", &self.sinks.borrow())
            .finish_non_exhaustive()
    }
}

/// The built-in retention policy.
///
/// - `View` anchors and framework-provided anchors: `OnDealloc` when they
///   carry tethers, `OptOut` otherwise.
/// - Everything else: `OnRemovalFromHierarchy` with the reporter's default wait.
///
/// 内置保留策略：视图锚点与框架提供的锚点在有系绳时为 `OnDealloc`，否则为 `OptOut`；
/// 其他一律为带默认等待的 `OnRemovalFromHierarchy`。
pub fn default_retention_policy(anchor: &dyn Anchor, reporter: &DriftReporter) -> RetentionMode {
    if anchor.kind() == AnchorKind::View || anchor.is_framework_type() {
        if reporter.registry().has_tethers(anchor.identity()) {
            RetentionMode::OnDealloc
        } else {
            RetentionMode::OptOut
        }
    } else {
        RetentionMode::on_removal_after(reporter.default_wait_ticks())
    }
}
