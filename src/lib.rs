//! Runtime leak auditing for UI trees.
//!
//! Objects are *tethered* to long-lived *anchor* nodes (screens, controllers,
//! views). Each anchor has a retention window, decided by its
//! [`RetentionMode`]. Once the window closes, every object tethered to the
//! anchor is expected to have been released; objects still alive with no other
//! anchor holding them have *drifted* and are reported through the configured
//! [`ReportSink`]s.
//!
//! The crate never prevents a leak. It detects, after the fact, that an object
//! outlived its declared retention contract.
//!
//! **Host integration**: the host implements [`Anchor`] for its node kinds,
//! calls [`node_left_tree`] and [`node_will_drop`] from its lifecycle, and
//! drives [`FrameClock::tick`] once per frame.
//!
//! ```
//! use drift_check::{Anchor, AnchorPoint, DriftReporter, FrameClock, ReportSink};
//! use std::cell::{Cell, RefCell};
//! use std::rc::Rc;
//!
//! struct Screen {
//!     attached: Cell<bool>,
//!     reporter: Rc<DriftReporter>,
//! }
//!
//! impl Anchor for Screen {
//!     fn is_in_hierarchy(&self) -> bool {
//!         self.attached.get()
//!     }
//!     fn children(&self) -> Vec<Rc<dyn Anchor>> {
//!         Vec::new()
//!     }
//!     fn reporter(&self) -> Rc<DriftReporter> {
//!         self.reporter.clone()
//!     }
//! }
//!
//! let clock = Rc::new(FrameClock::new());
//! let reports = Rc::new(RefCell::new(Vec::new()));
//! let sink = reports.clone();
//! let reporter = DriftReporter::builder()
//!     .clock(clock.clone())
//!     .sinks([ReportSink::custom(move |report| sink.borrow_mut().push(report.clone()))])
//!     .build();
//!
//! let screen = Rc::new(Screen { attached: Cell::new(true), reporter });
//! let model = Rc::new(String::from("view model"));
//! screen.tether(&model);
//!
//! // The screen is dismissed but something still holds the model.
//! screen.attached.set(false);
//! screen.prepare_to_check_status();
//! clock.advance(2);
//!
//! assert_eq!(reports.borrow().len(), 1);
//! assert_eq!(reports.borrow()[0].tethered_items.len(), 1);
//! ```
//!
//! UI 树的运行时泄漏审计。对象被"系"到长期存在的锚点节点上。
//! 每个锚点都有一个由 [`RetentionMode`] 决定的保留窗口。窗口结束后，
//! 系在锚点上的所有对象都应已被释放；仍然存活且没有其他锚点持有的对象
//! 被视为"漂移"，并通过已配置的 [`ReportSink`] 报告。

mod anchor;
mod clock;
mod error;
mod identity;
mod lifecycle;
mod registry;
mod report;
mod reporter;
mod retention;
mod sink;

pub use anchor::{
    Anchor, AnchorKind, AnchorPoint, clear_retention_mode, retention_mode, set_retention_mode,
    tether, untether, walk_to_root,
};
pub use clock::{FrameClock, TickWait};
pub use error::{Error, Result};
pub use identity::{Identity, WeakHandle};
pub use lifecycle::{HostAdapter, node_left_tree, node_will_drop, prepare_to_check_status};
pub use registry::TetherRegistry;
pub use report::{DriftReport, ReportItem};
pub use reporter::{
    DriftReporter, ReporterBuilder, RetentionPolicy, SINKS_ENV, default_retention_policy,
};
pub use retention::{DEFAULT_WAIT_TICKS, RetentionMode};
pub use sink::ReportSink;

#[cfg(test)]
mod tests;
