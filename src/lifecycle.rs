//! The retention state machine and the host-facing lifecycle notifications.
//!
//! An anchor is `Idle` until a host notification reaches
//! [`prepare_to_check_status`]. Depending on its retention mode it then stays
//! idle (`OptOut`), or becomes `Evaluating` (its id sits in the reporter's
//! in-flight set) until its check has run, either a fixed number of ticks after
//! leaving the tree or one tick after its destruction.
//!
//! 保留状态机与面向宿主的生命周期通知。

use crate::anchor::Anchor;
use crate::identity::WeakHandle;
use crate::reporter::{DestructionCheck, DriftReporter, Evaluation};
use crate::retention::RetentionMode;
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

/// Wires the lifecycle notifications of one host node kind.
///
/// Hosts register one adapter per node kind with
/// [`DriftReporter::register_adapter`]; [`DriftReporter::start`] installs each
/// adapter exactly once. Once installed, the host calls [`node_left_tree`] and
/// [`node_will_drop`] for nodes of that kind.
///
/// 连接某种宿主节点类型的生命周期通知。
pub trait HostAdapter {
    /// Name of the node kind, for diagnostics.
    fn node_kind(&self) -> &str;

    /// Start delivering notifications for this node kind.
    fn install(&self);
}

/// Host notification: `anchor` has left the live tree.
pub fn node_left_tree(anchor: &Rc<dyn Anchor>) {
    trace!(anchor = %anchor.identity(), "node left tree");
    prepare_to_check_status(anchor);
}

/// The state machine's single entry point.
///
/// 1. Resolve the effective retention mode (override, else policy).
/// 2. `OptOut`: disarm any destruction check (ending an in-flight `OnDealloc`
///    evaluation), cascade to children, stop.
/// 3. If a check for this anchor is already in flight, stop.
/// 4. Tether the anchor's implicit tethers.
/// 5. `OnRemovalFromHierarchy`: disarm any destruction check, cascade to
///    children, and after `wait_ticks` ticks evaluate the anchor unless it is
///    back in the tree at that moment.
/// 6. `OnDealloc`: arm a destruction check.
///
/// Membership is tested once, when the wait ends: leaving, returning and
/// leaving again before the deadline looks the same as never returning.
///
/// 状态机的唯一入口。成员关系只在等待结束时测试一次。
pub fn prepare_to_check_status(anchor: &Rc<dyn Anchor>) {
    let reporter = anchor.reporter();
    let anchor_id = anchor.identity();
    let mode = reporter.retention_mode(&**anchor);

    if mode.is_opt_out() {
        reporter.disarm_destruction_check(anchor_id);
        notify_children(&**anchor);
        return;
    }

    let evaluation = match mode {
        RetentionMode::OnRemovalFromHierarchy { .. } => Evaluation::Removal,
        _ => Evaluation::Dealloc,
    };
    if !reporter.begin_evaluation(anchor_id, evaluation) {
        trace!(anchor = %anchor_id, "check already in flight");
        return;
    }

    for handle in anchor.implicit_tethers() {
        tether_handle(&**anchor, handle);
    }

    if let RetentionMode::OnRemovalFromHierarchy { wait_ticks } = mode {
        reporter.disarm_destruction_check(anchor_id);
        notify_children(&**anchor);
        schedule_removal_check(&reporter, anchor, wait_ticks);
    } else {
        arm_destruction_check(&reporter, &**anchor, Some(anchor));
    }
}

/// Host notification: `anchor` is about to be destroyed.
///
/// Call this from the node's `Drop`. If a destruction check is armed, the
/// anchor's children are notified first and its tethers are evaluated on the
/// next tick. If a removal check is still waiting, that check drains the
/// tethers when it fires. Otherwise the anchor's tethers are released without
/// evaluation.
///
/// 宿主通知：`anchor` 即将被销毁。应在节点的 `Drop` 中调用。
pub fn node_will_drop(anchor: &dyn Anchor) {
    let reporter = anchor.reporter();
    let anchor_id = anchor.identity();
    // The id may be handed to a new allocation after this point.
    reporter.clear_retention_mode(anchor_id);

    if let Some(check) = reporter.take_destruction_check(anchor_id) {
        debug!(anchor = %anchor_id, anchor_type = check.anchor_type, "destruction check fired");
        notify_children(anchor);
        let weak_reporter = Rc::downgrade(&reporter);
        reporter.clock().wait(1, move || {
            let Some(reporter) = weak_reporter.upgrade() else {
                return;
            };
            let anchor = check.anchor.as_ref().and_then(Weak::upgrade);
            reporter.check_for_drift(anchor.as_deref(), anchor_id, check.anchor_type);
        });
    } else if reporter.evaluation(anchor_id) == Some(Evaluation::Removal) {
        trace!(anchor = %anchor_id, "dropped while a removal check is waiting");
    } else {
        reporter.finish_evaluation(anchor_id);
        let released = reporter.release_anchor(anchor_id);
        if released > 0 {
            debug!(anchor = %anchor_id, released, "released tethers of unchecked anchor");
        }
    }
}

/// Register `handle` on `anchor` and, unless the anchor is opted out, (re)arm
/// its destruction check.
pub(crate) fn tether_handle(anchor: &dyn Anchor, handle: WeakHandle) {
    let reporter = anchor.reporter();
    reporter.tether(handle, anchor.identity());
    if !reporter.retention_mode(anchor).is_opt_out() {
        arm_destruction_check(&reporter, anchor, None);
    }
}

fn notify_children(anchor: &dyn Anchor) {
    for child in anchor.children() {
        prepare_to_check_status(&child);
    }
}

fn arm_destruction_check(
    reporter: &DriftReporter,
    anchor: &dyn Anchor,
    strong: Option<&Rc<dyn Anchor>>,
) {
    reporter.arm_destruction_check(
        anchor.identity(),
        DestructionCheck {
            anchor_type: anchor.type_name(),
            anchor: strong.map(Rc::downgrade),
        },
    );
}

fn schedule_removal_check(reporter: &Rc<DriftReporter>, anchor: &Rc<dyn Anchor>, wait_ticks: u32) {
    let anchor_id = anchor.identity();
    let anchor_type = anchor.type_name();
    let weak_anchor = Rc::downgrade(anchor);
    let weak_reporter = Rc::downgrade(reporter);
    debug!(anchor = %anchor_id, anchor_type, ticks = wait_ticks, "scheduled removal check");

    reporter.clock().wait(wait_ticks, move || {
        let Some(reporter) = weak_reporter.upgrade() else {
            return;
        };
        let anchor = weak_anchor.upgrade();
        if anchor.as_ref().is_some_and(|anchor| anchor.is_in_hierarchy()) {
            debug!(anchor = %anchor_id, "back in tree, skipping check");
            reporter.finish_evaluation(anchor_id);
            return;
        }
        reporter.check_for_drift(anchor.as_deref(), anchor_id, anchor_type);
    });
}
