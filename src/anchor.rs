use crate::identity::{Identity, WeakHandle};
use crate::lifecycle;
use crate::reporter::DriftReporter;
use crate::retention::RetentionMode;
use std::any::Any;
use std::rc::Rc;

/// Broad shape of an anchor, used by the default retention policy.
/// 锚点的大致形态，供默认保留策略使用。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnchorKind {
    /// A node that owns a screen's worth of state and is normally released when
    /// it leaves the tree (a controller, a screen, a route).
    Controller,
    /// A leaf-ish visual node. Views are frequently cached and reused, so by
    /// default they are only checked when they carry tethers, and only on
    /// destruction.
    View,
}

/// The host binding contract: what a host framework implements for every
/// monitorable node kind.
///
/// The trait is object safe; hosts keep their nodes as `Rc<dyn Anchor>` (or
/// `Rc<ConcreteNode>`) and deliver two notifications:
/// [`node_left_tree`](crate::node_left_tree) and
/// [`node_will_drop`](crate::node_will_drop).
///
/// **Identity**: the default [`identity`](Anchor::identity) is the address of
/// `self`, which matches `Identity::of_rc` for the `Rc` holding the node. Hosts
/// that override it must keep it constant for the node's lifetime.
///
/// 宿主绑定契约：宿主框架为每种可监控的节点类型实现的内容。
/// 此 trait 是对象安全的；宿主以 `Rc<dyn Anchor>` 持有节点，
/// 并投递两个通知：离开树、即将销毁。
pub trait Anchor: 'static {
    fn identity(&self) -> Identity {
        Identity::of(self)
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn kind(&self) -> AnchorKind {
        AnchorKind::Controller
    }

    /// Whether the node type is provided by the host framework itself rather
    /// than by application code.
    fn is_framework_type(&self) -> bool {
        false
    }

    /// Whether the node is reachable from a root of the live tree.
    ///
    /// See [`walk_to_root`] for the expected walk.
    fn is_in_hierarchy(&self) -> bool;

    /// Structural children that receive a status check whenever this node does.
    fn children(&self) -> Vec<Rc<dyn Anchor>>;

    /// Objects this anchor tethers to itself each time it is checked with a
    /// mode other than `OptOut`. A controller typically returns its root view.
    fn implicit_tethers(&self) -> Vec<WeakHandle> {
        Vec::new()
    }

    /// The reporter this anchor reports to.
    fn reporter(&self) -> Rc<DriftReporter> {
        DriftReporter::shared()
    }
}

/// Convenience methods for concrete anchors.
///
/// Every method forwards to a free function in this module, which also works
/// on `&dyn Anchor`.
///
/// 具体锚点的便捷方法。每个方法都转发到本模块中同样适用于 `&dyn Anchor` 的自由函数。
pub trait AnchorPoint: Anchor + Sized {
    #[inline]
    fn anchor_id(&self) -> Identity {
        self.identity()
    }

    /// Tether `item` to this anchor: `item` must be released by the time this
    /// anchor's retention window closes.
    fn tether<T: Any>(&self, item: &Rc<T>) {
        tether(self, item);
    }

    fn untether<T: Any>(&self, item: &Rc<T>) {
        untether(self, item);
    }

    /// Effective retention mode: explicit override, else the reporter's policy.
    fn retention_mode(&self) -> RetentionMode {
        retention_mode(self)
    }

    fn set_retention_mode(&self, mode: RetentionMode) {
        set_retention_mode(self, mode);
    }

    fn clear_retention_mode(&self) {
        clear_retention_mode(self);
    }

    /// Entry point for host lifecycle hooks.
    fn prepare_to_check_status(self: &Rc<Self>) {
        let anchor: Rc<dyn Anchor> = self.clone();
        lifecycle::prepare_to_check_status(&anchor);
    }
}

impl<A: Anchor> AnchorPoint for A {}

/// Tether `item` to `anchor`.
///
/// Registering is idempotent. Unless the anchor's effective mode is `OptOut`,
/// this also arms a destruction check, so an anchor destroyed without ever
/// receiving a "left tree" notification is still evaluated.
///
/// 将 `item` 系到 `anchor` 上。注册是幂等的。除非锚点的有效模式为 `OptOut`，
/// 否则还会安排一个销毁检查。
pub fn tether<T: Any>(anchor: &dyn Anchor, item: &Rc<T>) {
    lifecycle::tether_handle(anchor, WeakHandle::new(item));
}

pub fn untether<T: Any>(anchor: &dyn Anchor, item: &Rc<T>) {
    let reporter = anchor.reporter();
    reporter.untether(Identity::of_rc(item), anchor.identity());
}

pub fn retention_mode(anchor: &dyn Anchor) -> RetentionMode {
    anchor.reporter().retention_mode(anchor)
}

/// Set an explicit mode, taking precedence over the policy. Setting `OptOut`
/// disarms any pending destruction check right away.
pub fn set_retention_mode(anchor: &dyn Anchor, mode: RetentionMode) {
    let reporter = anchor.reporter();
    let anchor_id = anchor.identity();
    reporter.set_retention_mode(anchor_id, mode);
    if mode.is_opt_out() {
        reporter.disarm_destruction_check(anchor_id);
    }
}

pub fn clear_retention_mode(anchor: &dyn Anchor) {
    anchor.reporter().clear_retention_mode(anchor.identity());
}

/// Tree-membership walk.
///
/// Starting from `start`'s next link, follow `next` upward until either a node
/// satisfying `is_root` is found (in the tree) or the chain ends (not in the
/// tree). `start` itself is never tested against `is_root`.
///
/// For a controller, `next` should be its container's next link when it has a
/// container, else its own next link; for a leaf node, its structural
/// container. A node superseded inside a container that still exists (e.g. a
/// screen covered by another on a navigation stack) therefore still counts as
/// in the tree: membership is reachability from a root, not visibility.
///
/// 树成员关系遍历。从 `start` 的下一个链接开始沿 `next` 向上，
/// 直到找到满足 `is_root` 的节点（在树中）或链结束（不在树中）。
pub fn walk_to_root<N, F, R>(start: &N, mut next: F, mut is_root: R) -> bool
where
    F: FnMut(&N) -> Option<N>,
    R: FnMut(&N) -> bool,
{
    let mut current = next(start);
    while let Some(node) = current {
        if is_root(&node) {
            return true;
        }
        current = next(&node);
    }
    false
}
