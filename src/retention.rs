/// Number of ticks an anchor waits after leaving the tree before it is checked.
/// 锚点离开树之后、被检查之前等待的默认 tick 数。
pub const DEFAULT_WAIT_TICKS: u32 = 2;

/// When an anchor's tethered objects are checked for drift.
///
/// 锚点上系住的对象何时被检查是否漂移。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetentionMode {
    /// Check once the anchor has left the tree.
    ///
    /// `wait_ticks` frames after the anchor leaves, it is tested for tree
    /// membership once more. If it is still out (or gone), the anchor and its
    /// tethers are expected to have been released. Useful when work legitimately
    /// extends a few frames past dismissal (e.g. an exit animation).
    ///
    /// 锚点离开树之后检查。离开 `wait_ticks` 帧后再测试一次树成员关系。
    OnRemovalFromHierarchy { wait_ticks: u32 },

    /// Check when the anchor is destroyed.
    ///
    /// For anchors that are not released when they leave the tree (reusable
    /// cells, cached views). Tethered objects are checked one tick after the
    /// anchor's destruction notification.
    ///
    /// 在锚点被销毁时检查。
    OnDealloc,

    /// Never check this anchor. Its children are still notified and decide for
    /// themselves.
    ///
    /// 从不检查此锚点。其子节点仍会收到通知并自行决定。
    OptOut,
}

impl RetentionMode {
    /// `OnRemovalFromHierarchy` with the default wait.
    #[inline]
    pub const fn on_removal() -> Self {
        RetentionMode::OnRemovalFromHierarchy {
            wait_ticks: DEFAULT_WAIT_TICKS,
        }
    }

    #[inline]
    pub const fn on_removal_after(wait_ticks: u32) -> Self {
        RetentionMode::OnRemovalFromHierarchy { wait_ticks }
    }

    #[inline]
    pub const fn is_opt_out(self) -> bool {
        matches!(self, RetentionMode::OptOut)
    }
}

impl Default for RetentionMode {
    fn default() -> Self {
        Self::on_removal()
    }
}
