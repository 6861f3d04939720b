use crate::identity::{Identity, WeakHandle};
use std::collections::{HashMap, HashSet};

/// Bidirectional index of tethers.
///
/// - forward: anchor id -> set of weak handles tethered to it
/// - reverse: item id -> set of anchor ids holding it
///
/// Both maps are updated together by every mutating operation. A key whose set
/// becomes empty is removed, so the index never accumulates empty entries.
/// The registry never holds a strong reference to an anchor or an item.
///
/// 系绳的双向索引。
/// - 正向：锚点 id -> 系在它上面的弱句柄集合
/// - 反向：对象 id -> 持有它的锚点 id 集合
/// 每个修改操作都会同时更新两个映射。集合变空时删除对应的键，
/// 因此索引中不会残留空条目。注册表从不持有强引用。
#[derive(Debug, Default)]
pub struct TetherRegistry {
    forward: HashMap<Identity, HashSet<WeakHandle>>,
    reverse: HashMap<Identity, HashSet<Identity>>,
}

impl TetherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tether `item` to `anchor`. Registering the same pair again has no effect.
    ///
    /// 将 `item` 系到 `anchor` 上。重复注册同一对不会产生额外效果。
    pub fn register(&mut self, item: WeakHandle, anchor: Identity) {
        let item_id = item.id();
        self.forward.entry(anchor).or_default().insert(item);
        self.reverse.entry(item_id).or_default().insert(anchor);
    }

    /// Remove the pair from both maps. Unknown pairs are ignored.
    ///
    /// 从两个映射中移除该对。未知的对会被忽略。
    pub fn unregister(&mut self, item: Identity, anchor: Identity) {
        if let Some(set) = self.forward.get_mut(&anchor) {
            // WeakHandle equality is by id only, so a probe needs the stored handle.
            set.retain(|handle| handle.id() != item);
            if set.is_empty() {
                self.forward.remove(&anchor);
            }
        }
        self.remove_reverse(item, anchor);
    }

    #[inline]
    pub fn has_tethers(&self, anchor: Identity) -> bool {
        self.forward.contains_key(&anchor)
    }

    /// All handles currently tethered to `anchor`, in no particular order.
    pub fn tethers(&self, anchor: Identity) -> Vec<WeakHandle> {
        self.forward
            .get(&anchor)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether any anchor still holds `item`.
    #[inline]
    pub fn is_anchored(&self, item: Identity) -> bool {
        self.reverse.contains_key(&item)
    }

    /// Ids of every anchor holding `item`, in no particular order.
    pub fn anchors_of(&self, item: Identity) -> Vec<Identity> {
        self.reverse
            .get(&item)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Remove and return one handle tethered to `anchor`.
    ///
    /// The order in which handles come out is unspecified. Callers drain the
    /// whole set with `while let Some(handle) = registry.pop_from(id)`.
    ///
    /// 移除并返回一个系在 `anchor` 上的句柄。返回顺序未指定。
    pub fn pop_from(&mut self, anchor: Identity) -> Option<WeakHandle> {
        let set = self.forward.get_mut(&anchor)?;
        let handle = set.iter().next().cloned()?;
        set.remove(&handle);
        if set.is_empty() {
            self.forward.remove(&anchor);
        }
        self.remove_reverse(handle.id(), anchor);
        Some(handle)
    }

    /// Drop every tether of `anchor` without evaluating it.
    /// Returns how many tethers were released.
    ///
    /// 不经评估直接释放 `anchor` 的所有系绳，返回释放的数量。
    pub fn release_anchor(&mut self, anchor: Identity) -> usize {
        let Some(set) = self.forward.remove(&anchor) else {
            return 0;
        };
        for handle in &set {
            self.remove_reverse(handle.id(), anchor);
        }
        set.len()
    }

    /// Number of anchors with at least one tether.
    #[inline]
    pub fn anchor_count(&self) -> usize {
        self.forward.len()
    }

    /// Number of items held by at least one anchor.
    #[inline]
    pub fn item_count(&self) -> usize {
        self.reverse.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty() && self.reverse.is_empty()
    }

    fn remove_reverse(&mut self, item: Identity, anchor: Identity) {
        if let Some(set) = self.reverse.get_mut(&item) {
            set.remove(&anchor);
            if set.is_empty() {
                self.reverse.remove(&item);
            }
        }
    }
}
