use crate::identity::Identity;
use std::any::Any;
use std::fmt;
use std::rc::{Rc, Weak};

/// Metadata about one object in a [`DriftReport`].
///
/// 关于 [`DriftReport`] 中某个对象的元数据。
#[derive(Clone)]
pub struct ReportItem {
    /// Identity of the object.
    pub id: Identity,
    /// Human-readable type name.
    pub type_name: &'static str,
    /// Whether the object was alive when the report was produced.
    pub retained: bool,
    /// Weak reference to the object, if one was available.
    ///
    /// Being weak, it may resolve to nothing even when `retained` is true.
    /// Anchors are reported without one.
    pub item: Option<Weak<dyn Any>>,
}

impl ReportItem {
    /// Resolve the weak reference, if any.
    pub fn upgrade(&self) -> Option<Rc<dyn Any>> {
        self.item.as_ref().and_then(Weak::upgrade)
    }

    /// `Type<0xaddress>`.
    pub fn message(&self) -> String {
        format!("{}<{}>", short_type_name(self.type_name), self.id)
    }
}

impl fmt::Debug for ReportItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportItem")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("retained", &self.retained)
            .finish_non_exhaustive()
    }
}

/// The outcome of evaluating one anchor: the anchor itself, and every tethered
/// object that outlived the anchor's retention window with no other anchor
/// justifying it.
///
/// The order of `tethered_items` is unspecified.
///
/// 评估一个锚点的结果：锚点本身，以及所有在锚点保留窗口结束后仍然存活、
/// 且没有其他锚点为其存活提供理由的系住对象。`tethered_items` 的顺序未指定。
#[derive(Debug, Clone)]
pub struct DriftReport {
    pub anchor_item: ReportItem,
    pub tethered_items: Vec<ReportItem>,
}

impl DriftReport {
    /// Short title used by issue-style sinks.
    pub fn title(&self) -> &'static str {
        if self.anchor_item.retained {
            "⚓️ Anchor remained past retention plan"
        } else {
            "🛟 Object drifted away"
        }
    }

    /// Multi-line human-readable explanation.
    pub fn message(&self) -> String {
        let mut message = String::new();
        if self.anchor_item.retained {
            message.push_str(&format!(
                "⚓️ {} still exists past its retention plan.",
                self.anchor_item.message()
            ));
            if !self.tethered_items.is_empty() {
                message.push_str("\nSome tethered objects still remain:");
                for item in &self.tethered_items {
                    message.push_str(&format!("\n🛟 {}", item.message()));
                }
            }
        } else {
            let lines: Vec<String> = self
                .tethered_items
                .iter()
                .map(|item| {
                    format!(
                        "🛟 DriftCheck: Detected lingering object {} that exists past anchor's ({}) retention plan.",
                        item.message(),
                        self.anchor_item.message()
                    )
                })
                .collect();
            message.push_str(&lines.join("\n"));
        }
        message
    }
}

impl fmt::Display for DriftReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// `alloc::rc::Rc<my_app::Model>` -> `Rc<Model>`.
fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment_start = 0;
    for (index, ch) in full.char_indices() {
        match ch {
            ':' => segment_start = index + 1,
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | '&' | ';' => {
                out.push_str(&full[segment_start..index]);
                out.push(ch);
                segment_start = index + 1;
            }
            _ => {}
        }
    }
    out.push_str(&full[segment_start..]);
    out
}
