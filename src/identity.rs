use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

/// A stable, opaque identity for a live object.
///
/// The identity is the address of the object's value. Objects tracked by this
/// crate live inside `Rc` allocations, which never move, so the identity stays
/// constant for the whole lifetime of the object. It can be derived both from
/// the outside (`Identity::of_rc(&rc)`) and from the inside (`Identity::of(self)`),
/// and the two agree.
///
/// 活对象的稳定、不透明标识。
/// 标识即对象值的地址。被追踪的对象都位于不会移动的 `Rc` 分配中，
/// 因此在对象的整个生命周期内标识保持不变。
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(usize);

impl Identity {
    /// Identity of a value, taken from its address.
    /// 从值的地址获取标识。
    #[inline]
    pub fn of<T: ?Sized>(value: &T) -> Self {
        Identity(std::ptr::from_ref(value).cast::<()>() as usize)
    }

    /// Identity of the value held by an `Rc`.
    /// `Rc` 所持有值的标识。
    #[inline]
    pub fn of_rc<T: ?Sized>(value: &Rc<T>) -> Self {
        Identity(Rc::as_ptr(value).cast::<()>() as usize)
    }

    /// The raw address.
    #[inline]
    pub fn addr(self) -> usize {
        self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({:#x})", self.0)
    }
}

/// A non-owning reference to a tethered object, plus its precomputed identity.
///
/// Holding a `WeakHandle` never extends the object's lifetime. It does keep the
/// allocation reserved, so the identity cannot be handed to another object
/// while the handle exists.
///
/// Equality and hashing use the identity only.
///
/// 对被系住对象的非拥有引用，附带预先计算的标识。
/// 持有 `WeakHandle` 不会延长对象的生命周期。相等性与哈希只使用标识。
#[derive(Clone)]
pub struct WeakHandle {
    id: Identity,
    type_name: &'static str,
    item: Weak<dyn Any>,
}

impl WeakHandle {
    /// Create a handle to the object held by `item`.
    /// 为 `item` 所持有的对象创建句柄。
    pub fn new<T: Any>(item: &Rc<T>) -> Self {
        let weak: Weak<T> = Rc::downgrade(item);
        WeakHandle {
            id: Identity::of_rc(item),
            type_name: std::any::type_name::<T>(),
            item: weak,
        }
    }

    #[inline]
    pub fn id(&self) -> Identity {
        self.id
    }

    /// Fully qualified type name of the object, captured at creation.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Resolve the handle. Returns `None` once the object has been dropped.
    /// 解析句柄。对象被 drop 后返回 `None`。
    #[inline]
    pub fn upgrade(&self) -> Option<Rc<dyn Any>> {
        self.item.upgrade()
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.item.strong_count() > 0
    }

    #[inline]
    pub(crate) fn downgrade(&self) -> Weak<dyn Any> {
        self.item.clone()
    }
}

impl PartialEq for WeakHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for WeakHandle {}

impl Hash for WeakHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for WeakHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakHandle")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("alive", &self.is_alive())
            .finish()
    }
}
