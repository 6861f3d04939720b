/// 测试用的模拟宿主树
/// A small host tree (windows, views, controllers) that implements `Anchor`
/// and delivers both lifecycle notifications.
use crate::{
    Anchor, AnchorKind, DriftReport, DriftReporter, FrameClock, HostAdapter, ReportSink,
    WeakHandle, node_left_tree, node_will_drop, walk_to_root,
};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    Window,
    View,
    Controller,
}

/// 宿主适配器：安装后节点才会投递"离开树"通知
struct MockAdapter {
    hooks: Rc<Cell<bool>>,
    installs: Rc<Cell<usize>>,
}

impl HostAdapter for MockAdapter {
    fn node_kind(&self) -> &str {
        "mock-node"
    }

    fn install(&self) {
        self.hooks.set(true);
        self.installs.set(self.installs.get() + 1);
    }
}

pub(crate) struct Host {
    pub(crate) clock: Rc<FrameClock>,
    pub(crate) reporter: Rc<DriftReporter>,
    reports: Rc<RefCell<Vec<DriftReport>>>,
    hooks: Rc<Cell<bool>>,
    pub(crate) installs: Rc<Cell<usize>>,
}

impl Host {
    /// 已启动的宿主
    pub(crate) fn new() -> Rc<Host> {
        let host = Self::unstarted();
        host.reporter.start();
        host
    }

    /// 未调用 `start()` 的宿主
    pub(crate) fn unstarted() -> Rc<Host> {
        let clock = Rc::new(FrameClock::new());
        let reports = Rc::new(RefCell::new(Vec::new()));
        let sink = reports.clone();
        let reporter = DriftReporter::builder()
            .clock(clock.clone())
            .sinks([ReportSink::custom(move |report| {
                sink.borrow_mut().push(report.clone())
            })])
            .build();
        let hooks = Rc::new(Cell::new(false));
        let installs = Rc::new(Cell::new(0));
        reporter.register_adapter(Box::new(MockAdapter {
            hooks: hooks.clone(),
            installs: installs.clone(),
        }));
        Rc::new(Host {
            clock,
            reporter,
            reports,
            hooks,
            installs,
        })
    }

    pub(crate) fn reports(&self) -> Vec<DriftReport> {
        self.reports.borrow().clone()
    }

    pub(crate) fn report_count(&self) -> usize {
        self.reports.borrow().len()
    }

    pub(crate) fn tick(&self, ticks: u32) {
        self.clock.advance(ticks);
    }

    pub(crate) fn window(self: &Rc<Self>) -> Rc<Node> {
        Node::new(self, "Window", Role::Window, true, None)
    }

    pub(crate) fn view(self: &Rc<Self>, name: &'static str) -> Rc<Node> {
        Node::new(self, name, Role::View, false, None)
    }

    /// 带根视图的应用控制器
    pub(crate) fn controller(self: &Rc<Self>, name: &'static str) -> Rc<Node> {
        let root_view = self.view("RootView");
        Node::new(self, name, Role::Controller, false, Some(root_view))
    }

    /// 框架提供的控制器
    pub(crate) fn framework_controller(self: &Rc<Self>, name: &'static str) -> Rc<Node> {
        let root_view = self.view("RootView");
        Node::new(self, name, Role::Controller, true, Some(root_view))
    }

    /// 没有根视图的应用控制器（不会隐式系住任何对象）
    pub(crate) fn screen(self: &Rc<Self>, name: &'static str) -> Rc<Node> {
        Node::new(self, name, Role::Controller, false, None)
    }
}

pub(crate) struct Node {
    name: &'static str,
    role: Role,
    framework: bool,
    this: Weak<Node>,
    parent: RefCell<Weak<Node>>,
    children: RefCell<Vec<Rc<Node>>>,
    root_view: Option<Rc<Node>>,
    host: Rc<Host>,
}

impl Node {
    fn new(
        host: &Rc<Host>,
        name: &'static str,
        role: Role,
        framework: bool,
        root_view: Option<Rc<Node>>,
    ) -> Rc<Node> {
        let node = Rc::new_cyclic(|this| Node {
            name,
            role,
            framework,
            this: this.clone(),
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            root_view,
            host: host.clone(),
        });
        if let Some(view) = &node.root_view {
            *view.parent.borrow_mut() = Rc::downgrade(&node);
        }
        node
    }

    pub(crate) fn root_view(&self) -> Option<Rc<Node>> {
        self.root_view.clone()
    }

    /// 添加子节点（不触发通知）
    pub(crate) fn add(self: &Rc<Self>, child: &Rc<Node>) {
        *child.parent.borrow_mut() = Rc::downgrade(self);
        self.children.borrow_mut().push(child.clone());
    }

    /// 从父节点移除；钩子已安装时投递"离开树"通知
    pub(crate) fn remove_from_parent(self: &Rc<Self>) {
        let parent = self.parent.borrow().upgrade();
        if let Some(parent) = parent {
            parent
                .children
                .borrow_mut()
                .retain(|child| !Rc::ptr_eq(child, self));
        }
        *self.parent.borrow_mut() = Weak::new();
        if self.host.hooks.get() {
            let anchor: Rc<dyn Anchor> = self.clone();
            node_left_tree(&anchor);
        }
    }
}

impl Anchor for Node {
    fn type_name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> AnchorKind {
        match self.role {
            Role::Controller => AnchorKind::Controller,
            Role::View | Role::Window => AnchorKind::View,
        }
    }

    fn is_framework_type(&self) -> bool {
        self.framework
    }

    fn is_in_hierarchy(&self) -> bool {
        let Some(this) = self.this.upgrade() else {
            return false;
        };
        walk_to_root(
            &this,
            |node| node.parent.borrow().upgrade(),
            |node| node.role == Role::Window,
        )
    }

    fn children(&self) -> Vec<Rc<dyn Anchor>> {
        let mut children: Vec<Rc<dyn Anchor>> = self
            .children
            .borrow()
            .iter()
            .map(|child| child.clone() as Rc<dyn Anchor>)
            .collect();
        if let Some(view) = &self.root_view {
            children.push(view.clone());
        }
        children
    }

    fn implicit_tethers(&self) -> Vec<WeakHandle> {
        self.root_view.iter().map(WeakHandle::new).collect()
    }

    fn reporter(&self) -> Rc<DriftReporter> {
        self.host.reporter.clone()
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        node_will_drop(&*self);
    }
}

/// 被系住的普通对象
#[derive(Debug)]
pub(crate) struct Model(pub(crate) &'static str);
