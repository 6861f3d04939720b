//! End-to-end tests through the public API only.
//!
//! A minimal panel tree stands in for the host UI toolkit: panels implement
//! `Anchor`, report their own destruction, and are detached by the test.
//!
//! Run with: `cargo test --test host_tree`

use drift_check::{
    Anchor, AnchorPoint, DriftReport, DriftReporter, Error, FrameClock, Identity, ReportSink,
    RetentionMode, node_left_tree, node_will_drop, retention_mode, set_retention_mode, tether,
    untether,
};
use futures::executor::LocalPool;
use futures::task::LocalSpawnExt;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

struct Panel {
    attached: Cell<bool>,
    children: RefCell<Vec<Rc<dyn Anchor>>>,
    reporter: Rc<DriftReporter>,
}

impl Panel {
    fn new(reporter: &Rc<DriftReporter>) -> Rc<Panel> {
        Rc::new(Panel {
            attached: Cell::new(true),
            children: RefCell::new(Vec::new()),
            reporter: reporter.clone(),
        })
    }

    fn detach(self: &Rc<Self>) {
        self.attached.set(false);
        let anchor: Rc<dyn Anchor> = self.clone();
        node_left_tree(&anchor);
    }
}

impl Anchor for Panel {
    fn type_name(&self) -> &'static str {
        "Panel"
    }

    fn is_in_hierarchy(&self) -> bool {
        self.attached.get()
    }

    fn children(&self) -> Vec<Rc<dyn Anchor>> {
        self.children.borrow().clone()
    }

    fn reporter(&self) -> Rc<DriftReporter> {
        self.reporter.clone()
    }
}

impl Drop for Panel {
    fn drop(&mut self) {
        node_will_drop(&*self);
    }
}

struct Harness {
    clock: Rc<FrameClock>,
    reporter: Rc<DriftReporter>,
    reports: Rc<RefCell<Vec<DriftReport>>>,
}

fn harness() -> Harness {
    let clock = Rc::new(FrameClock::new());
    let reports = Rc::new(RefCell::new(Vec::new()));
    let sink = reports.clone();
    let reporter = DriftReporter::builder()
        .clock(clock.clone())
        .sinks([ReportSink::Log])
        .sink(ReportSink::custom(move |report| {
            sink.borrow_mut().push(report.clone())
        }))
        .build();
    reporter.start();
    Harness {
        clock,
        reporter,
        reports,
    }
}

#[test]
fn detached_panel_reports_lingering_model() {
    let h = harness();
    let panel = Panel::new(&h.reporter);
    let model = Rc::new(vec![1u8, 2, 3]);
    panel.tether(&model);

    panel.detach();
    h.clock.advance(2);

    let reports = h.reports.borrow();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].anchor_item.type_name, "Panel");
    assert_eq!(reports[0].tethered_items[0].id, Identity::of_rc(&model));
    assert!(reports[0].message().contains("still exists past its retention plan"));
    assert_eq!(reports[0].title(), "⚓️ Anchor remained past retention plan");
}

#[test]
fn async_task_observes_report_after_wait() {
    let h = harness();
    let panel = Panel::new(&h.reporter);
    let model = Rc::new(String::from("cached page"));
    panel.tether(&model);

    let mut pool = LocalPool::new();
    let observed = Rc::new(Cell::new(None));
    let task_panel = panel.clone();
    let task_clock = h.clock.clone();
    let task_reports = h.reports.clone();
    let task_observed = observed.clone();
    pool.spawner()
        .spawn_local(async move {
            task_panel.detach();
            let waited = task_clock.wait_async(2).await;
            task_observed.set(Some((waited, task_reports.borrow().len())));
        })
        .expect("spawn");

    pool.run_until_stalled();
    assert_eq!(h.clock.pending(), 2);

    for _ in 0..2 {
        h.clock.tick();
        pool.run_until_stalled();
    }

    // The removal check was armed first, so it ran before the task resumed.
    assert_eq!(observed.take(), Some((Ok(()), 1)));
}

#[test]
fn cascade_reaches_released_child() {
    let h = harness();
    let parent = Panel::new(&h.reporter);
    let child = Panel::new(&h.reporter);
    parent.children.borrow_mut().push(child.clone());
    let model = Rc::new(42u64);
    child.tether(&model);
    let child_id = child.anchor_id();
    drop(child);

    parent.detach();
    assert!(h.reporter.is_evaluating(child_id));
    drop(parent);
    h.clock.advance(2);

    let reports = h.reports.borrow();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].anchor_item.id, child_id);
    assert!(!reports[0].anchor_item.retained);
    assert_eq!(reports[0].title(), "🛟 Object drifted away");
    assert!(h.reporter.registry().is_empty());
}

#[test]
fn dyn_anchor_free_functions() {
    let h = harness();
    let panel: Rc<dyn Anchor> = Panel::new(&h.reporter);
    let model = Rc::new(0i32);

    tether(&*panel, &model);
    assert!(h.reporter.registry().has_tethers(panel.identity()));
    assert_eq!(retention_mode(&*panel), RetentionMode::on_removal());

    set_retention_mode(&*panel, RetentionMode::OptOut);
    assert_eq!(retention_mode(&*panel), RetentionMode::OptOut);

    untether(&*panel, &model);
    assert!(h.reporter.registry().is_empty());
    drop(panel);
    h.clock.advance(3);
    assert!(h.reports.borrow().is_empty());
}

#[test]
fn shared_reporter_runs_on_main_clock() {
    struct Orphan;

    impl Anchor for Orphan {
        fn is_in_hierarchy(&self) -> bool {
            false
        }

        fn children(&self) -> Vec<Rc<dyn Anchor>> {
            Vec::new()
        }
    }

    let shared = DriftReporter::shared();
    assert!(Rc::ptr_eq(shared.clock(), &FrameClock::main()));
    assert_eq!(shared.report_sinks().len(), 2);

    let orphan = Rc::new(Orphan);
    let model = Rc::new(1u8);
    orphan.tether(&model);
    assert!(shared.registry().has_tethers(orphan.anchor_id()));

    orphan.prepare_to_check_status();
    FrameClock::main().advance(shared.default_wait_ticks());

    assert!(shared.registry().is_empty());
    assert!(!shared.is_evaluating(orphan.anchor_id()));
}

#[test]
fn unknown_sink_names_are_rejected() {
    let result = DriftReporter::builder().sinks_from_str("log,toast");
    assert!(matches!(result, Err(Error::UnknownSink(name)) if name == "toast"));

    let silent = DriftReporter::builder()
        .clock(Rc::new(FrameClock::new()))
        .sinks_from_str("")
        .expect("empty list")
        .build();
    assert!(silent.report_sinks().is_empty());
}
