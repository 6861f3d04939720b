use crate::error::Error;
use crate::report::DriftReport;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use tracing::{error, warn};

/// What happens to each [`DriftReport`]. Every configured sink runs, in order,
/// for every report.
///
/// `AssertImmediate` and `Breakpoint` stop the program and belong in
/// development builds only; nothing here prevents enabling them elsewhere.
///
/// 对每个 [`DriftReport`] 执行的动作。每个已配置的 sink 都会按顺序对每个报告运行。
/// `AssertImmediate` 和 `Breakpoint` 会中断程序，只应在开发构建中使用。
#[derive(Clone)]
pub enum ReportSink {
    /// Log the report's message at `WARN`.
    Log,
    /// Panic with the report.
    AssertImmediate,
    /// Trap into an attached debugger.
    Breakpoint,
    /// Emit a short structured issue at `WARN` for tooling to surface.
    RuntimeWarning,
    /// Run a custom handler, e.g. an in-app toast.
    Custom(Rc<dyn Fn(&DriftReport)>),
}

impl ReportSink {
    pub fn custom(handler: impl Fn(&DriftReport) + 'static) -> Self {
        ReportSink::Custom(Rc::new(handler))
    }

    /// The sinks a reporter uses unless configured otherwise.
    pub fn defaults() -> Vec<ReportSink> {
        vec![ReportSink::Log, ReportSink::RuntimeWarning]
    }

    pub(crate) fn handle(&self, report: &DriftReport) {
        match self {
            ReportSink::Log => {
                warn!(target: "drift_check", "{}", report.message());
            }
            ReportSink::RuntimeWarning => {
                warn!(
                    target: "drift_check::issue",
                    anchor = %report.anchor_item.id,
                    anchor_type = report.anchor_item.type_name,
                    anchor_retained = report.anchor_item.retained,
                    drifted = report.tethered_items.len(),
                    "{}",
                    report.title()
                );
            }
            ReportSink::AssertImmediate => {
                panic!("{}\n{}", report.title(), report.message());
            }
            ReportSink::Breakpoint => {
                error!(target: "drift_check::issue", "{}\n{}", report.title(), report.message());
                trap(report);
            }
            ReportSink::Custom(handler) => handler(report),
        }
    }
}

#[cfg(unix)]
fn trap(_report: &DriftReport) {
    // SAFETY: raising a signal on the current process has no memory-safety
    // preconditions. Without a debugger SIGTRAP's default action ends the process.
    unsafe {
        libc::raise(libc::SIGTRAP);
    }
}

#[cfg(not(unix))]
fn trap(report: &DriftReport) {
    panic!("{}", report.title());
}

impl fmt::Debug for ReportSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportSink::Log => f.write_str("Log"),
            ReportSink::AssertImmediate => f.write_str("AssertImmediate"),
            ReportSink::Breakpoint => f.write_str("Breakpoint"),
            ReportSink::RuntimeWarning => f.write_str("RuntimeWarning"),
            ReportSink::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl FromStr for ReportSink {
    type Err = Error;

    /// Parse a built-in sink by name. `Custom` has no name.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(ReportSink::Log),
            "assert" | "assert-immediate" => Ok(ReportSink::AssertImmediate),
            "breakpoint" => Ok(ReportSink::Breakpoint),
            "runtime-warning" | "warning" => Ok(ReportSink::RuntimeWarning),
            _ => Err(Error::UnknownSink(name.trim().to_owned())),
        }
    }
}

/// Parse a comma-separated sink list such as `"log, runtime-warning"`.
/// Empty segments are skipped, so `""` yields no sinks.
pub(crate) fn parse_sink_list(list: &str) -> Result<Vec<ReportSink>, Error> {
    list.split(',')
        .filter(|segment| !segment.trim().is_empty())
        .map(str::parse)
        .collect()
}
