//! In-process activity timer with pluggable output.
//!
//! Register a named activity, mark timestamps against it, and get
//! human-readable start/end lines delivered to every registered handler:
//!
//! - Activities are tracked by a monotonically increasing `u64` ID that is
//!   never reused
//! - `start` creates and marks an activity and writes its start line
//! - `end` marks it a final time, removes it and writes its end line,
//!   `"{message} ({elapsed}ms)"` by default
//! - Formatters and handlers are traits; closures work for both
//! - Output can be switched off globally, which also silences the
//!   "no handlers" error
//!
//! ## Usage
//!
//! Each [`Timer`] is independent. The free functions operate on a lazily
//! created process-wide instance, see [`global()`].
//!
//! ```
//! use activity_timer::{Timer, WriterHandler};
//!
//! let timer = Timer::new();
//! timer.add_output_handler(WriterHandler::stderr());
//!
//! let id = timer.start("build").unwrap();
//! // ... work ...
//! let activity = timer.end(id).unwrap();
//! assert_eq!(activity.message(), "build");
//! ```

use std::sync::{Arc, OnceLock};

pub mod activity;
pub mod config;
mod dispatch;
pub mod error;
pub mod format;
pub mod handler;
mod store;
pub mod timer;
pub mod timestamp;

pub use activity::{Activity, ActivityMessage};
pub use config::{EndFormat, OutputKind, TimerConfig};
pub use error::{ActivityError, Result};
pub use format::{DefaultEndFormatter, DefaultStartFormatter, Formatter, HumanEndFormatter};
pub use handler::{ChannelHandler, Handler, TracingHandler, WriterHandler};
pub use timer::{ActivityScope, Timer};
pub use timestamp::{Clock, ManualClock, SystemClock, Timestamp};

static GLOBAL_TIMER: OnceLock<Timer> = OnceLock::new();

/// The process-wide timer behind the free functions of this crate.
///
/// Created on first use with the system clock, output enabled and no
/// handlers. It lives until the process exits.
pub fn global() -> &'static Timer {
    GLOBAL_TIMER.get_or_init(Timer::new)
}

/// Register an activity on the global timer, see [`Timer::create`]
pub fn create<M>(message: M) -> Result<u64>
where
    M: TryInto<ActivityMessage>,
    ActivityError: From<M::Error>,
{
    global().create(message)
}

/// Snapshot of a global activity, see [`Timer::get`]
pub fn get(id: u64) -> Result<Activity> {
    global().get(id)
}

/// Mark a global activity, see [`Timer::mark`]
pub fn mark(id: u64) -> Result<Timestamp> {
    global().mark(id)
}

/// Remove a global activity without output, see [`Timer::destroy`]
pub fn destroy(id: u64) -> Result<Activity> {
    global().destroy(id)
}

/// Start an activity on the global timer, see [`Timer::start`]
pub fn start<M>(message: M) -> Result<u64>
where
    M: TryInto<ActivityMessage>,
    ActivityError: From<M::Error>,
{
    global().start(message)
}

/// End a global activity, see [`Timer::end`]
pub fn end(id: u64) -> Result<Activity> {
    global().end(id)
}

/// Turn global output on, see [`Timer::enable`]
pub fn enable() {
    global().enable();
}

/// Turn global output off, see [`Timer::disable`]
pub fn disable() {
    global().disable();
}

/// See [`Timer::set_start_formatter`]
pub fn set_start_formatter(formatter: impl Formatter + 'static) {
    global().set_start_formatter(formatter);
}

/// See [`Timer::set_end_formatter`]
pub fn set_end_formatter(formatter: impl Formatter + 'static) {
    global().set_end_formatter(formatter);
}

/// Handlers registered on the global timer, see [`Timer::output_handlers`]
pub fn output_handlers() -> Vec<Arc<dyn Handler>> {
    global().output_handlers()
}

/// See [`Timer::set_output_handlers`]
pub fn set_output_handlers(handlers: Vec<Arc<dyn Handler>>) {
    global().set_output_handlers(handlers);
}

/// See [`Timer::add_output_handler`]
pub fn add_output_handler(handler: impl Handler + 'static) {
    global().add_output_handler(handler);
}
