//! The activity lifecycle API tying the store and the output dispatcher together.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::activity::{Activity, ActivityMessage};
use crate::dispatch::OutputDispatcher;
use crate::error::{ActivityError, Result};
use crate::format::Formatter;
use crate::handler::Handler;
use crate::store::ActivityStore;
use crate::timestamp::{Clock, SystemClock, Timestamp};

/// An independent activity timer: its own IDs, activities, formatters,
/// handlers and enabled flag.
///
/// All methods take `&self`; a `Timer` can be shared between threads.
pub struct Timer {
    store: ActivityStore,
    output: OutputDispatcher,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Create a timer reading the system clock, with output enabled and no handlers
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            store: ActivityStore::new(clock),
            output: OutputDispatcher::default(),
        }
    }

    /// Register a new activity without marking it. Returns its ID.
    pub fn create<M>(&self, message: M) -> Result<u64>
    where
        M: TryInto<ActivityMessage>,
        ActivityError: From<M::Error>,
    {
        let message: ActivityMessage = message.try_into()?;
        self.store.create(message)
    }

    /// Snapshot of the activity's current record
    pub fn get(&self, id: u64) -> Result<Activity> {
        self.store.get(id)
    }

    /// Append the current time to the activity's timestamps and return it
    pub fn mark(&self, id: u64) -> Result<Timestamp> {
        self.store.mark(id)
    }

    /// Remove the activity and hand its record back, without any output
    pub fn destroy(&self, id: u64) -> Result<Activity> {
        self.store.destroy(id)
    }

    /// Create and mark an activity, then write it with the start formatter.
    ///
    /// If writing fails the activity is removed again before the error is
    /// returned; the caller never saw its ID and could not end it. A failed
    /// start therefore leaves nothing behind in the store, rather than an
    /// unreachable record.
    pub fn start<M>(&self, message: M) -> Result<u64>
    where
        M: TryInto<ActivityMessage>,
        ActivityError: From<M::Error>,
    {
        let id = self.create(message)?;
        let activity = self.store.mark_snapshot(id)?;

        if let Err(err) = self.output.write_start(&activity) {
            self.store.destroy(id).ok();
            return Err(err);
        }

        debug!(activity_id = id, name = activity.message(), "activity started");
        Ok(id)
    }

    /// Mark the activity a final time, remove it and write it with the end
    /// formatter. Returns the removed record.
    ///
    /// The activity is gone from the timer even when writing fails.
    pub fn end(&self, id: u64) -> Result<Activity> {
        self.store.mark(id)?;
        let activity = self.store.destroy(id)?;
        self.output.write_end(&activity)?;

        debug!(
            activity_id = id,
            elapsed_ms = activity.elapsed_ms(),
            "activity ended"
        );
        Ok(activity)
    }

    /// Start an activity that ends when the returned guard is dropped.
    ///
    /// ```
    /// use activity_timer::Timer;
    ///
    /// let timer = Timer::new();
    /// timer.add_output_handler(|line: &str| eprintln!("{line}"));
    /// {
    ///     let _scope = timer.scope("compile").unwrap();
    ///     // work
    /// }
    /// assert!(timer.is_empty());
    /// ```
    pub fn scope<M>(&self, message: M) -> Result<ActivityScope<'_>>
    where
        M: TryInto<ActivityMessage>,
        ActivityError: From<M::Error>,
    {
        let id = self.start(message)?;
        Ok(ActivityScope {
            timer: self,
            id,
            ended: false,
        })
    }

    /// Run `f` inside an activity and return its result with the ended record
    pub fn measure<M, T>(&self, message: M, f: impl FnOnce() -> T) -> Result<(T, Activity)>
    where
        M: TryInto<ActivityMessage>,
        ActivityError: From<M::Error>,
    {
        let id = self.start(message)?;
        let value = f();
        let activity = self.end(id)?;
        Ok((value, activity))
    }

    pub fn enable(&self) {
        self.output.enable();
    }

    pub fn disable(&self) {
        self.output.disable();
    }

    pub fn is_enabled(&self) -> bool {
        self.output.is_enabled()
    }

    /// Replace the formatter used by subsequent `start` calls
    pub fn set_start_formatter(&self, formatter: impl Formatter + 'static) {
        self.output.set_start_formatter(Arc::new(formatter));
    }

    /// Replace the formatter used by subsequent `end` calls
    pub fn set_end_formatter(&self, formatter: impl Formatter + 'static) {
        self.output.set_end_formatter(Arc::new(formatter));
    }

    pub fn output_handlers(&self) -> Vec<Arc<dyn Handler>> {
        self.output.handlers().get()
    }

    pub fn set_output_handlers(&self, handlers: Vec<Arc<dyn Handler>>) {
        self.output.handlers().set(handlers);
    }

    pub fn add_output_handler(&self, handler: impl Handler + 'static) {
        self.output.handlers().add(Arc::new(handler));
    }

    /// Number of activities started or created and not yet ended
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// IDs of activities still held, in ascending order
    pub fn active_ids(&self) -> Vec<u64> {
        self.store.active_ids()
    }
}

/// Guard returned by [`Timer::scope`]; ends its activity on drop.
#[must_use = "the activity ends as soon as the scope is dropped"]
pub struct ActivityScope<'a> {
    timer: &'a Timer,
    id: u64,
    ended: bool,
}

impl ActivityScope<'_> {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// End the activity now and return its record
    pub fn finish(mut self) -> Result<Activity> {
        self.ended = true;
        self.timer.end(self.id)
    }
}

impl Drop for ActivityScope<'_> {
    fn drop(&mut self) {
        if self.ended {
            return;
        }
        if let Err(err) = self.timer.end(self.id) {
            warn!(activity_id = self.id, error = %err, "failed to end scoped activity");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp::ManualClock;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<String>>>;

    fn timer() -> (Timer, Arc<ManualClock>, Log) {
        let clock = Arc::new(ManualClock::new(Timestamp(10_000)));
        let timer = Timer::with_clock(clock.clone());
        let log = Log::default();
        let sink = log.clone();
        timer.add_output_handler(move |line: &str| sink.lock().unwrap().push(line.to_string()));
        (timer, clock, log)
    }

    fn lines(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn test_start_marks_and_writes_message() {
        let (timer, _, log) = timer();
        let id = timer.start("build").unwrap();

        let activity = timer.get(id).unwrap();
        assert_eq!(activity.timestamps(), &[Timestamp(10_000)]);
        assert_eq!(lines(&log), vec!["build"]);
    }

    #[test]
    fn test_end_reports_elapsed_and_removes() {
        let (timer, clock, log) = timer();
        let id = timer.start("build").unwrap();
        clock.advance(Duration::from_millis(125));

        let activity = timer.end(id).unwrap();
        assert_eq!(activity.id(), id);
        assert_eq!(activity.elapsed_ms(), 125);
        assert_eq!(lines(&log), vec!["build", "build (125ms)"]);
        assert!(timer.is_empty());
    }

    #[test]
    fn test_end_includes_intermediate_marks() {
        let (timer, clock, _) = timer();
        let id = timer.start("build").unwrap();
        clock.advance(Duration::from_millis(5));
        assert_eq!(timer.mark(id).unwrap(), Timestamp(10_005));
        clock.advance(Duration::from_millis(5));

        let activity = timer.end(id).unwrap();
        assert_eq!(
            activity.timestamps(),
            &[Timestamp(10_000), Timestamp(10_005), Timestamp(10_010)]
        );
    }

    #[test]
    fn test_end_is_terminal() {
        let (timer, _, _) = timer();
        let id = timer.start("build").unwrap();
        timer.end(id).unwrap();

        assert!(matches!(timer.end(id), Err(ActivityError::NotFound(_))));
        assert!(matches!(timer.mark(id), Err(ActivityError::NotFound(_))));
        assert!(matches!(timer.get(id), Err(ActivityError::NotFound(_))));
    }

    #[test]
    fn test_start_with_invalid_message_has_no_side_effects() {
        let (timer, _, log) = timer();
        assert!(matches!(
            timer.start(""),
            Err(ActivityError::InvalidArgument(_))
        ));
        assert!(timer.is_empty());
        assert!(lines(&log).is_empty());
        assert_eq!(timer.create("next").unwrap(), 1);
    }

    #[test]
    fn test_start_without_handlers_rolls_back() {
        let timer = Timer::new();
        assert!(matches!(timer.start("x"), Err(ActivityError::NoHandlers)));
        assert!(timer.is_empty());
    }

    #[test]
    fn test_start_disabled_without_handlers_succeeds() {
        let timer = Timer::new();
        timer.disable();
        let id = timer.start("x").unwrap();
        assert_eq!(timer.active_ids(), vec![id]);

        let activity = timer.end(id).unwrap();
        assert_eq!(activity.message(), "x");
    }

    #[test]
    fn test_end_without_handlers_still_removes() {
        let timer = Timer::new();
        timer.disable();
        let id = timer.start("x").unwrap();
        timer.enable();

        assert!(matches!(timer.end(id), Err(ActivityError::NoHandlers)));
        assert!(matches!(timer.get(id), Err(ActivityError::NotFound(_))));
    }

    #[test]
    fn test_destroy_skips_output() {
        let (timer, _, log) = timer();
        let id = timer.create("build").unwrap();
        let activity = timer.destroy(id).unwrap();
        assert!(activity.timestamps().is_empty());
        assert!(lines(&log).is_empty());
    }

    #[test]
    fn test_custom_end_formatter_used_for_later_ends() {
        let (timer, clock, log) = timer();
        let first = timer.start("first").unwrap();
        clock.advance(Duration::from_millis(3));
        timer.end(first).unwrap();

        timer.set_end_formatter(|a: &Activity| format!("done: {} in {:?}", a.message(), a.elapsed()));
        let second = timer.start("second").unwrap();
        clock.advance(Duration::from_millis(7));
        timer.end(second).unwrap();

        assert_eq!(
            lines(&log),
            vec!["first", "first (3ms)", "second", "done: second in 7ms"]
        );
    }

    #[test]
    fn test_scope_ends_on_drop() {
        let (timer, clock, log) = timer();
        {
            let scope = timer.scope("deploy").unwrap();
            assert_eq!(timer.active_ids(), vec![scope.id()]);
            clock.advance(Duration::from_millis(20));
        }
        assert!(timer.is_empty());
        assert_eq!(lines(&log), vec!["deploy", "deploy (20ms)"]);
    }

    #[test]
    fn test_scope_finish_returns_record_once() {
        let (timer, _, log) = timer();
        let scope = timer.scope("deploy").unwrap();
        let activity = scope.finish().unwrap();
        assert_eq!(activity.message(), "deploy");
        assert_eq!(lines(&log).len(), 2);
    }

    #[test]
    fn test_scope_drop_after_manual_end_does_not_panic() {
        let (timer, _, log) = timer();
        {
            let scope = timer.scope("deploy").unwrap();
            timer.end(scope.id()).unwrap();
        }
        assert_eq!(lines(&log).len(), 2);
    }

    #[test]
    fn test_measure_returns_value_and_record() {
        let (timer, clock, _) = timer();
        let (value, activity) = timer
            .measure("sum", || {
                clock.advance(Duration::from_millis(9));
                2 + 2
            })
            .unwrap();
        assert_eq!(value, 4);
        assert_eq!(activity.elapsed_ms(), 9);
    }

    #[test]
    fn test_handler_may_call_back_into_timer() {
        let clock = Arc::new(ManualClock::new(Timestamp(0)));
        let timer = Arc::new(Timer::with_clock(clock));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (inner, sink) = (Arc::downgrade(&timer), seen.clone());
        timer.add_output_handler(move |line: &str| {
            let active = inner.upgrade().map(|t| t.len()).unwrap_or_default();
            sink.lock().unwrap().push(format!("{line}:{active}"));
        });

        let id = timer.start("outer").unwrap();
        timer.end(id).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["outer:1", "outer (0ms):0"]);
    }
}
