//! Output dispatcher: enabled gate, formatter slots and handler fan-out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::activity::Activity;
use crate::error::{ActivityError, Result};
use crate::format::{DefaultEndFormatter, DefaultStartFormatter, Formatter};
use crate::handler::{Handler, HandlerRegistry};

pub(crate) struct OutputDispatcher {
    enabled: AtomicBool,
    start_formatter: RwLock<Arc<dyn Formatter>>,
    end_formatter: RwLock<Arc<dyn Formatter>>,
    handlers: HandlerRegistry,
}

impl Default for OutputDispatcher {
    fn default() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            start_formatter: RwLock::new(Arc::new(DefaultStartFormatter)),
            end_formatter: RwLock::new(Arc::new(DefaultEndFormatter)),
            handlers: HandlerRegistry::default(),
        }
    }
}

impl OutputDispatcher {
    pub(crate) fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub(crate) fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub(crate) fn set_start_formatter(&self, formatter: Arc<dyn Formatter>) {
        *self
            .start_formatter
            .write()
            .unwrap_or_else(PoisonError::into_inner) = formatter;
    }

    pub(crate) fn set_end_formatter(&self, formatter: Arc<dyn Formatter>) {
        *self
            .end_formatter
            .write()
            .unwrap_or_else(PoisonError::into_inner) = formatter;
    }

    pub(crate) fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub(crate) fn write_start(&self, activity: &Activity) -> Result<()> {
        let formatter = self
            .start_formatter
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        self.write(formatter.as_ref(), activity)
    }

    pub(crate) fn write_end(&self, activity: &Activity) -> Result<()> {
        let formatter = self
            .end_formatter
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        self.write(formatter.as_ref(), activity)
    }

    /// Format `activity` once and hand the line to every handler in
    /// registration order. The first failing handler stops the fan-out.
    pub(crate) fn write(&self, formatter: &dyn Formatter, activity: &Activity) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        let handlers: Vec<Arc<dyn Handler>> = self.handlers.get();
        if handlers.is_empty() {
            return Err(ActivityError::NoHandlers);
        }

        let line = formatter.format(activity);
        for (index, handler) in handlers.iter().enumerate() {
            handler
                .handle(&line)
                .map_err(|source| ActivityError::Handler { index, source })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Timestamp;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recording(log: &Log, name: &'static str) -> Arc<dyn Handler> {
        let log = log.clone();
        Arc::new(move |line: &str| log.lock().unwrap().push(format!("{name}:{line}")))
    }

    struct Failing;

    impl Handler for Failing {
        fn handle(&self, _line: &str) -> anyhow::Result<()> {
            anyhow::bail!("handler exploded")
        }
    }

    fn activity() -> Activity {
        Activity::from_parts(1, "build", vec![Timestamp(100), Timestamp(130)])
    }

    #[test]
    fn test_no_handlers_is_an_error_when_enabled() {
        let dispatcher = OutputDispatcher::default();
        assert!(matches!(
            dispatcher.write_start(&activity()),
            Err(ActivityError::NoHandlers)
        ));
    }

    #[test]
    fn test_disabled_skips_everything() {
        let dispatcher = OutputDispatcher::default();
        dispatcher.disable();
        assert!(!dispatcher.is_enabled());
        assert!(dispatcher.write_start(&activity()).is_ok());

        let log = Log::default();
        dispatcher.handlers().add(recording(&log, "h1"));
        dispatcher.write_end(&activity()).unwrap();
        assert!(log.lock().unwrap().is_empty());

        dispatcher.enable();
        dispatcher.write_end(&activity()).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["h1:build (30ms)".to_string()]);
    }

    #[test]
    fn test_handlers_called_in_order_with_same_line() {
        let dispatcher = OutputDispatcher::default();
        let log = Log::default();
        dispatcher.handlers().add(recording(&log, "h1"));
        dispatcher.handlers().add(recording(&log, "h2"));

        dispatcher.write_start(&activity()).unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["h1:build".to_string(), "h2:build".to_string()]
        );
    }

    #[test]
    fn test_failing_handler_stops_the_rest() {
        let dispatcher = OutputDispatcher::default();
        let log = Log::default();
        let failing: Arc<dyn Handler> = Arc::new(Failing);
        dispatcher
            .handlers()
            .set(vec![recording(&log, "h1"), failing, recording(&log, "h3")]);

        let err = dispatcher.write_start(&activity()).unwrap_err();
        assert!(matches!(err, ActivityError::Handler { index: 1, .. }));
        assert_eq!(*log.lock().unwrap(), vec!["h1:build".to_string()]);
    }

    #[test]
    fn test_formatters_are_replaceable() {
        let dispatcher = OutputDispatcher::default();
        let log = Log::default();
        dispatcher.handlers().add(recording(&log, "h"));

        dispatcher.set_start_formatter(Arc::new(|a: &Activity| format!("> {}", a.message())));
        dispatcher.set_end_formatter(Arc::new(|a: &Activity| format!("< {}", a.message())));
        dispatcher.write_start(&activity()).unwrap();
        dispatcher.write_end(&activity()).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["h:> build".to_string(), "h:< build".to_string()]
        );
    }
}
