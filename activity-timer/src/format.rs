//! Formatters turning an activity into the line handed to output handlers.

use crate::activity::Activity;

/// Produces the human-readable line for an activity at a lifecycle point.
///
/// Any `Fn(&Activity) -> String + Send + Sync` closure is a formatter.
pub trait Formatter: Send + Sync {
    fn format(&self, activity: &Activity) -> String;
}

impl<F> Formatter for F
where
    F: Fn(&Activity) -> String + Send + Sync,
{
    fn format(&self, activity: &Activity) -> String {
        self(activity)
    }
}

/// Default start formatter: the message, verbatim
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultStartFormatter;

impl Formatter for DefaultStartFormatter {
    fn format(&self, activity: &Activity) -> String {
        activity.message().to_string()
    }
}

/// Default end formatter: `"{message} ({elapsed}ms)"`
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultEndFormatter;

impl Formatter for DefaultEndFormatter {
    fn format(&self, activity: &Activity) -> String {
        format!("{} ({}ms)", activity.message(), activity.elapsed_ms())
    }
}

/// End formatter spelling the duration out, e.g. `"build (1s 250ms)"`
#[derive(Debug, Default, Clone, Copy)]
pub struct HumanEndFormatter;

impl Formatter for HumanEndFormatter {
    fn format(&self, activity: &Activity) -> String {
        format!(
            "{} ({})",
            activity.message(),
            humantime::format_duration(activity.elapsed())
        )
    }
}
