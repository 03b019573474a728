//! Output handlers receiving formatted activity lines.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::mpsc;
use tracing::Level;

/// A sink for formatted activity lines.
///
/// Any `Fn(&str) + Send + Sync` closure is an infallible handler. Handlers
/// that can fail implement the trait directly; an error stops the remaining
/// handlers from running for that line.
pub trait Handler: Send + Sync {
    fn handle(&self, line: &str) -> anyhow::Result<()>;
}

impl<F> Handler for F
where
    F: Fn(&str) + Send + Sync,
{
    fn handle(&self, line: &str) -> anyhow::Result<()> {
        self(line);
        Ok(())
    }
}

/// Ordered list of registered handlers.
///
/// Dispatch works on a snapshot, so handlers run with no lock held and may
/// register further handlers.
#[derive(Default)]
pub(crate) struct HandlerRegistry {
    handlers: RwLock<Vec<Arc<dyn Handler>>>,
}

impl HandlerRegistry {
    pub(crate) fn get(&self) -> Vec<Arc<dyn Handler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set(&self, handlers: Vec<Arc<dyn Handler>>) {
        *self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner) = handlers;
    }

    pub(crate) fn add(&self, handler: Arc<dyn Handler>) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }
}

/// Forwards lines as `tracing` events under the `activity_timer` target
#[derive(Debug, Clone, Copy)]
pub struct TracingHandler {
    level: Level,
}

impl TracingHandler {
    pub fn new(level: Level) -> Self {
        Self { level }
    }
}

impl Default for TracingHandler {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

impl Handler for TracingHandler {
    fn handle(&self, line: &str) -> anyhow::Result<()> {
        match self.level {
            Level::ERROR => tracing::error!(target: "activity_timer", "{line}"),
            Level::WARN => tracing::warn!(target: "activity_timer", "{line}"),
            Level::INFO => tracing::info!(target: "activity_timer", "{line}"),
            Level::DEBUG => tracing::debug!(target: "activity_timer", "{line}"),
            Level::TRACE => tracing::trace!(target: "activity_timer", "{line}"),
        }
        Ok(())
    }
}

/// Writes each line, newline-terminated, to an `io::Write`
pub struct WriterHandler<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterHandler<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl WriterHandler<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl WriterHandler<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> Handler for WriterHandler<W> {
    fn handle(&self, line: &str) -> anyhow::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{line}")?;
        writer.flush()?;
        Ok(())
    }
}

/// Sends lines over an unbounded channel, e.g. to a UI task.
///
/// A dropped receiver is not an error; lines are discarded from then on.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelHandler {
    /// Returns the handler and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Handler for ChannelHandler {
    fn handle(&self, line: &str) -> anyhow::Result<()> {
        if self.tx.send(line.to_string()).is_err() {
            tracing::trace!("activity output channel closed, dropping line");
        }
        Ok(())
    }
}
