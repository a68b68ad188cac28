//! Logger utility functions
//!
//! Records are formatted on the thread that logs them and queued to a
//! background writer thread, which writes them to stdout and the session's
//! log file. A control tick that logs never waits on stdout or the disk.
//!
//! Call `logger_stop` before the process exits so that queued records are
//! written out.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::{ColoredString, Colorize};
use conquer_once::OnceCell;
use log::{self, info};
use std::io::{BufWriter, Write};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

static LOG_WRITER: OnceCell<Mutex<LogWriter>> = OnceCell::uninit();

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A destination for formatted log lines.
pub type LogSink = Box<dyn Write + Send>;

/// Writes queued log lines to a set of sinks from a background thread.
pub struct LogWriter {
    sender: Option<Sender<String>>,
    worker: Option<JoinHandle<()>>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Expected a log level of at least `INFO`, found `{0}`")]
    InvalidMinLogLevel(log::LevelFilter),

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("The logger has already been initialised (conquer_once error: {0})")]
    AlreadyInitialised(conquer_once::TryInitError),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LogWriter {
    /// Start a writer thread which writes every line to each of the sinks.
    pub fn spawn(sinks: Vec<LogSink>) -> Self {
        let (tx, rx) = channel();

        let worker = thread::spawn(move || write_thread(sinks, rx));

        Self {
            sender: Some(tx),
            worker: Some(worker)
        }
    }

    /// Queue a line to be written.
    ///
    /// This never blocks on IO. Lines sent after the writer has stopped are
    /// discarded.
    pub fn send(&self, line: String) {
        if let Some(ref s) = self.sender {
            s.send(line).ok();
        }
    }

    /// Stop the writer once every queued line has been written.
    pub fn stop(&mut self) {
        // Closing the channel lets the writer drain the queue and exit
        self.sender.take();

        if let Some(w) = self.worker.take() {
            // There is nowhere left to report a panicked writer
            w.join().ok();
        }
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
///
/// Records are written to stdout and to the session's log file.
///
/// # Notes
///
/// - `min_level` must be at least `log::Level::Info`, faults raised by the
///   controllers are only visible at `WARN` and `INFO`.
/// - The logger can only be initialised once per process.
pub fn logger_init(
    min_level: self::LevelFilter,
    session: &session::Session
) -> Result<(), LoggerInitError> {

    if min_level < log::Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level))
    }

    let log_file = fern::log_file(session.log_file_path.clone())
        .map_err(LoggerInitError::LogFileInitError)?;

    LOG_WRITER
        .try_init_once(|| Mutex::new(LogWriter::spawn(vec![
            Box::new(std::io::stdout()) as LogSink,
            Box::new(BufWriter::new(log_file)) as LogSink
        ])))
        .map_err(LoggerInitError::AlreadyInitialised)?;

    fern::Dispatch::new()
        .format(|out, message, record| {
            let level = level_to_str(record.level());

            // Debug and trace come from many modules, so include the target
            if record.level() > log::Level::Info {
                out.finish(format_args!(
                    "[{:10.6} {}] {}: {}",
                    session::get_elapsed_seconds(),
                    level,
                    record.target(),
                    message
                ))
            }
            else {
                out.finish(format_args!(
                    "[{:10.6} {}] {}",
                    session::get_elapsed_seconds(),
                    level,
                    message
                ))
            }
        })
        .level(min_level)
        .chain(fern::Output::call(queue_record))
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    info!("    Session epoch: {}", session::get_epoch());
    info!("    Log level: {:?}", min_level);
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

/// Stop logging, waiting for every queued record to be written.
///
/// Records logged afterwards are discarded.
pub fn logger_stop() {
    if let Some(writer) = LOG_WRITER.get() {
        if let Ok(mut w) = writer.lock() {
            w.stop();
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Queue an already formatted record to the writer thread.
fn queue_record(record: &log::Record) {
    if let Some(writer) = LOG_WRITER.get() {
        if let Ok(w) = writer.lock() {
            w.send(record.args().to_string());
        }
    }
}

fn write_thread(mut sinks: Vec<LogSink>, lines: Receiver<String>) {
    // Write everything queued behind each line before flushing
    while let Ok(first) = lines.recv() {
        for line in std::iter::once(first).chain(lines.try_iter()) {
            for sink in sinks.iter_mut() {
                writeln!(sink, "{}", line).ok();
            }
        }

        for sink in sinks.iter_mut() {
            sink.flush().ok();
        }
    }
}

/// Get the string representation of a log level
fn level_to_str(level: log::Level) -> ColoredString {
    match level {
        log::Level::Trace => "TRC".dimmed().italic(),
        log::Level::Debug => "DBG".dimmed(),
        log::Level::Info  => "INF".normal(),
        log::Level::Warn  => "WRN".yellow(),
        log::Level::Error => "ERR".red().bold()
    }
}
