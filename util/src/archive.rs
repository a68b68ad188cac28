//! Struct archiving functionality
//!
//! Archives are CSV files with one record per processing cycle. Records are
//! handed to a background writer thread so that archiving never blocks the
//! cycle that produced them.
//!
//! To add archiving functionality to a struct implement the `Archived` trait.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use csv::WriterBuilder;
pub use csv::Writer;
use log::warn;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Sender};
use std::thread::{self, JoinHandle};
use thiserror::Error;

// Internal imports
use crate::session::Session;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An object used to write CSV archive files.
///
/// A default archiver is disabled and silently discards records.
pub struct Archiver<T: Serialize + Send + 'static> {
    path: PathBuf,
    sender: Option<Sender<T>>,
    worker: Option<JoinHandle<()>>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Cannot create the archive file {0:?}: {1}")]
    CreateError(PathBuf, std::io::Error),

    #[error("The archive writer for {0:?} has stopped")]
    WriterStopped(PathBuf)
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A trait which enables a struct to be archived as a csv.
///
/// To implement this trait, the struct shall have an `Archiver` member which
/// shall be setup in the struct's `init` or `new` functions.
pub trait Archived {
    /// Write the archives for this struct
    fn write(&mut self) -> Result<(), ArchiveError>;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<T: Serialize + Send + 'static> Default for Archiver<T> {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            sender: None,
            worker: None
        }
    }
}

impl<T: Serialize + Send + 'static> Archiver<T> {
    /// Create a new archiver from a paricular path relative to the session's
    /// archive root.
    pub fn from_path<P: AsRef<Path>>(
        session: &Session, path: P
    ) -> Result<Self, ArchiveError> {
        Self::create(session.arch_root.join(path))
    }

    /// Create a new archiver writing to the given file, truncating it if it
    /// already exists.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        let path = path.as_ref().to_path_buf();

        // Create the parent directory if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ArchiveError::CreateError(path.clone(), e))?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| ArchiveError::CreateError(path.clone(), e))?;

        let writer = WriterBuilder::new()
            .has_headers(true)
            .from_writer(file);

        let (tx, rx) = channel::<T>();

        let thread_path = path.clone();
        let worker = thread::spawn(move || write_thread(thread_path, writer, rx.into_iter()));

        Ok(Self {
            path,
            sender: Some(tx),
            worker: Some(worker)
        })
    }

    /// Returns true if this archiver writes records to a file.
    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Queue a record to be serialised into the archive.
    ///
    /// This never blocks on file IO.
    pub fn serialise(&mut self, record: T) -> Result<(), ArchiveError> {
        match self.sender {
            Some(ref s) => s
                .send(record)
                .map_err(|_| ArchiveError::WriterStopped(self.path.clone())),
            None => Ok(())
        }
    }
}

impl<T: Serialize + Send + 'static> Drop for Archiver<T> {
    fn drop(&mut self) {
        // Closing the channel lets the writer drain the queue and exit
        self.sender.take();

        if let Some(w) = self.worker.take() {
            if w.join().is_err() {
                warn!("Archive writer thread panicked");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn write_thread<T: Serialize>(
    path: PathBuf,
    mut writer: Writer<File>,
    records: impl Iterator<Item = T>
) {
    for record in records {
        if let Err(e) = writer.serialize(record) {
            warn!("Couldn't write archive record to {:?}: {}", path, e);
        }
    }

    if let Err(e) = writer.flush() {
        warn!("Couldn't flush archive {:?}: {}", path, e);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Serialize)]
    struct Rec {
        tick: u64,
        value_m: f64
    }

    #[test]
    fn test_archiver_writes_on_drop() {
        let path = std::env::temp_dir()
            .join("util_archive_test")
            .join("recs.csv");

        {
            let mut arch = Archiver::create(&path).unwrap();
            assert!(arch.is_enabled());
            arch.serialise(Rec { tick: 0, value_m: 1.5 }).unwrap();
            arch.serialise(Rec { tick: 1, value_m: -0.25 }).unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines, vec!["tick,value_m", "0,1.5", "1,-0.25"]);
    }

    #[test]
    fn test_default_archiver_discards() {
        let mut arch: Archiver<Rec> = Archiver::default();
        assert!(!arch.is_enabled());
        assert!(arch.serialise(Rec { tick: 0, value_m: 0.0 }).is_ok());
    }
}
