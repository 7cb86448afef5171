#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use crate::pak::error::{PakError, PakResult};
use crate::pak::events::{CancelFlag, Event};
use crate::pak::extract::{extract, ExtractReport};
use crate::pak::pack::{pack, PackReport};

/// An operation running on its own thread.
///
/// Events arrive on `rx` as they happen; the channel closes when the
/// operation returns.
pub struct JobHandle<T> {
    pub rx: mpsc::Receiver<Event>,
    cancel: CancelFlag,
    thread: thread::JoinHandle<PakResult<T>>,
}

pub fn spawn_job<T, F>(cancel: CancelFlag, f: F) -> JobHandle<T>
where
    T: Send + 'static,
    F: FnOnce(mpsc::Sender<Event>, CancelFlag) -> PakResult<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let flag = cancel.clone();
    let thread = thread::spawn(move || f(tx, flag));
    JobHandle { rx, cancel, thread }
}

pub fn spawn_pack(source: PathBuf, dest: PathBuf, data: PathBuf) -> JobHandle<PackReport> {
    spawn_job(CancelFlag::new(), move |tx, _| pack(&source, &dest, &data, &tx))
}

pub fn spawn_extract(dest: PathBuf, source: Option<PathBuf>) -> JobHandle<ExtractReport> {
    spawn_job(CancelFlag::new(), move |tx, cancel| {
        extract(&dest, source.as_deref(), &cancel, &tx)
    })
}

impl<T> JobHandle<T> {
    /// Ask the operation to stop before its next file.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Feed every event to `f` until the job finishes, then return its result.
    pub fn drain(self, mut f: impl FnMut(Event)) -> PakResult<T> {
        for event in self.rx.iter() {
            f(event);
        }
        Self::join(self.thread)
    }

    pub fn wait(self) -> PakResult<T> {
        Self::join(self.thread)
    }

    fn join(thread: thread::JoinHandle<PakResult<T>>) -> PakResult<T> {
        thread
            .join()
            .map_err(|_| PakError::Invalid("worker thread panicked".into()))?
    }
}
