#![forbid(unsafe_code)]

mod descriptor;
mod error;
mod events;
mod extract;
mod format;
mod hash;
mod io;
mod jobs;
mod ops;
mod pack;
mod path;
mod table;

pub use descriptor::Descriptor;
pub use error::{PakError, PakResult};
pub use events::{log_event, CancelFlag, Event, EventSink, FileFailure, LogSink};
pub use extract::{extract, ExtractReport};
pub use format::{EntryInfo, HASH_LEN, TRAILER_TAIL};
pub use hash::hash_reader;
pub use jobs::{spawn_extract, spawn_job, spawn_pack, JobHandle};
pub use ops::{entries, list, verify, verify_print, VerifyReport};
pub use pack::{pack, PackReport};
pub use table::TrailerTable;
