//! Boot Sequence Manager: at orchestrator startup, starts
//! every `auto_start` instance in dependency order, one layer of
//! independent instances at a time, aborting the whole layer the moment any
//! member of it fails.

pub mod sequencer;

pub use sequencer::{BootError, BootSequencer};
