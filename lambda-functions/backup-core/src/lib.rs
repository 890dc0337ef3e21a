//! Core pipeline for backing up Route 53 configuration to S3.
//!
//! One invocation flows trigger normalization -> zone resolution -> document
//! assembly -> object write. The Lambda crates (`event-backup`,
//! `config-rule-backup`) are thin shells around [`driver::BackupDriver`].

pub mod assembler;
pub mod config;
pub mod config_rule;
pub mod document;
pub mod driver;
pub mod error;
pub mod reader;
pub mod trigger;
pub mod writer;
pub mod zone;

pub use config::Settings;
pub use document::{BackupDocument, BackupMetadata, ChangeSet, InvocationContext};
pub use driver::{BackupDriver, BackupReport};
pub use error::{BackupError, FailureLog, Result};
pub use reader::{Route53ZoneStore, ZoneStore};
pub use trigger::{normalize_event, Trigger, TriggerKind};
pub use writer::{object_key, ObjectStore, ObjectWriter, S3ObjectStore};
pub use zone::ZoneSnapshot;
