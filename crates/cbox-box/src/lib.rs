//! A complete box: configuration, boot from persisted storage, and the
//! command processor a host talks to.
//!
//! ```no_run
//! use cbox_box::{BoxConfig, Controlbox};
//!
//! let (mut cbox, report) = Controlbox::open(BoxConfig::default())?;
//! println!("restored {} objects", report.total());
//! let _reply = cbox.handle_frame(&[0x05, 0, 0, 0, 0], 0);
//! # Ok::<(), cbox_box::BoxError>(())
//! ```

pub mod config;
pub mod controlbox;
pub mod error;
pub mod persistence;
pub mod processor;

pub use cbox_blox::{ConnectivityHandle, ConnectivitySnapshot};
pub use config::{BoxConfig, StorageBackend, StorageConfig};
pub use controlbox::Controlbox;
pub use error::{BoxError, BoxResult, ConfigError, ConfigResult};
pub use persistence::{LoadReport, PersistenceManager};
pub use processor::{ProcessorState, ProcessorStats};
