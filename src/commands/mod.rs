//! Command Handlers
//!
//! One strongly typed parameter struct per control-file command. Each struct
//! is built from resolved [`BlockParams`] (all coercion happens there, before
//! anything runs) and then executed against the run's [`Session`].
//!
//! ## Guidelines
//!
//! 1. `from_params` only parses and validates; it never reads the store or
//!    touches the filesystem
//! 2. `execute` produces entities through the store's join/insert methods so
//!    uniqueness is always enforced
//! 3. Keep numeric work in `toolbox`, file formats in `readers`

pub mod entity_ops;
pub mod get_series;
pub mod hydrology;
pub mod list_output;
pub mod pest;
pub mod plot;
pub mod series_ops;
pub mod settings;
pub mod statistics;

use std::path::{Path, PathBuf};

use crate::datetime::DateFormat;
use crate::engine::params::BlockParams;
use crate::error::TsResult;
use crate::readers::{BinarySeriesReader, UnsupportedBinaryReader};
use crate::store::EntityStore;

pub use list_output::Listing;
pub use plot::{PlotRequest, Plotter, UnsupportedPlotter};

/// Everything a command may read or change during one run
pub struct Session {
    pub store: EntityStore,
    pub date_format: DateFormat,
    /// Relative file names in the control file resolve against this directory
    pub base_dir: PathBuf,
    /// Layout written by the most recent LIST_OUTPUT, consumed by
    /// WRITE_PEST_FILES
    pub last_listing: Option<Listing>,
    pub binary: Box<dyn BinarySeriesReader>,
    pub plotter: Box<dyn Plotter>,
}

impl Session {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            store: EntityStore::new(),
            date_format: DateFormat::default(),
            base_dir: base_dir.into(),
            last_listing: None,
            binary: Box::new(UnsupportedBinaryReader),
            plotter: Box::new(UnsupportedPlotter),
        }
    }

    pub fn with_binary_reader(mut self, reader: Box<dyn BinarySeriesReader>) -> Self {
        self.binary = reader;
        self
    }

    pub fn with_plotter(mut self, plotter: Box<dyn Plotter>) -> Self {
        self.plotter = plotter;
        self
    }

    pub fn resolve_path(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("store", &self.store.summary())
            .field("date_format", &self.date_format)
            .field("base_dir", &self.base_dir)
            .finish_non_exhaustive()
    }
}

/// A command that can be built from block parameters and run
pub trait BlockCommand: Sized {
    fn from_params(params: &BlockParams, dates: &DateFormat) -> TsResult<Self>;

    fn execute(self, session: &mut Session) -> TsResult<()>;
}
