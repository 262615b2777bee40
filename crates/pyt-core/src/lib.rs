pub mod bootstrap;
pub mod configure;
pub mod diff;
pub mod error;
pub mod fetch;
pub mod hook;
pub mod io;
pub mod migrate;
pub mod names;
pub mod paths;
pub mod runner;
pub mod settings;
pub mod status;
pub mod sync_state;

pub use error::{PytError, Result};
