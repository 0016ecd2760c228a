pub mod app_config;
mod box_iter;
mod error;
pub mod float;
pub mod logging;

pub mod prelude {
    pub use super::app_config::AppConfig;
    pub use super::error::{Error, Result};
    pub use super::logging::prelude::*;
}

pub use app_config::AppConfig;
pub use box_iter::{BoxIterator, IntoBoxIter};
pub use error::{Error, Result};
