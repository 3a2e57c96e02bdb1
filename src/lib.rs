pub mod archive;
pub mod assets;
pub mod assignment;
pub mod bank;
pub mod config;
pub mod converter;
pub mod course;
pub mod error;
pub mod format;
pub mod html;
pub mod options;
pub mod output;
pub mod question;
pub mod record;
pub mod report;
pub mod runner;
pub mod section;
pub mod writer;

pub use converter::Converter;
pub use error::{ConvertError, Result};
pub use options::{BuildOptions, ReferenceErrorPolicy};
