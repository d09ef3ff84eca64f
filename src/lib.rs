pub mod core;
pub use crate::core::*;

pub mod dataset;
pub use crate::dataset::*;

pub mod error;
pub use crate::error::*;

pub mod filter;
pub use crate::filter::*;

pub mod loader;
pub use crate::loader::*;

pub mod report;

pub mod view;
pub use crate::view::*;
