pub mod blinding;
pub mod config;
pub mod dataset;
pub mod error;
pub mod model;
pub mod navigation;
pub mod prepare;
pub mod progress;
pub mod store;
pub mod submission;
pub mod util;
