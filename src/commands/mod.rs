pub mod assign;
pub mod context;
pub mod export;
pub mod show;
pub mod status;
pub mod submit;
