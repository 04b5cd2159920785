pub mod build;
pub mod catalog;
pub mod config;
pub mod inspect;
pub mod recommend;

pub use build::run_build;
pub use inspect::show_inspect;
pub use recommend::{run_profile, run_recommend, Query};
