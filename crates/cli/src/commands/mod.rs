//! CLI commands for the research studies.

pub mod context;
pub mod db;
pub mod experiments;
pub mod merger;
pub mod underdog;

pub use context::{Context, GlobalArgs};
pub use db::{run_db, DbCommand};
pub use merger::{run_merger, MergerCommand};
pub use underdog::{run_underdog, UnderdogCommand};
