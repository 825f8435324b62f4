//! CLI command handlers, one per file.

mod fetch;
mod list;
mod run;
mod status;
mod submit;
mod sweep;

pub use fetch::run_fetch;
pub use list::run_list;
pub use run::run_workers;
pub use status::run_status;
pub use submit::run_submit;
pub use sweep::run_sweep;
