pub mod area;
mod auth;
mod config_cmd;
mod report;
mod watch;

pub use area::AreaCommand;
pub use auth::AuthCommand;
pub use config_cmd::ConfigCommand;
pub use report::ReportCommand;
pub use watch::WatchCommand;
