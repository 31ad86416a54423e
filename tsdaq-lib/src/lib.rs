//! Shared functionality of the tsdaq programs
//!
//! * `settings` - run configuration as read from toml files
//! * `thread_control` - runtime state shared between the
//!   worker threads
//! * logging helpers

pub mod settings;
pub mod thread_control;

pub use settings::{
  DaqSettings,
  EmulatorSettings,
  WindowerSettings,
};
pub use thread_control::ThreadControl;

use std::io::Write;

use colored::{
  Colorize,
  ColoredString,
};
use log::Level;

#[macro_use] extern crate log;
extern crate env_logger;

pub const TSDAQ_LOGO : &str = "
   _               _
  | |_ ___ __| | __ _  __ _
  | __/ __|/ _` |/ _` |/ _` |
  | |_\\__ \\ (_| | (_| | (_| |
   \\__|___/\\__,_|\\__,_|\\__, |
                          |_|
  (tsdaq - time sliced digitizer data acquisition)
";

/// Make sure that the loglevel is in color, even though not using pretty_env logger
pub fn color_log(level : &Level) -> ColoredString {
  match level {
    Level::Error    => String::from(" ERROR!").red(),
    Level::Warn     => String::from(" WARN  ").yellow(),
    Level::Info     => String::from(" Info  ").green(),
    Level::Debug    => String::from(" debug ").blue(),
    Level::Trace    => String::from(" trace ").cyan(),
  }
}

/// Set up the environmental (env) logger
/// with our format
///
/// Ensure that the lines and module paths
/// are printed in the logging output. Without
/// RUST_LOG, the level is info.
pub fn init_env_logger() {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
    .format(|buf, record| {
    writeln!( buf, "[{level}][{module_path}:{line}] {args}",
      level = color_log(&record.level()),
      module_path = record.module_path().unwrap_or("<unknown>"),
      line = record.line().unwrap_or(0),
      args = record.args()
      )
    }).init();
}
