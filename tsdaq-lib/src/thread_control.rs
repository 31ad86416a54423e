//! Thread control structures

use std::collections::HashMap;
use std::fmt;

use crate::settings::DaqSettings;

/// Send runtime information
/// to threads via shared memory
/// (Arc(Mutex)
#[derive(Default, Debug)]
pub struct ThreadControl {
  /// Stop ALL threads
  pub stop_flag                    : bool,
  /// alive indicator for the window builder thread
  pub thread_window_builder_active : bool,
  /// alive indicator for window sink thread
  pub thread_window_sink_active    : bool,
  /// alive indicator for digitizer emulator thread
  pub thread_emulator_active       : bool,
  /// Is the link to a digitizer board still
  /// responding - the key is the board id.
  /// Boards which are not in here count as
  /// responding
  pub digitizer_active             : HashMap<u8, bool>,
  /// The window builder stopped because of a
  /// fatal error
  pub windower_error               : Option<String>,
  /// The current run id
  pub run_id                       : u32,
  /// Write windows to disk
  pub write_data_to_disk           : bool,
  pub daq_settings                 : DaqSettings,
}

impl ThreadControl {
  pub fn new() -> Self {
    Self {
      stop_flag                    : false,
      thread_window_builder_active : false,
      thread_window_sink_active    : false,
      thread_emulator_active       : false,
      digitizer_active             : HashMap::<u8,bool>::new(),
      windower_error               : None,
      run_id                       : 0,
      write_data_to_disk           : false,
      daq_settings                 : DaqSettings::new(),
    }
  }

  /// Board liveness as last reported by the
  /// readout
  pub fn is_digitizer_active(&self, board_id : u8) -> bool {
    *self.digitizer_active.get(&board_id).unwrap_or(&true)
  }

  /// Are any of the worker threads still running
  pub fn any_thread_active(&self) -> bool {
       self.thread_window_builder_active
    || self.thread_window_sink_active
    || self.thread_emulator_active
  }
}

impl fmt::Display for ThreadControl {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let mut repr = String::from("<ThreadControl:");
    repr        += &(format!("\n  Run ID         : {}", self.run_id));
    repr        += &(format!("\n  wr to disk     : {}", self.write_data_to_disk));
    repr        += "\n    -- program status:";
    repr        += &(format!("\n  stop flag      : {}", self.stop_flag));
    if let Some(err) = &self.windower_error {
      repr      += &(format!("\n  windower error : {}", err));
    }
    repr        += "\n    -- reported thread activity:";
    repr        += &(format!("\n  window builder : {}", self.thread_window_builder_active));
    repr        += &(format!("\n  window sink    : {}", self.thread_window_sink_active));
    repr        += &(format!("\n  emulator       : {}", self.thread_emulator_active));
    if !self.digitizer_active.is_empty() {
      repr      += "\n    -- digitizer liveness";
      let mut boards : Vec<&u8> = self.digitizer_active.keys().collect();
      boards.sort();
      for k in boards {
        repr    += &(format!("\n  -- -- {} : {}", k, self.is_digitizer_active(*k)));
      }
    }
    repr        += ">";
    write!(f, "{}", repr)
  }
}
