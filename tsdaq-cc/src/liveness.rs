//! Is a digitizer board still responding?
//!
//! The window builder asks this for boards with
//! channels which lag behind. A board which is known
//! to be gone does not need to run out its dead time.

use std::collections::HashMap;
use std::sync::{
  Arc,
  Mutex,
};

use tsdaq_lib::thread_control::ThreadControl;

pub trait DigitizerLiveness {
  fn is_responding(&self, board_id : u8) -> bool;
}

impl<F> DigitizerLiveness for F
  where F : Fn(u8) -> bool {
  fn is_responding(&self, board_id : u8) -> bool {
    self(board_id)
  }
}

/// No information about the boards, only the dead
/// time decides
#[derive(Debug, Copy, Clone, Default)]
pub struct AlwaysResponding;

impl DigitizerLiveness for AlwaysResponding {
  fn is_responding(&self, _board_id : u8) -> bool {
    true
  }
}

/// Board liveness as reported by the readout threads
/// through ThreadControl
///
/// The map is copied on `refresh`, so that the window
/// builder never waits for the lock while it decides
/// about closing windows.
pub struct ThreadControlLiveness {
  thread_control : Arc<Mutex<ThreadControl>>,
  digitizer_active : HashMap<u8, bool>,
}

impl ThreadControlLiveness {

  pub fn new(thread_control : Arc<Mutex<ThreadControl>>) -> Self {
    Self {
      thread_control,
      digitizer_active : HashMap::<u8, bool>::new(),
    }
  }

  /// Update the copy of the liveness flags. Keeps the
  /// old values if the lock is not available.
  pub fn refresh(&mut self) {
    match self.thread_control.try_lock() {
      Ok(tc) => {
        self.digitizer_active = tc.digitizer_active.clone();
      }
      Err(err) => {
        trace!("Can't acquire lock for ThreadControl! {err}");
      }
    }
  }
}

impl DigitizerLiveness for ThreadControlLiveness {
  fn is_responding(&self, board_id : u8) -> bool {
    *self.digitizer_active.get(&board_id).unwrap_or(&true)
  }
}
