//! Errors which stop the window builder
//!

use std::error::Error;
use std::fmt;

use tsdaq_dataclasses::Time;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum WindowingError {
  /// A hit from a channel which does not exist in
  /// the configured hardware. Most likely the
  /// readout is misconfigured or decoding went wrong.
  UnexpectedChannel { channel : u8, time : Time },
  /// Nobody listens for the windows anymore
  OutboundDisconnected,
  /// Data was handed to a window builder which
  /// already flushed its final window
  EngineStopped,
}

impl WindowingError {
  pub fn to_string(&self) -> String {
    match self {
      WindowingError::UnexpectedChannel { channel, time } => {
        format!("UnexpectedChannel (board {}, channel {}, t = {:.9}s)", channel >> 4, channel & 0xf, time.seconds())
      }
      WindowingError::OutboundDisconnected => String::from("OutboundDisconnected"),
      WindowingError::EngineStopped        => String::from("EngineStopped"),
    }
  }
}

impl fmt::Display for WindowingError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let repr = self.to_string();
    write!(f, "<WindowingError : {}>", repr)
  }
}

impl Error for WindowingError {
}
