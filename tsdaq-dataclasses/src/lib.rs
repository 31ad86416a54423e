//! Dataclasses for the time-sliced digitizer DAQ
//!
//! * `Time` - the fixed point hardware timestamp of the
//!   waveform digitizers
//! * `DigitizerHit` - a single decoded pulse measurement
//! * `TimeWindow` - a batch of hits spanning a fixed
//!   interval, the unit handed to triggers and storage
//!
//! Binary (de)serialization of all of the above lives
//! in `serialization`, writing/reading of window files
//! in `io`.

pub mod constants;
pub mod errors;
pub mod events;
pub mod heartbeats;
pub mod io;
pub mod serialization;
pub mod timestamp;

#[macro_use] extern crate log;

pub use timestamp::Time;

/// Create a struct with random values
///
/// Used for testing (de)serialization
#[cfg(feature = "random")]
pub trait FromRandom {
  fn from_random() -> Self;
}
