//! Events - hits as they come from the digitizers
//! and the time windows they get sorted into
//!

pub mod digitizer_hit;
pub mod time_window;

pub use digitizer_hit::{
  DigitizerHit,
  PulsePolarity,
};
pub use time_window::TimeWindow;

/// The hits of a single readout cycle of one
/// digitizer board
pub type BoardReadout = Vec<DigitizerHit>;

/// Everything the readout threads collected since
/// the last time the inbound queue was drained.
///
/// One entry per board readout, in the order the
/// boards were read out. Boards can appear multiple
/// times or not at all.
pub type RawReadout = Vec<BoardReadout>;
