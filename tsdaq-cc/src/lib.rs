//! Time sliced digitizer DAQ - command & control
//!
//! The window builder sorts the hits of all digitizer
//! channels into consecutive windows of fixed length.
//! See `windowing` for the algorithm.
//!

#[macro_use] extern crate log;

pub mod channel_state;
pub mod errors;
pub mod liveness;
pub mod threads;
pub mod windowing;

use comfy_table::modifiers::{
  UTF8_ROUND_CORNERS,
  UTF8_SOLID_INNER_BORDERS,
};
use comfy_table::presets::UTF8_FULL;
use comfy_table::*;

use tsdaq_dataclasses::constants::NCHN_PER_BOARD;

use crate::channel_state::ChannelStates;

pub use crate::windowing::{
  Windower,
  WindowerState,
};

/// Overview of the channel states, one row per board
///
/// Active channels show the time they have last been
/// seen (in seconds), idle channels a "-".
///
/// # Arguments
///
/// * channels      : channel states as kept by the
///                   window builder
/// * channel_masks : enabled channels per board
pub fn channel_table(channels : &ChannelStates, channel_masks : &[u16]) -> Table {
  let mut table = Table::new();
  table
    .load_preset(UTF8_FULL)
    .apply_modifier(UTF8_ROUND_CORNERS)
    .apply_modifier(UTF8_SOLID_INNER_BORDERS)
    .set_content_arrangement(ContentArrangement::Dynamic)
    .set_width(160);
  let mut header = vec![Cell::new("Board")];
  for ch in 0..NCHN_PER_BOARD {
    header.push(Cell::new(format!("Ch{:02}", ch)));
  }
  table.set_header(header);
  for (board, mask) in channel_masks.iter().enumerate() {
    let mut row = vec![Cell::new(format!("{:02}", board))];
    for local in 0..NCHN_PER_BOARD {
      if (mask >> local) & 0x1 == 0 {
        row.push(Cell::new("N.A."));
        continue;
      }
      let channel = ((board as u8) << 4) | local;
      match channels.get(channel) {
        Some(state) if state.active => {
          row.push(Cell::new(format!("{:.3}", state.last_seen.seconds())));
        }
        _ => {
          row.push(Cell::new("-"));
        }
      }
    }
    table.add_row(row);
  }
  table
}
