//! Per channel liveness bookkeeping of the window builder
//!
//! A channel is active as long as it is expected to
//! deliver more data. Only active channels can hold
//! back the closing of a window.

use std::fmt;

use tsdaq_dataclasses::Time;

#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct ChannelState {
  /// Latest hit time seen since the channel
  /// became active
  pub last_seen : Time,
  pub active    : bool,
}

/// Liveness of all channels seen so far, indexed by
/// the logical channel id
///
/// Entries get created when a channel shows up for
/// the first time.
#[derive(Debug, Clone, Default)]
pub struct ChannelStates {
  states : Vec<ChannelState>,
}

impl ChannelStates {

  pub fn new() -> Self {
    Self {
      states : Vec::<ChannelState>::new(),
    }
  }

  /// Number of tracked channels (highest channel
  /// id seen + 1)
  pub fn len(&self) -> usize {
    self.states.len()
  }

  pub fn is_empty(&self) -> bool {
    self.states.is_empty()
  }

  pub fn get(&self, channel : u8) -> Option<&ChannelState> {
    self.states.get(channel as usize)
  }

  pub fn is_active(&self, channel : u8) -> bool {
    self.get(channel).map_or(false, |s| s.active)
  }

  /// Register a hit on a channel
  ///
  /// An inactive channel becomes active and starts
  /// over with the time of this hit. Returns true
  /// if the channel was not active before.
  pub fn observe(&mut self, channel : u8, time : Time) -> bool {
    let idx = channel as usize;
    if idx >= self.states.len() {
      self.states.resize(idx + 1, ChannelState::default());
    }
    let state = &mut self.states[idx];
    if state.active {
      state.last_seen = state.last_seen.max(time);
      false
    } else {
      state.active    = true;
      state.last_seen = time;
      true
    }
  }

  /// Declare a channel idle. Returns true if it
  /// was active before.
  pub fn mark_idle(&mut self, channel : u8) -> bool {
    match self.states.get_mut(channel as usize) {
      None => false,
      Some(state) => {
        let was_active = state.active;
        state.active   = false;
        was_active
      }
    }
  }

  /// Active channels and their last seen times
  pub fn active(&self) -> impl Iterator<Item = (u8, Time)> + '_ {
    self.states.iter()
      .enumerate()
      .filter(|(_, s)| s.active)
      .map(|(ch, s)| (ch as u8, s.last_seen))
  }

  pub fn n_active(&self) -> usize {
    self.active().count()
  }

  /// The latest time seen by any of the active
  /// channels. None if no channel is active.
  pub fn horizon(&self) -> Option<Time> {
    self.active().map(|(_, t)| t).max()
  }

  /// The earliest last seen time of the active
  /// channels
  pub fn laggard(&self) -> Option<Time> {
    self.active().map(|(_, t)| t).min()
  }
}

impl fmt::Display for ChannelStates {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let mut repr = String::from("<ChannelStates:");
    repr += &(format!("\n  tracked / active : {} / {}", self.len(), self.n_active()));
    if let Some(h) = self.horizon() {
      repr += &(format!("\n  horizon [s]      : {:.9}", h.seconds()));
    }
    repr += ">";
    write!(f, "{}", repr)
  }
}
