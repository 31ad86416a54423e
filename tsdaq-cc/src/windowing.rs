//! Sort hits into time windows
//!
//! The digitizers deliver their data asynchronously,
//! so a window can only be closed once every channel
//! which is still delivering data has reached the end
//! of the window. The latest time seen by any of the
//! active channels (the horizon) acts as a watermark:
//!
//! * a channel which lags behind the end of the window,
//!   but was seen less than `dead_time` before the
//!   horizon might still send hits for this window, so
//!   the window has to wait.
//! * a channel which lags behind for longer than that
//!   (or whose board stopped responding) is declared
//!   idle and does not hold back any window anymore,
//!   until it sends data again.
//!
//! Windows are closed in order and never reopened.

use std::fmt;

use tsdaq_dataclasses::events::{
  BoardReadout,
  DigitizerHit,
  PulsePolarity,
  RawReadout,
  TimeWindow,
};
use tsdaq_dataclasses::heartbeats::WindowerHeartbeat;
use tsdaq_dataclasses::Time;
use tsdaq_lib::settings::WindowerSettings;

use crate::channel_state::ChannelStates;
use crate::errors::WindowingError;
use crate::liveness::DigitizerLiveness;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WindowerState {
  /// Nothing buffered
  Idle,
  /// Hits are buffered, but the next window
  /// can not be closed yet
  Accumulating,
  /// Windows are getting closed
  Closing,
  /// Flushing everything as the final window
  Draining,
  Stopped,
}

impl fmt::Display for WindowerState {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let repr = match self {
      WindowerState::Idle         => "Idle",
      WindowerState::Accumulating => "Accumulating",
      WindowerState::Closing      => "Closing",
      WindowerState::Draining     => "Draining",
      WindowerState::Stopped      => "Stopped",
    };
    write!(f, "<WindowerState : {}>", repr)
  }
}

/// The window building engine
///
/// Single threaded, feed it with `add_readout` and
/// collect windows with `close_ready_windows`. At the
/// end of the run, `drain` flushes whatever is left.
pub struct Windower {
  pub run_id         : u32,
  interval           : Time,
  dead_time          : Time,
  polarity           : PulsePolarity,
  emit_empty_windows : bool,
  /// enabled channels per board, index is the board id
  channel_masks      : Vec<u16>,
  channels           : ChannelStates,
  /// Hits which are not yet part of a window,
  /// in the batches they arrived in
  pending            : Vec<BoardReadout>,
  n_pending          : usize,
  window_start       : Time,
  /// id of the next window which gets emitted
  window_id          : u64,
  state              : WindowerState,
  pub heartbeat      : WindowerHeartbeat,
}

impl Windower {

  pub fn new(settings : &WindowerSettings, channel_masks : Vec<u16>, run_id : u32) -> Self {
    let interval  = settings.get_interval();
    let dead_time = settings.get_dead_time();
    info!("Building windows of {:.3}s with a channel dead time of {:.3}s", interval.seconds(), dead_time.seconds());
    Self {
      run_id,
      interval,
      dead_time,
      polarity           : settings.pulse_polarity,
      emit_empty_windows : settings.emit_empty_windows,
      channel_masks,
      channels           : ChannelStates::new(),
      pending            : Vec::<BoardReadout>::new(),
      n_pending          : 0,
      window_start       : Time::ZERO,
      window_id          : 0,
      state              : WindowerState::Idle,
      heartbeat          : WindowerHeartbeat::new(),
    }
  }

  pub fn get_state(&self) -> WindowerState {
    self.state
  }

  pub fn get_interval(&self) -> Time {
    self.interval
  }

  pub fn get_dead_time(&self) -> Time {
    self.dead_time
  }

  /// Start of the next window which will be closed
  pub fn get_window_start(&self) -> Time {
    self.window_start
  }

  pub fn get_channels(&self) -> &ChannelStates {
    &self.channels
  }

  /// Number of hits waiting for their window
  pub fn n_pending(&self) -> usize {
    self.n_pending
  }

  /// Does the channel exist in the configured hardware
  pub fn is_valid_channel(&self, channel : u8) -> bool {
    let board = (channel >> 4) as usize;
    let local = channel & 0xf;
    match self.channel_masks.get(board) {
      None       => false,
      Some(mask) => (mask >> local) & 0x1 == 1,
    }
  }

  /// Take the hits of a readout cycle into the buffer
  ///
  /// Baselines get decoded and the channels marked as
  /// active. A hit from a channel which is not part of
  /// the hardware rejects the whole readout.
  pub fn add_readout(&mut self, readout : RawReadout) -> Result<(), WindowingError> {
    if self.state == WindowerState::Stopped || self.state == WindowerState::Draining {
      error!("Received data after the final window was flushed!");
      return Err(WindowingError::EngineStopped);
    }
    for board_readout in &readout {
      if let Some(hit) = board_readout.iter().find(|h| !self.is_valid_channel(h.channel)) {
        error!("Received hit from channel {} (board {}), which is not part of the configured hardware!",
               hit.get_local_channel(), hit.get_board_id());
        return Err(WindowingError::UnexpectedChannel { channel : hit.channel, time : hit.time });
      }
    }
    self.heartbeat.n_readouts_rcvd += 1;
    for mut board_readout in readout {
      if board_readout.is_empty() {
        continue;
      }
      for hit in board_readout.iter_mut() {
        hit.decode_baseline(self.polarity);
        if self.channels.observe(hit.channel, hit.time) {
          debug!("Channel {} (board {}) is active again", hit.get_local_channel(), hit.get_board_id());
        }
      }
      self.n_pending += board_readout.len();
      self.heartbeat.n_hits_rcvd += board_readout.len() as u64;
      self.pending.push(board_readout);
    }
    if self.n_pending > 0 && self.state == WindowerState::Idle {
      self.state = WindowerState::Accumulating;
    }
    Ok(())
  }

  /// Try to close the next window
  ///
  /// Returns false if the window has to wait for
  /// more data. Lagging channels which ran out their
  /// dead time get idled on the way.
  fn window_closable<L>(&mut self, liveness : &L) -> bool
    where L : DigitizerLiveness + ?Sized {
    let horizon = match self.channels.horizon() {
      None    => return false,
      Some(h) => h,
    };
    let window_end = self.window_start + self.interval;
    if horizon < window_end {
      return false;
    }
    let mut closable = true;
    let mut to_idle  = Vec::<u8>::new();
    for (channel, last_seen) in self.channels.active() {
      if last_seen >= window_end {
        continue;
      }
      if !liveness.is_responding(channel >> 4) {
        to_idle.push(channel);
        continue;
      }
      if last_seen + self.dead_time > horizon {
        trace!("Window at {:.3}s waits for channel {}", self.window_start.seconds(), channel);
        closable = false;
        break;
      }
      to_idle.push(channel);
    }
    for channel in to_idle {
      if self.channels.mark_idle(channel) {
        info!("Channel {} (board {}) went idle, last seen at {:.6}s", channel & 0xf, channel >> 4,
              self.channels.get(channel).map_or(0.0, |s| s.last_seen.seconds()));
        self.heartbeat.n_idle_transitions += 1;
      }
    }
    closable
  }

  /// Move all hits before `end` out of the buffer
  fn take_pending_before(&mut self, end : Time) -> Vec<DigitizerHit> {
    let mut hits = Vec::<DigitizerHit>::new();
    for board_readout in std::mem::take(&mut self.pending) {
      let (in_window, rest) : (Vec<DigitizerHit>, Vec<DigitizerHit>)
        = board_readout.into_iter().partition(|h| h.time < end);
      hits.extend(in_window);
      if !rest.is_empty() {
        self.pending.push(rest);
      }
    }
    self.n_pending -= hits.len();
    hits
  }

  fn make_window(&mut self, hits : Vec<DigitizerHit>, is_final : bool) -> TimeWindow {
    let mut window   = TimeWindow::new();
    window.window_id = self.window_id;
    window.run_id    = self.run_id;
    window.start     = self.window_start;
    window.interval  = self.interval;
    window.is_final  = is_final;
    window.hits      = hits;
    let n_late = window.n_late();
    if n_late > 0 {
      warn!("Window {} contains {} hits which arrived too late for their window!", window.window_id, n_late);
      self.heartbeat.n_hits_late += n_late as u64;
    }
    self.window_id += 1;
    window
  }

  /// Windows which can't get any hits skip the
  /// channel checks. No active channel is behind them
  /// and there are no buffered hits in them.
  fn skip_empty_windows(&mut self) {
    if self.emit_empty_windows {
      return;
    }
    let earliest_pending = self.pending.iter()
      .flat_map(|readout| readout.iter().map(|h| h.time))
      .min();
    let bound = match (earliest_pending, self.channels.laggard()) {
      (Some(p), Some(l)) => p.min(l),
      (None, Some(l))    => l,
      _                  => return,
    };
    let target = bound.floor_to(self.interval);
    if target > self.window_start {
      let n_skipped = (target - self.window_start).bits() / self.interval.bits();
      trace!("Skipping {} empty windows", n_skipped);
      self.heartbeat.n_windows_empty += n_skipped;
      self.window_start = target;
    }
  }

  /// Close as many windows as possible
  ///
  /// Empty windows are only returned if configured so,
  /// otherwise they just advance the window start.
  pub fn close_ready_windows<L>(&mut self, liveness : &L) -> Vec<TimeWindow>
    where L : DigitizerLiveness + ?Sized {
    let mut windows = Vec::<TimeWindow>::new();
    if self.state == WindowerState::Stopped || self.state == WindowerState::Draining {
      return windows;
    }
    loop {
      self.skip_empty_windows();
      if !self.window_closable(liveness) {
        break;
      }
      self.state     = WindowerState::Closing;
      let window_end = self.window_start + self.interval;
      let hits       = self.take_pending_before(window_end);
      if hits.is_empty() && !self.emit_empty_windows {
        self.heartbeat.n_windows_empty += 1;
      } else {
        let window = self.make_window(hits, false);
        debug!("Closed window {} at {:.3}s with {} hits", window.window_id, window.start.seconds(), window.len());
        windows.push(window);
      }
      self.window_start = window_end;
    }
    self.state = if self.n_pending > 0 {
      WindowerState::Accumulating
    } else {
      WindowerState::Idle
    };
    windows
  }

  /// Flush all buffered hits as the final window
  ///
  /// The final window starts at the current window
  /// start, but can contain hits from any later time.
  /// None if nothing was buffered.
  pub fn drain(&mut self) -> Option<TimeWindow> {
    if self.state == WindowerState::Stopped {
      return None;
    }
    self.state = WindowerState::Draining;
    let mut hits = Vec::<DigitizerHit>::with_capacity(self.n_pending);
    for board_readout in std::mem::take(&mut self.pending) {
      hits.extend(board_readout);
    }
    self.n_pending = 0;
    let final_window = if hits.is_empty() {
      None
    } else {
      let window = self.make_window(hits, true);
      info!("Flushing {} remaining hits as final window {}", window.len(), window.window_id);
      Some(window)
    };
    self.state = WindowerState::Stopped;
    final_window
  }

  /// Update the snapshot values of the heartbeat
  pub fn get_heartbeat(&mut self) -> WindowerHeartbeat {
    self.heartbeat.n_channels_active = self.channels.n_active() as u64;
    self.heartbeat.n_hits_pending    = self.n_pending as u64;
    self.heartbeat
  }
}

impl fmt::Display for Windower {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let mut repr = String::from("<Windower:");
    repr += &(format!("\n  state              : {}", self.state));
    repr += &(format!("\n  interval [s]       : {:.6}", self.interval.seconds()));
    repr += &(format!("\n  dead time [s]      : {:.6}", self.dead_time.seconds()));
    repr += &(format!("\n  next window        : {} at {:.6}s", self.window_id, self.window_start.seconds()));
    repr += &(format!("\n  pending hits       : {}", self.n_pending));
    repr += &(format!("\n  {}>", self.channels));
    write!(f, "{}", repr)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::liveness::AlwaysResponding;

  const CH_A : u8 = 0x00;
  const CH_B : u8 = 0x01;

  fn hit_at(seconds : f64, channel : u8) -> DigitizerHit {
    let mut hit = DigitizerHit::new();
    hit.time    = Time::from_seconds(seconds);
    hit.channel = channel;
    hit
  }

  fn windower(interval : f64, dead_time : f64) -> Windower {
    let mut settings       = WindowerSettings::new();
    settings.interval_sec  = interval;
    settings.dead_time_sec = Some(dead_time);
    Windower::new(&settings, vec![0xffff, 0xffff], 0)
  }

  fn times(window : &TimeWindow) -> Vec<f64> {
    let mut times : Vec<f64> = window.hits.iter().map(|h| (h.time.seconds()*1000.0).round()/1000.0).collect();
    times.sort_by(|a, b| a.partial_cmp(b).unwrap());
    times
  }

  #[test]
  fn first_window_waits_for_dead_time() {
    let mut w = windower(0.1, 1.0);
    w.add_readout(vec![vec![hit_at(0.01, CH_A), hit_at(0.05, CH_A)],
                       vec![hit_at(0.02, CH_B)]]).unwrap();
    assert_eq!(w.get_state(), WindowerState::Accumulating);
    w.add_readout(vec![vec![hit_at(0.12, CH_A), hit_at(0.18, CH_A)]]).unwrap();
    // B is lagging, but within its dead time
    assert!(w.close_ready_windows(&AlwaysResponding).is_empty());
    assert_eq!(w.n_pending(), 5);
    // A keeps going, still within B's dead time
    w.add_readout(vec![vec![hit_at(1.01, CH_A)]]).unwrap();
    assert!(w.close_ready_windows(&AlwaysResponding).is_empty());
    assert!(w.get_channels().is_active(CH_B));
    // horizon reaches B's last hit + dead time
    w.add_readout(vec![vec![hit_at(1.02, CH_A)]]).unwrap();
    let windows = w.close_ready_windows(&AlwaysResponding);
    assert!(!w.get_channels().is_active(CH_B));
    assert_eq!(w.heartbeat.n_idle_transitions, 1);
    // [0, 0.1) and [0.1, 0.2), everything up to 1.0 is empty
    assert_eq!(windows.len(), 2);
    assert_eq!(windows[0].start, Time::ZERO);
    assert_eq!(times(&windows[0]), vec![0.01, 0.02, 0.05]);
    assert_eq!(times(&windows[1]), vec![0.12, 0.18]);
    assert_eq!(windows[0].window_id, 0);
    assert_eq!(windows[1].window_id, 1);
    for window in &windows {
      assert!(window.is_consistent());
      assert!(!window.is_final);
    }
    // the window containing 1.01 and 1.02 is still open
    assert_eq!(w.n_pending(), 2);
    assert_eq!(w.get_window_start(), Time::from_seconds(1.01).floor_to(w.get_interval()));
  }

  #[test]
  fn idle_channel_does_not_block_later_windows() {
    let mut w = windower(0.1, 1.0);
    w.add_readout(vec![vec![hit_at(0.01, CH_A)], vec![hit_at(0.02, CH_B)]]).unwrap();
    w.add_readout(vec![vec![hit_at(1.05, CH_A)]]).unwrap();
    let windows = w.close_ready_windows(&AlwaysResponding);
    assert_eq!(windows.len(), 1);
    // from now on, only A decides
    w.add_readout(vec![vec![hit_at(1.12, CH_A)]]).unwrap();
    let windows = w.close_ready_windows(&AlwaysResponding);
    assert_eq!(windows.len(), 1);
    assert_eq!(times(&windows[0]), vec![1.05]);
  }

  #[test]
  fn window_is_held_while_all_channels_lag() {
    let mut w = windower(0.1, 1.0);
    w.add_readout(vec![vec![hit_at(0.01, CH_A), hit_at(0.09, CH_A)],
                       vec![hit_at(0.05, CH_B)]]).unwrap();
    // horizon 0.09 < window end
    assert!(w.close_ready_windows(&AlwaysResponding).is_empty());
    w.add_readout(vec![vec![hit_at(0.10, CH_B)], vec![hit_at(0.11, CH_A)]]).unwrap();
    let windows = w.close_ready_windows(&AlwaysResponding);
    assert_eq!(windows.len(), 1);
    assert_eq!(times(&windows[0]), vec![0.01, 0.05, 0.09]);
    assert_eq!(w.heartbeat.n_idle_transitions, 0);
  }

  #[test]
  fn non_responding_board_is_idled_immediately() {
    let mut w = windower(0.1, 1.0);
    let ch_c  = DigitizerHit::make_channel_id(1, 3);
    w.add_readout(vec![vec![hit_at(0.01, CH_A)], vec![hit_at(0.02, ch_c)]]).unwrap();
    w.add_readout(vec![vec![hit_at(0.15, CH_A)]]).unwrap();
    assert!(w.close_ready_windows(&AlwaysResponding).is_empty());
    let board_one_gone = |board_id : u8| board_id != 1;
    let windows = w.close_ready_windows(&board_one_gone);
    assert_eq!(windows.len(), 1);
    assert_eq!(times(&windows[0]), vec![0.01, 0.02]);
    assert!(!w.get_channels().is_active(ch_c));
  }

  #[test]
  fn unexpected_channel_is_fatal() {
    let mut settings = WindowerSettings::new();
    settings.interval_sec = 0.1;
    // board 0 with channels 0-7, board 1 not present
    let mut w = Windower::new(&settings, vec![0x00ff], 3);
    w.add_readout(vec![vec![hit_at(0.01, 0x07)]]).unwrap();
    let result = w.add_readout(vec![vec![hit_at(0.02, 0x02)], vec![hit_at(0.03, 0x08)]]);
    assert_eq!(result, Err(WindowingError::UnexpectedChannel { channel : 0x08, time : Time::from_seconds(0.03) }));
    let result = w.add_readout(vec![vec![hit_at(0.04, 0x13)]]);
    assert!(matches!(result, Err(WindowingError::UnexpectedChannel { channel : 0x13, .. })));
    // the rejected readouts were not taken
    assert_eq!(w.n_pending(), 1);
    assert!(!w.is_valid_channel(0xff));
  }

  #[test]
  fn baseline_is_decoded_once() {
    let mut settings = WindowerSettings::new();
    settings.pulse_polarity = PulsePolarity::Negative;
    let mut w = Windower::new(&settings, vec![0xffff], 0);
    let mut hit  = hit_at(0.01, CH_A);
    hit.baseline = 400;
    w.add_readout(vec![vec![hit]]).unwrap();
    let window = w.drain().unwrap();
    assert_eq!(window.hits[0].baseline, 100);
  }

  #[test]
  fn drain_flushes_everything() {
    let mut w = windower(0.1, 1.0);
    w.add_readout(vec![vec![hit_at(0.01, CH_A), hit_at(0.35, CH_A)],
                       vec![hit_at(0.02, CH_B)]]).unwrap();
    assert!(w.close_ready_windows(&AlwaysResponding).is_empty());
    let window = w.drain().unwrap();
    assert!(window.is_final);
    assert_eq!(window.start, Time::ZERO);
    assert_eq!(times(&window), vec![0.01, 0.02, 0.35]);
    assert_eq!(w.get_state(), WindowerState::Stopped);
    assert_eq!(w.n_pending(), 0);
    assert!(w.drain().is_none());
    assert_eq!(w.add_readout(vec![vec![hit_at(0.5, CH_A)]]), Err(WindowingError::EngineStopped));
  }

  #[test]
  fn drain_without_data() {
    let mut w = windower(0.1, 1.0);
    assert_eq!(w.get_state(), WindowerState::Idle);
    assert!(w.drain().is_none());
    assert_eq!(w.get_state(), WindowerState::Stopped);
  }

  #[test]
  fn empty_windows_on_request() {
    let mut settings = WindowerSettings::new();
    settings.interval_sec       = 0.1;
    settings.emit_empty_windows = true;
    let mut w = Windower::new(&settings, vec![0xffff], 0);
    w.add_readout(vec![vec![hit_at(0.05, CH_A), hit_at(0.45, CH_A)]]).unwrap();
    let windows = w.close_ready_windows(&AlwaysResponding);
    assert_eq!(windows.len(), 4);
    assert_eq!(windows[0].len(), 1);
    assert!(windows[1..].iter().all(|w| w.is_empty()));
    let ids : Vec<u64> = windows.iter().map(|w| w.window_id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);
    for k in 1..windows.len() {
      assert_eq!(windows[k].start, windows[k-1].end());
    }
  }

  #[test]
  fn empty_windows_are_skipped() {
    let mut w = windower(0.1, 1.0);
    w.add_readout(vec![vec![hit_at(0.05, CH_A), hit_at(0.45, CH_A)]]).unwrap();
    let windows = w.close_ready_windows(&AlwaysResponding);
    assert_eq!(windows.len(), 1);
    assert_eq!(w.heartbeat.n_windows_empty, 3);
    // catch up after a long pause without data
    w.add_readout(vec![vec![hit_at(500.05, CH_A)]]).unwrap();
    let windows = w.close_ready_windows(&AlwaysResponding);
    assert_eq!(windows.len(), 1);
    assert_eq!(times(&windows[0]), vec![0.45]);
    assert_eq!(windows[0].window_id, 1);
    assert_eq!(w.get_window_start(), Time::from_seconds(500.05).floor_to(w.get_interval()));
  }

  #[test]
  fn late_hits_go_into_next_window() {
    let mut w = windower(0.1, 0.5);
    w.add_readout(vec![vec![hit_at(0.01, CH_A)], vec![hit_at(0.02, CH_B)]]).unwrap();
    w.add_readout(vec![vec![hit_at(0.75, CH_A)]]).unwrap();
    let windows = w.close_ready_windows(&AlwaysResponding);
    assert_eq!(windows.len(), 1);
    assert!(!w.get_channels().is_active(CH_B));
    // B wakes up with old data
    w.add_readout(vec![vec![hit_at(0.3, CH_B)]]).unwrap();
    assert!(w.get_channels().is_active(CH_B));
    w.add_readout(vec![vec![hit_at(0.85, CH_A), hit_at(1.31, CH_A)]]).unwrap();
    let windows = w.close_ready_windows(&AlwaysResponding);
    // B was idled again right away, the late hit is in
    // the window which closed next
    assert_eq!(windows.len(), 2);
    assert_eq!(times(&windows[0]), vec![0.3, 0.75]);
    assert_eq!(windows[0].n_late(), 1);
    assert_eq!(w.heartbeat.n_hits_late, 1);
    assert_eq!(times(&windows[1]), vec![0.85]);
  }

  #[test]
  fn windows_are_emitted_in_order() {
    let mut w = windower(0.01, 0.05);
    let mut all = Vec::<TimeWindow>::new();
    for k in 0..200 {
      let t = k as f64 * 0.003;
      w.add_readout(vec![vec![hit_at(t, CH_A)], vec![hit_at(t + 0.0005, CH_B)]]).unwrap();
      all.extend(w.close_ready_windows(&AlwaysResponding));
    }
    all.extend(w.drain());
    for k in 1..all.len() {
      assert!(all[k].start > all[k-1].start);
      assert_eq!(all[k].window_id, all[k-1].window_id + 1);
    }
    let n_hits : usize = all.iter().map(|w| w.len()).sum();
    assert_eq!(n_hits, 400);
    for window in &all[..all.len()-1] {
      assert!(window.is_consistent());
    }
  }
}
