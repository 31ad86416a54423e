//! The heart of tsdaq-cc. The window builder sorts
//! the hits of all boards into time windows.

use std::time::{
  Instant,
  Duration,
};

use std::sync::{
  Arc,
  Mutex,
};

use crossbeam_channel::{
  Receiver,
  RecvTimeoutError,
  Sender,
};

use tsdaq_dataclasses::events::{
  RawReadout,
  TimeWindow,
};
use tsdaq_lib::thread_control::ThreadControl;

use crate::channel_table;
use crate::errors::WindowingError;
use crate::liveness::ThreadControlLiveness;
use crate::windowing::Windower;

/// Hand the windows on to the consumers
fn send_windows(windower : &mut Windower,
                windows  : Vec<TimeWindow>,
                outgoing : &Sender<TimeWindow>) -> Result<(), WindowingError> {
  for window in windows {
    let n_hits = window.len() as u64;
    if outgoing.send(window).is_err() {
      error!("Unable to send window, nobody is listening!");
      return Err(WindowingError::OutboundDisconnected);
    }
    windower.heartbeat.n_windows_sent += 1;
    windower.heartbeat.n_hits_sent    += n_hits;
  }
  Ok(())
}

/// Feed readouts to the windower
///
/// Stops at the first readout which gets rejected.
/// The readouts behind it are consumed and discarded.
fn take_readouts<I>(windower : &mut Windower,
                    readouts : I) -> Result<(), WindowingError>
  where I : IntoIterator<Item = RawReadout> {
  let mut readouts = readouts.into_iter();
  while let Some(readout) = readouts.next() {
    if let Err(err) = windower.add_readout(readout) {
      let n_discarded = readouts.count();
      if n_discarded > 0 {
        error!("Discarding {} readouts which were queued behind the rejected one!", n_discarded);
      }
      return Err(err);
    }
  }
  Ok(())
}

/// Main loop, returns when the run ends or
/// on a fatal error
fn build_windows(windower       : &mut Windower,
                 incoming       : &Receiver<RawReadout>,
                 outgoing       : &Sender<TimeWindow>,
                 channel_masks  : &[u16],
                 hb_interval    : Duration,
                 thread_control : Arc<Mutex<ThreadControl>>) -> Result<(), WindowingError> {
  let mut liveness   = ThreadControlLiveness::new(thread_control.clone());
  let poll_timeout   = windower.get_interval().as_duration() / 2;
  let mut hb_timer   = Instant::now();
  let run_start      = Instant::now();
  loop {
    let stop = match thread_control.try_lock() {
      Ok(tc) => tc.stop_flag,
      Err(err) => {
        trace!("Can't acquire lock for ThreadControl! {err}");
        false
      }
    };
    if stop {
      info!("Received stop signal, flushing the remaining hits!");
      // readouts already queued are part of the run
      take_readouts(windower, incoming.try_iter())?;
      break;
    }
    match incoming.recv_timeout(poll_timeout) {
      Err(RecvTimeoutError::Timeout) => {
        trace!("No new readout");
      }
      Err(RecvTimeoutError::Disconnected) => {
        info!("All producers are gone, flushing the remaining hits!");
        break;
      }
      Ok(readout) => {
        // whatever else is waiting goes in as well
        take_readouts(windower, std::iter::once(readout).chain(incoming.try_iter()))?;
      }
    }
    liveness.refresh();
    let windows = windower.close_ready_windows(&liveness);
    send_windows(windower, windows, outgoing)?;

    if hb_timer.elapsed() >= hb_interval {
      let mut heartbeat  = windower.get_heartbeat();
      heartbeat.met_seconds  = run_start.elapsed().as_secs();
      heartbeat.inbound_len  = incoming.len() as u64;
      heartbeat.outbound_len = outgoing.len() as u64;
      info!("{}", heartbeat);
      debug!("Channel states:\n{}", channel_table(windower.get_channels(), channel_masks));
      hb_timer = Instant::now();
    }
  }
  Ok(())
}

/// Windows ... assemble!
///
/// Receive the readouts of the digitizer boards and
/// sort their hits into windows of fixed length. This
/// runs until the stop flag is set or all producers are
/// gone. The hits which are left then are sent as one
/// final window.
///
/// A fatal error (hit from a channel which does not
/// exist, or nobody receiving the windows) stops the
/// window builder and the run. The error gets reported
/// in ThreadControl.
///
/// # Arguments
///
/// * incoming       : raw readouts from the boards
/// * outgoing       : closed windows
/// * thread_control : stop flag, board liveness and
///                    the settings
pub fn window_builder(incoming       : &Receiver<RawReadout>,
                      outgoing       : &Sender<TimeWindow>,
                      thread_control : Arc<Mutex<ThreadControl>>) {
  let settings;
  let run_id;
  // this can block, it is fine bc it is only
  // happening once at init
  match thread_control.lock() {
    Ok(mut tc) => {
      settings = tc.daq_settings.clone();
      run_id   = tc.run_id;
      tc.thread_window_builder_active = true;
    }
    Err(err) => {
      error!("Can't acquire lock for ThreadControl! {err}");
      error!("CRITICAL: Unable to configure window builder thread! Aborting!");
      return;
    }
  }
  info!("Will assign run id {} to windows!", run_id);
  let channel_masks = settings.get_channel_masks();
  let hb_interval   = Duration::from_secs(settings.windower_settings.hb_send_interval as u64);
  let mut windower  = Windower::new(&settings.windower_settings, channel_masks.clone(), run_id);

  let result = build_windows(&mut windower,
                             incoming,
                             outgoing,
                             &channel_masks,
                             hb_interval,
                             thread_control.clone());
  if let Err(err) = &result {
    error!("Window builder stopped! {}", err);
  }
  // whatever was taken in, goes out
  if let Some(window) = windower.drain() {
    if let Err(err) = send_windows(&mut windower, vec![window], outgoing) {
      error!("Unable to deliver the final window! {}", err);
    }
  }
  info!("{}", windower.get_heartbeat());
  match thread_control.lock() {
    Ok(mut tc) => {
      tc.thread_window_builder_active = false;
      if let Err(err) = result {
        tc.windower_error = Some(err.to_string());
        tc.stop_flag      = true;
      }
    }
    Err(err) => {
      error!("Can't acquire lock for ThreadControl! {err}");
    }
  }
}
