//! Stand-in for the digitizer readout
//!
//! Produces random hits for every enabled channel
//! with the run time as hardware clock. Data is
//! encoded as the digitizer firmware would send it
//! (raw baseline, hardware timestamp words).

use std::thread;
use std::time::{
  Duration,
  Instant,
};
use std::sync::{
  Arc,
  Mutex,
};

use crossbeam_channel::Sender;
use rand::Rng;

use tsdaq_dataclasses::constants::NCHN_PER_BOARD;
use tsdaq_dataclasses::events::{
  BoardReadout,
  DigitizerHit,
  PulsePolarity,
  RawReadout,
};
use tsdaq_dataclasses::Time;
use tsdaq_lib::settings::EmulatorSettings;
use tsdaq_lib::thread_control::ThreadControl;

/// Split a time into the words the digitizer sends
/// (trigger time tag, extras)
pub fn to_hardware_words(time : Time) -> (u32, u32) {
  let coarse   = time.coarse();
  let tag      = (coarse & 0x7fff_ffff) as u32;
  let extended = ((coarse >> 31) & 0xffff) as u32;
  let extras   = extended << 16 | time.fine() as u32;
  (tag, extras)
}

/// Hits of one board between two readouts
///
/// The number of hits per channel follows the
/// configured rate, the times are sorted.
pub fn emulate_board_readout<R : Rng>(rng       : &mut R,
                                      board_id  : u8,
                                      mask      : u16,
                                      from      : f64,
                                      to        : f64,
                                      settings  : &EmulatorSettings,
                                      polarity  : PulsePolarity) -> BoardReadout {
  let mut readout = BoardReadout::new();
  let expected    = settings.hit_rate_hz * (to - from);
  for local in 0..NCHN_PER_BOARD {
    if (mask >> local) & 0x1 == 0 {
      continue;
    }
    let n_hits = (expected + rng.gen::<f64>()).floor() as usize;
    let mut times : Vec<f64> = (0..n_hits).map(|_| rng.gen_range(from..to)).collect();
    times.sort_by(|a, b| a.total_cmp(b));
    for t in times {
      let (tag, extras)  = to_hardware_words(Time::from_seconds(t));
      let mut hit        = DigitizerHit::new();
      hit.time           = Time::from_hardware(tag, extras);
      hit.channel        = DigitizerHit::make_channel_id(board_id, local);
      hit.charge_short   = rng.gen_range(100..2000);
      hit.charge_long    = hit.charge_short + rng.gen_range(0..8000);
      let baseline       = rng.gen_range(2900u16..3100);
      hit.baseline       = match polarity {
        PulsePolarity::Negative => 4*baseline,
        PulsePolarity::Positive => (4*baseline).wrapping_neg(),
      };
      for _ in 0..settings.waveform_nsamples {
        hit.waveform.push(baseline + rng.gen_range(0..20));
      }
      readout.push(hit);
    }
  }
  readout
}

/// Emulate the readout of all configured boards
///
/// Sends a readout of all boards every
/// `readout_interval_ms` until the stop flag is set.
/// A board configured as silent stops sending after
/// `silent_after_sec` and is reported as not responding.
///
/// # Arguments
///
/// * outgoing       : raw readouts for the window builder
/// * thread_control : settings, stop flag, board liveness
pub fn digitizer_emulator(outgoing       : &Sender<RawReadout>,
                          thread_control : Arc<Mutex<ThreadControl>>) {
  let settings;
  let polarity;
  let channel_masks;
  match thread_control.lock() {
    Ok(mut tc) => {
      tc.thread_emulator_active = true;
      settings      = tc.daq_settings.emulator_settings.clone();
      polarity      = tc.daq_settings.windower_settings.pulse_polarity;
      channel_masks = tc.daq_settings.get_channel_masks();
      for board in 0..channel_masks.len() {
        tc.digitizer_active.insert(board as u8, true);
      }
    }
    Err(err) => {
      error!("Can't acquire lock for ThreadControl! {err}");
      error!("CRITICAL: Unable to configure digitizer emulator! Aborting!");
      return;
    }
  }
  info!("Emulating {} digitizer boards at {} Hz per channel", channel_masks.len(), settings.hit_rate_hz);
  let mut rng       = rand::thread_rng();
  let run_start     = Instant::now();
  let mut last_read = 0f64;
  let mut silenced  = false;
  loop {
    thread::sleep(Duration::from_millis(settings.readout_interval_ms));
    match thread_control.try_lock() {
      Ok(mut tc) => {
        if tc.stop_flag {
          info!("Received stop signal, ending digitizer emulation!");
          break;
        }
        if let Some(board) = settings.silent_board {
          if !silenced && run_start.elapsed().as_secs_f64() >= settings.silent_after_sec {
            warn!("Digitizer board {} stops responding!", board);
            tc.digitizer_active.insert(board, false);
            silenced = true;
          }
        }
      }
      Err(err) => {
        trace!("Can't acquire lock for ThreadControl! {err}");
      }
    }
    let now = run_start.elapsed().as_secs_f64();
    let mut readout = RawReadout::new();
    for (board, mask) in channel_masks.iter().enumerate() {
      if silenced && settings.silent_board == Some(board as u8) {
        continue;
      }
      let board_readout = emulate_board_readout(&mut rng, board as u8, *mask, last_read, now, &settings, polarity);
      if !board_readout.is_empty() {
        readout.push(board_readout);
      }
    }
    last_read = now;
    if readout.is_empty() {
      continue;
    }
    if let Err(err) = outgoing.send(readout) {
      error!("Unable to send readout! {err}");
      break;
    }
  }
  match thread_control.lock() {
    Ok(mut tc) => {
      tc.thread_emulator_active = false;
    }
    Err(err) => {
      error!("Can't acquire lock for ThreadControl! {err}");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hardware_words_roundtrip() {
    for s in [0.0, 1e-6, 0.37, 17.0, 4.5e3, 86400.0] {
      let time          = Time::from_seconds(s);
      let (tag, extras) = to_hardware_words(time);
      assert_eq!(Time::from_hardware(tag, extras), time);
    }
  }

  #[test]
  fn emulated_hits_are_encoded() {
    let mut rng  = rand::thread_rng();
    let mut settings = EmulatorSettings::new();
    settings.hit_rate_hz       = 1000.0;
    settings.waveform_nsamples = 8;
    let readout = emulate_board_readout(&mut rng, 2, 0x0003, 1.0, 1.1, &settings, PulsePolarity::Negative);
    // 100 hits expected per channel
    assert!(readout.len() >= 198);
    assert!(readout.len() <= 202);
    for hit in &readout {
      assert_eq!(hit.get_board_id(), 2);
      assert!(hit.get_local_channel() < 2);
      assert!(hit.time >= Time::from_seconds(0.99) && hit.time < Time::from_seconds(1.1));
      assert_eq!(hit.get_nsamples(), 8);
      let mut decoded = hit.clone();
      decoded.decode_baseline(PulsePolarity::Negative);
      assert!(decoded.baseline >= 2900 && decoded.baseline < 3100);
    }
  }

  #[test]
  fn positive_polarity_baseline() {
    let mut rng = rand::thread_rng();
    let readout = emulate_board_readout(&mut rng, 0, 0x0001, 0.0, 1.0, &EmulatorSettings::new(), PulsePolarity::Positive);
    assert!(!readout.is_empty());
    for hit in readout {
      let mut decoded = hit.clone();
      decoded.decode_baseline(PulsePolarity::Positive);
      assert!(decoded.baseline >= 2900 && decoded.baseline < 3100);
    }
  }
}
