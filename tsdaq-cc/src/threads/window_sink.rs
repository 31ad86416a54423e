//! Receive the closed windows and write
//! them to disk
//!

use std::path::PathBuf;
use std::sync::{
  Arc,
  Mutex,
};
use std::time::Duration;

use crossbeam_channel::{
  Receiver,
  RecvTimeoutError,
};
use colored::Colorize;

use tsdaq_dataclasses::events::TimeWindow;
use tsdaq_dataclasses::io::WindowWriter;
use tsdaq_lib::thread_control::ThreadControl;

/// What went through the sink
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct SinkSummary {
  pub n_windows    : u64,
  pub n_hits       : u64,
  pub n_late       : u64,
  /// windows which were not in order
  pub n_misordered : u64,
  pub got_final    : bool,
}

/// Consume windows until the window builder
/// is gone
///
/// The window builder drops its end of the channel
/// after the final window, so no window is lost
/// when the run stops.
///
/// # Arguments
///
/// * incoming       : closed windows
/// * thread_control : configures writing to disk
pub fn window_sink(incoming       : &Receiver<TimeWindow>,
                   thread_control : Arc<Mutex<ThreadControl>>) -> SinkSummary {
  let mut write_to_disk = false;
  let mut data_dir      = PathBuf::new();
  let mut run_id        = 0u32;
  let mut mbytes        = 0usize;
  match thread_control.lock() {
    Ok(mut tc) => {
      tc.thread_window_sink_active = true;
      write_to_disk = tc.write_data_to_disk;
      data_dir      = PathBuf::from(&tc.daq_settings.data_dir);
      run_id        = tc.run_id;
      mbytes        = tc.daq_settings.mbytes_per_file;
    }
    Err(err) => {
      error!("Can't acquire lock for ThreadControl! {err}");
    }
  }

  let mut writer : Option<WindowWriter> = None;
  if write_to_disk {
    match WindowWriter::new(&data_dir, run_id, mbytes) {
      Err(err) => {
        error!("Unable to write windows to {}! {}", data_dir.display(), err);
      }
      Ok(_writer) => {
        writer = Some(_writer);
      }
    }
  }

  let mut summary     = SinkSummary::default();
  let mut last_start  = None;
  loop {
    match incoming.recv_timeout(Duration::from_secs(1)) {
      Err(RecvTimeoutError::Timeout) => {
        trace!("No new window");
      }
      Err(RecvTimeoutError::Disconnected) => {
        info!("Window builder is gone, ending sink!");
        break;
      }
      Ok(window) => {
        debug!("Received window {} at {:.3}s with {} hits", window.window_id, window.start.seconds(), window.len());
        if let Some(start) = last_start {
          if window.start <= start {
            error!("Window {} {}!", window.window_id, "is out of order".red().bold());
            summary.n_misordered += 1;
          }
        }
        last_start         = Some(window.start);
        summary.n_windows += 1;
        summary.n_hits    += window.len() as u64;
        summary.n_late    += window.n_late() as u64;
        if window.is_final {
          info!("Received final window {} with {} hits", window.window_id, window.len());
          summary.got_final = true;
        }
        if let Some(wr) = writer.as_mut() {
          if let Err(err) = wr.add_window(&window) {
            error!("Unable to write window {}! {}", window.window_id, err);
          }
        }
      }
    }
  }
  if let Some(mut wr) = writer {
    if let Err(err) = wr.flush() {
      error!("Unable to flush window file! {err}");
    }
    info!("Wrote {} windows to {}", wr.get_n_windows(), wr.file_name.display());
  }
  info!("Sink received {} windows with {} hits ({} late)", summary.n_windows, summary.n_hits, summary.n_late);
  match thread_control.lock() {
    Ok(mut tc) => {
      tc.thread_window_sink_active = false;
    }
    Err(err) => {
      error!("Can't acquire lock for ThreadControl! {err}");
    }
  }
  summary
}
