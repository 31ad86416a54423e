//! TSDAQ-CC - sort the hits of all digitizer boards
//! into consecutive time windows.
//!
//! Spawns the digitizer readout (emulated), the window
//! builder and the window sink and runs until the
//! configured run time is over or a signal arrives.
//!

#[macro_use] extern crate log;
extern crate clap;
extern crate crossbeam_channel;

extern crate tsdaq_dataclasses;
extern crate tsdaq_lib;
extern crate tsdaq_cc;

use std::path::PathBuf;
use std::process::exit;
use std::sync::{
  Arc,
  Mutex,
};
use std::thread;
use std::time::{
  Duration,
  Instant,
};

use clap::Parser;
use colored::Colorize;
use crossbeam_channel as cbc;
use signal_hook::consts::{
  SIGINT,
  SIGTERM,
};
use signal_hook::iterator::Signals;

use tsdaq_dataclasses::events::{
  RawReadout,
  TimeWindow,
};
use tsdaq_dataclasses::io::get_utc_timestamp;
use tsdaq_lib::{
  init_env_logger,
  DaqSettings,
  ThreadControl,
  TSDAQ_LOGO,
};
use tsdaq_cc::threads::{
  digitizer_emulator,
  window_builder,
  window_sink,
};

/*************************************/

#[derive(Parser, Debug)]
#[command(author = "tsdaq developers", version, about, long_about = None)]
struct Args {
  /// A toml config file with the run settings
  #[arg(short, long)]
  config: Option<PathBuf>,
  /// Override the run id from the config file
  #[arg(long)]
  run_id: Option<u32>,
  /// Override the run time from the config file (seconds,
  /// 0 means run until Ctrl+C)
  #[arg(long)]
  runtime: Option<u64>,
  /// Write the windows to disk
  #[arg(short, long, default_value_t = false)]
  write_windows: bool,
  /// Write the (default) settings to the given file and exit
  #[arg(long)]
  write_config: Option<PathBuf>,
}

/*************************************/

fn main() {
  init_env_logger();

  println!("{}", TSDAQ_LOGO);
  let args = Args::parse();

  let mut settings = match &args.config {
    None => {
      warn!("No config file given, using default settings!");
      DaqSettings::new()
    }
    Some(fname) => {
      match DaqSettings::from_toml(fname.to_string_lossy().to_string()) {
        Err(err) => {
          error!("Unable to read config from {}! {}", fname.display(), err);
          exit(1);
        }
        Ok(_settings) => _settings
      }
    }
  };
  if let Some(fname) = &args.write_config {
    settings.to_toml(fname.to_string_lossy().to_string());
    exit(0);
  }
  if let Some(run_id) = args.run_id {
    settings.run_id = run_id;
  }
  if let Some(runtime) = args.runtime {
    settings.runtime_sec = runtime;
  }
  if args.write_windows {
    settings.write_windows = true;
  }
  info!("Using settings:\n{}", settings);
  println!("=> Starting run {} at {}", settings.run_id, get_utc_timestamp());

  let thread_control = Arc::new(Mutex::new(ThreadControl::new()));
  match thread_control.lock() {
    Ok(mut tc) => {
      tc.run_id             = settings.run_id;
      tc.write_data_to_disk = settings.write_windows;
      tc.daq_settings       = settings.clone();
    }
    Err(err) => {
      error!("Can't acquire lock for ThreadControl! {err}");
      exit(1);
    }
  }

  // Ctrl+C and friends end the run gracefully
  let mut signals = match Signals::new([SIGINT, SIGTERM]) {
    Err(err) => {
      error!("Unable to install signal handler! {err}");
      exit(1);
    }
    Ok(_signals) => _signals
  };
  let tc_signals = thread_control.clone();
  let signal_thread = thread::Builder::new()
    .name("signal-handler".into())
    .spawn(move || {
      if let Some(sig) = signals.forever().next() {
        warn!("Received signal {sig}, ending run!");
        match tc_signals.lock() {
          Ok(mut tc) => {
            tc.stop_flag = true;
          }
          Err(err) => {
            error!("Can't acquire lock for ThreadControl! {err}");
          }
        }
      }
    });
  if let Err(err) = signal_thread {
    error!("Failed to spawn signal handler thread! {err}");
    exit(1);
  }

  let (readout_send, readout_rec) : (cbc::Sender<RawReadout>, cbc::Receiver<RawReadout>) = cbc::unbounded();
  let (window_send, window_rec)   : (cbc::Sender<TimeWindow>, cbc::Receiver<TimeWindow>) = cbc::unbounded();

  let tc_sink = thread_control.clone();
  let sink_thread = thread::Builder::new()
    .name("window-sink".into())
    .spawn(move || {
      window_sink(&window_rec, tc_sink)
    });
  let tc_builder = thread_control.clone();
  let builder_thread = thread::Builder::new()
    .name("window-builder".into())
    .spawn(move || {
      window_builder(&readout_rec, &window_send, tc_builder);
    });
  let tc_emulator = thread_control.clone();
  let emulator_thread = thread::Builder::new()
    .name("digitizer-emulator".into())
    .spawn(move || {
      digitizer_emulator(&readout_send, tc_emulator);
    });
  let (sink_thread, builder_thread, emulator_thread) = match (sink_thread, builder_thread, emulator_thread) {
    (Ok(s), Ok(b), Ok(e)) => (s, b, e),
    _ => {
      error!("Failed to spawn the worker threads!");
      if let Ok(mut tc) = thread_control.lock() {
        tc.stop_flag = true;
      }
      exit(1);
    }
  };

  let run_start = Instant::now();
  loop {
    thread::sleep(Duration::from_secs(1));
    match thread_control.lock() {
      Ok(mut tc) => {
        if tc.stop_flag {
          break;
        }
        if settings.runtime_sec > 0 && run_start.elapsed().as_secs() >= settings.runtime_sec {
          info!("Run time of {} seconds reached, ending run!", settings.runtime_sec);
          tc.stop_flag = true;
          break;
        }
      }
      Err(err) => {
        error!("Can't acquire lock for ThreadControl! {err}");
      }
    }
  }

  for (name, handle) in [("digitizer emulator", emulator_thread), ("window builder", builder_thread)] {
    if handle.join().is_err() {
      error!("The {} thread panicked!", name);
    }
  }
  match sink_thread.join() {
    Err(_) => error!("The window sink thread panicked!"),
    Ok(summary) => {
      println!("=> Run {} ended after {:.1}s - {} windows with {} hits",
               settings.run_id, run_start.elapsed().as_secs_f64(), summary.n_windows, summary.n_hits);
    }
  }

  let mut exit_code = 0;
  match thread_control.lock() {
    Ok(tc) => {
      debug!("{}", tc);
      if let Some(err) = &tc.windower_error {
        println!("{} {}", "=> Run ended with a fatal error:".red().bold(), err);
        exit_code = 1;
      }
    }
    Err(err) => {
      error!("Can't acquire lock for ThreadControl! {err}");
      exit_code = 1;
    }
  }
  exit(exit_code);
}
