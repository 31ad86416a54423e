//! Aggregate settings for the DAQ
//!
//! Control the settings for the window builder
//! as well as the digitizer emulator and the
//! sink.
//!
//! Different sections represent different
//! threads/aspects of the code
//!

use std::fs::File;
use std::io::{
  Write,
  Read,
};
use std::fmt;

extern crate toml;

use tsdaq_dataclasses::constants::{
  DEFAULT_INTERVAL_SEC,
  DEFAULT_DEAD_TIME_INTERVALS,
  MAX_BOARDS,
};
use tsdaq_dataclasses::events::PulsePolarity;
use tsdaq_dataclasses::serialization::SerializationError;
use tsdaq_dataclasses::Time;

/// Settings for the window builder (the thread
/// which sorts hits into time windows)
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct WindowerSettings {
  /// Length of a time window in seconds.
  /// Needs to be > 0
  pub interval_sec       : f64,
  /// A channel which did not send data for this
  /// long is considered idle and will not hold
  /// back the closing of windows anymore.
  /// If not given, 10 x interval
  pub dead_time_sec      : Option<f64>,
  /// Polarity of the pulses, needed to decode
  /// the baseline
  pub pulse_polarity     : PulsePolarity,
  /// Send a heartbeat every hb_send_interval
  /// seconds
  pub hb_send_interval   : u8,
  /// Hand windows without hits on to the
  /// consumers. Otherwise they get skipped
  pub emit_empty_windows : bool,
}

impl WindowerSettings {
  pub fn new() -> Self {
    Self {
      interval_sec       : DEFAULT_INTERVAL_SEC,
      dead_time_sec      : None,
      pulse_polarity     : PulsePolarity::Negative,
      hb_send_interval   : 30,
      emit_empty_windows : false,
    }
  }

  /// The window length in hardware time units
  ///
  /// Invalid values (non-positive, NaN or too small
  /// to be resolved) fall back to the default
  pub fn get_interval(&self) -> Time {
    let default = Time::from_seconds(DEFAULT_INTERVAL_SEC);
    if !self.interval_sec.is_finite() || self.interval_sec <= 0.0 {
      warn!("Invalid window interval {}s, using default of {}s!", self.interval_sec, DEFAULT_INTERVAL_SEC);
      return default;
    }
    let interval = Time::from_seconds(self.interval_sec);
    if interval == Time::ZERO {
      warn!("Window interval {}s is below the timestamp resolution, using default of {}s!", self.interval_sec, DEFAULT_INTERVAL_SEC);
      return default;
    }
    interval
  }

  /// The dead time in hardware time units
  ///
  /// Defaults to 10 x interval. Invalid values fall
  /// back to the default as well.
  pub fn get_dead_time(&self) -> Time {
    let default = self.get_interval() * DEFAULT_DEAD_TIME_INTERVALS;
    match self.dead_time_sec {
      None => default,
      Some(dt) => {
        if !dt.is_finite() || dt <= 0.0 || Time::from_seconds(dt) == Time::ZERO {
          warn!("Invalid dead time {}s, using {} x interval ({:.3}s)!", dt, DEFAULT_DEAD_TIME_INTERVALS, default.seconds());
          return default;
        }
        Time::from_seconds(dt)
      }
    }
  }
}

impl fmt::Display for WindowerSettings {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let disp : String;
    match toml::to_string(self) {
      Err(err) => {
        error!("Deserialization error! {err}");
        disp = String::from("-- DESERIALIZATION ERROR! --");
      }
      Ok(_disp) => {
        disp = _disp;
      }
    }
    write!(f, "<WindowerSettings :\n{}>", disp)
  }
}

impl Default for WindowerSettings {
  fn default() -> Self {
    Self::new()
  }
}

/// Settings for the digitizer emulator, which
/// stands in for the board readout
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct EmulatorSettings {
  /// Mean hit rate per enabled channel
  pub hit_rate_hz         : f64,
  /// Send a readout to the window builder
  /// every readout_interval_ms
  pub readout_interval_ms : u64,
  /// Attach waveforms with this number of
  /// samples to every hit (0 means no waveforms)
  pub waveform_nsamples   : u16,
  /// Simulate a failing board. This board stops
  /// sending data after silent_after_sec and gets
  /// reported as not responding
  pub silent_board        : Option<u8>,
  pub silent_after_sec    : f64,
}

impl EmulatorSettings {
  pub fn new() -> Self {
    Self {
      hit_rate_hz         : 100.0,
      readout_interval_ms : 20,
      waveform_nsamples   : 0,
      silent_board        : None,
      silent_after_sec    : 5.0,
    }
  }
}

impl fmt::Display for EmulatorSettings {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let disp : String;
    match toml::to_string(self) {
      Err(err) => {
        error!("Deserialization error! {err}");
        disp = String::from("-- DESERIALIZATION ERROR! --");
      }
      Ok(_disp) => {
        disp = _disp;
      }
    }
    write!(f, "<EmulatorSettings :\n{}>", disp)
  }
}

impl Default for EmulatorSettings {
  fn default() -> Self {
    Self::new()
  }
}

/// Configure the DAQ programs
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct DaqSettings {
  /// Identifier of the run, written to every window
  pub run_id                  : u32,
  /// Stop the run after this many seconds.
  /// 0 means run until a signal is received
  pub runtime_sec             : u64,
  /// The directory for window files
  pub data_dir                : String,
  /// Write windows to disk
  pub write_windows           : bool,
  /// Start a new window file after this many MB
  pub mbytes_per_file         : usize,
  /// One 16bit channel enable mask per digitizer
  /// board. The board id is the index in this list
  pub digitizer_channel_masks : Vec<u16>,
  pub windower_settings       : WindowerSettings,
  pub emulator_settings       : EmulatorSettings,
}

impl DaqSettings {
  pub fn new() -> Self {
    Self {
      run_id                  : 0,
      runtime_sec             : 0,
      data_dir                : String::from("/data/tsdaq"),
      write_windows           : false,
      mbytes_per_file         : 420,
      digitizer_channel_masks : vec![0xffff;2],
      windower_settings       : WindowerSettings::new(),
      emulator_settings       : EmulatorSettings::new(),
    }
  }

  /// The channel masks of the boards which can be
  /// addressed by the channel id.
  ///
  /// Surplus boards get ignored with an error.
  pub fn get_channel_masks(&self) -> Vec<u16> {
    if self.digitizer_channel_masks.len() > MAX_BOARDS {
      error!("{} digitizers configured, but only {} can be adressed! Ignoring the surplus boards!",
             self.digitizer_channel_masks.len(), MAX_BOARDS);
      return self.digitizer_channel_masks[0..MAX_BOARDS].to_vec();
    }
    self.digitizer_channel_masks.clone()
  }

  /// Write the settings to a toml file
  pub fn to_toml(&self, mut filename : String) {
    if !filename.ends_with(".toml") {
      filename += ".toml";
    }
    info!("Will write to file {}!", filename);
    match File::create(&filename) {
      Err(err) => {
        error!("Unable to open file {}! {}", filename, err);
      }
      Ok(mut file) => {
        match toml::to_string_pretty(&self) {
          Err(err) => {
            error!("Unable to serialize toml! {err}");
          }
          Ok(toml_string) => {
            match file.write_all(toml_string.as_bytes()) {
              Err(err) => error!("Unable to write to file {}! {}", filename, err),
              Ok(_)    => debug!("Wrote settings to {}!", filename)
            }
          }
        }
      }
    }
  }

  /// Write the settings to a json file
  pub fn to_json(&self, mut filename : String) {
    if !filename.ends_with(".json") {
      filename += ".json";
    }
    info!("Will write to file {}!", filename);
    match File::create(&filename) {
      Err(err) => {
        error!("Unable to open file {}! {}", filename, err);
      }
      Ok(file) => {
        match serde_json::to_writer_pretty(file, &self) {
          Err(err) => {
            error!("Unable to serialize json! {err}");
          }
          Ok(_) => debug!("Wrote settings to {}!", filename)
        }
      }
    }
  }

  pub fn from_toml(filename : String) -> Result<DaqSettings, SerializationError> {
    match File::open(&filename) {
      Err(err) => {
        error!("Unable to open {}! {}", filename, err);
        Err(SerializationError::TomlDecodingError)
      }
      Ok(mut file) => {
        let mut toml_string = String::from("");
        match file.read_to_string(&mut toml_string) {
          Err(err) => {
            error!("Unable to read {}! {}", filename, err);
            Err(SerializationError::TomlDecodingError)
          }
          Ok(_) => {
            match toml::from_str(&toml_string) {
              Err(err) => {
                error!("Can't interpret toml! {}", err);
                Err(SerializationError::TomlDecodingError)
              }
              Ok(settings) => {
                Ok(settings)
              }
            }
          }
        }
      }
    }
  }

  pub fn from_json(filename : String) -> Result<DaqSettings, SerializationError> {
    let file = File::open(&filename)?;
    match serde_json::from_reader(file) {
      Err(err) => {
        error!("Can't interpret json! {}", err);
        Err(SerializationError::JsonDecodingError)
      }
      Ok(settings) => Ok(settings)
    }
  }
}

impl fmt::Display for DaqSettings {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let disp : String;
    match toml::to_string(self) {
      Err(err) => {
        println!("Deserialization error! {err}");
        disp = String::from("-- DESERIALIZATION ERROR! --");
      }
      Ok(_disp) => {
        disp = _disp;
      }
    }
    write!(f, "<DaqSettings :\n{}>", disp)
  }
}

impl Default for DaqSettings {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_dead_time_is_ten_intervals() {
    let settings = WindowerSettings::new();
    assert_eq!(settings.get_dead_time(), settings.get_interval()*10u64);
    let dt = settings.get_dead_time().seconds();
    assert!((dt - 1.0).abs() < 1e-9);
  }

  #[test]
  fn invalid_interval_falls_back_to_default() {
    let mut settings = WindowerSettings::new();
    for bad in [0.0, -1.0, f64::NAN, f64::INFINITY, 1e-15] {
      settings.interval_sec = bad;
      assert_eq!(settings.get_interval(), Time::from_seconds(DEFAULT_INTERVAL_SEC));
    }
  }

  #[test]
  fn invalid_dead_time_falls_back_to_default() {
    let mut settings = WindowerSettings::new();
    settings.interval_sec  = 0.5;
    settings.dead_time_sec = Some(-2.0);
    assert_eq!(settings.get_dead_time(), Time::from_seconds(0.5)*10u64);
    settings.dead_time_sec = Some(2.0);
    assert_eq!(settings.get_dead_time(), Time::from_seconds(2.0));
  }

  #[test]
  fn surplus_boards_are_ignored() {
    let mut settings = DaqSettings::new();
    settings.digitizer_channel_masks = vec![0xff;20];
    assert_eq!(settings.get_channel_masks().len(), MAX_BOARDS);
  }

  #[test]
  fn display_renders_toml() {
    let settings = DaqSettings::new();
    let repr = format!("{}", settings);
    assert!(repr.starts_with("<DaqSettings :"));
    assert!(repr.contains("interval_sec"));
  }
}
