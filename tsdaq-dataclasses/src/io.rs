//! Write time windows to disk and read them back
//!
//! Window files are a plain sequence of serialized
//! `TimeWindow`s. A new file is started once the
//! configured size is exceeded.

use std::fs::{
  self,
  File,
  OpenOptions,
};
use std::io::{
  BufWriter,
  Write,
};
use std::path::{
  Path,
  PathBuf,
};

use chrono::{
  DateTime,
  Utc
};

use crate::constants::WINDOW_FILE_SUFFIX;
use crate::events::TimeWindow;
use crate::serialization::{
  Serialization,
  SerializationError,
};

/// The TimeStamp format for Human readable timestamps
pub static HUMAN_TIMESTAMP_FORMAT : &str = "%y%m%d_%H%M%S%Z";

/// Get a human readable timestamp
pub fn get_utc_timestamp() -> String {
  let now: DateTime<Utc> = Utc::now();
  now.format(HUMAN_TIMESTAMP_FORMAT).to_string()
}

/// A standardized name for window files
///
/// # Arguments
///
/// * run    : run id (identifier)
/// * subrun : number of the file within the run
pub fn get_runfilename(run : u32, subrun : u64) -> String {
  let ts = get_utc_timestamp();
  format!("Run{run}_{subrun}.{ts}.{WINDOW_FILE_SUFFIX}")
}

/// Write TimeWindows to disk.
///
/// Windows are added one at a time and get
/// buffered, call `flush` (or drop the writer)
/// to sync them to disk.
pub struct WindowWriter {
  /// location to store the files
  pub file_path       : PathBuf,
  /// The maximum number of (Mega)bytes
  /// per file. After this a new file
  /// is started
  pub mbytes_per_file : usize,
  pub run_id          : u32,
  pub file_name       : PathBuf,
  writer              : BufWriter<File>,
  file_id             : u64,
  /// windows which went through the writer
  n_windows           : usize,
  /// bytes written to the current file
  file_nbytes_wr      : usize,
}

impl WindowWriter {

  /// Open the first file of a run in the given directory
  ///
  /// The directory gets created if it does not exist.
  pub fn new(file_path : &Path, run_id : u32, mbytes_per_file : usize)
    -> Result<Self, SerializationError> {
    fs::create_dir_all(file_path)?;
    let file_name = file_path.join(get_runfilename(run_id, 0));
    info!("Writing windows to file {}", file_name.display());
    let file = OpenOptions::new().create(true).append(true).open(&file_name)?;
    Ok(Self {
      file_path       : file_path.to_path_buf(),
      mbytes_per_file,
      run_id,
      file_name,
      writer          : BufWriter::new(file),
      file_id         : 0,
      n_windows       : 0,
      file_nbytes_wr  : 0,
    })
  }

  pub fn get_n_windows(&self) -> usize {
    self.n_windows
  }

  /// Serialize a window to the current file
  pub fn add_window(&mut self, window : &TimeWindow) -> Result<(), SerializationError> {
    let buffer = window.to_bytestream();
    self.writer.write_all(buffer.as_slice())?;
    self.file_nbytes_wr += buffer.len();
    self.n_windows      += 1;
    if self.mbytes_per_file > 0 && self.file_nbytes_wr >= self.mbytes_per_file*1_000_000 {
      self.next_file()?;
    }
    Ok(())
  }

  pub fn flush(&mut self) -> Result<(), SerializationError> {
    self.writer.flush()?;
    Ok(())
  }

  fn next_file(&mut self) -> Result<(), SerializationError> {
    self.writer.flush()?;
    self.file_id       += 1;
    self.file_nbytes_wr = 0;
    self.file_name      = self.file_path.join(get_runfilename(self.run_id, self.file_id));
    info!("Starting new file {}", self.file_name.display());
    let file = OpenOptions::new().create(true).append(true).open(&self.file_name)?;
    self.writer = BufWriter::new(file);
    Ok(())
  }
}

impl Drop for WindowWriter {
  fn drop(&mut self) {
    if let Err(err) = self.writer.flush() {
      error!("Unable to flush {}! {err}", self.file_name.display());
    }
  }
}

/// Read all windows from a window file
///
/// Reading stops at the first window which can not
/// be decoded. This happens e.g. for a file which was
/// still being written.
pub fn read_windows(filename : &Path) -> Result<Vec<TimeWindow>, SerializationError> {
  let stream      = fs::read(filename)?;
  let mut windows = Vec::<TimeWindow>::new();
  let mut pos     = 0usize;
  while pos < stream.len() {
    match TimeWindow::from_bytestream(&stream, &mut pos) {
      Err(err) => {
        warn!("Unable to decode window at position {} in {}! {}", pos, filename.display(), err);
        break;
      }
      Ok(window) => {
        windows.push(window);
      }
    }
  }
  Ok(windows)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::events::DigitizerHit;
  use crate::Time;

  #[test]
  fn write_and_read_window_file() {
    let dir = std::env::temp_dir().join(format!("tsdaq-io-test-{}", std::process::id()));
    let mut writer = WindowWriter::new(&dir, 42, 0).unwrap();
    let mut windows = Vec::<TimeWindow>::new();
    for k in 0..5u64 {
      let mut window   = TimeWindow::new();
      window.window_id = k;
      window.run_id    = 42;
      window.interval  = Time::from_seconds(0.1);
      window.start     = window.interval * k;
      let mut hit      = DigitizerHit::new();
      hit.time         = window.start + Time::from_seconds(0.01);
      window.hits.push(hit);
      writer.add_window(&window).unwrap();
      windows.push(window);
    }
    writer.flush().unwrap();
    assert_eq!(writer.get_n_windows(), 5);
    let fname = writer.file_name.clone();
    drop(writer);
    let test = read_windows(&fname).unwrap();
    assert_eq!(test, windows);
    let _ = fs::remove_dir_all(&dir);
  }
}
