//! A batch of hits spanning a fixed time interval.
//!
//! Hits are stored in the order they arrived (board
//! readout by board readout), which is NOT necessarily
//! time order. Consumers which require time order
//! have to call `sort_by_time`.

use std::fmt;
use std::collections::BTreeMap;

use crate::events::DigitizerHit;
use crate::serialization::{
  parse_u8,
  parse_u16,
  parse_u32,
  parse_u64,
  Serialization,
  SerializationError,
};
use crate::Time;

#[cfg(feature="random")]
use crate::FromRandom;
#[cfg(feature="random")]
use rand::Rng;

#[derive(Debug, Clone, PartialEq)]
pub struct TimeWindow {
  /// Consecutive number of the window within a run
  pub window_id : u64,
  pub run_id    : u32,
  /// All hits satisfy start <= t < start + interval
  /// (except for hits which arrived late, see n_late)
  pub start     : Time,
  pub interval  : Time,
  /// This window was flushed at shutdown and can
  /// span more than a single interval
  pub is_final  : bool,
  pub hits      : Vec<DigitizerHit>,
}

impl TimeWindow {

  pub fn new() -> Self {
    Self {
      window_id : 0,
      run_id    : 0,
      start     : Time::ZERO,
      interval  : Time::ZERO,
      is_final  : false,
      hits      : Vec::<DigitizerHit>::new(),
    }
  }

  /// End of the nominal window (exclusive)
  pub fn end(&self) -> Time {
    self.start + self.interval
  }

  pub fn len(&self) -> usize {
    self.hits.len()
  }

  pub fn is_empty(&self) -> bool {
    self.hits.is_empty()
  }

  /// Number of hits with a time before the start of
  /// the window
  pub fn n_late(&self) -> usize {
    self.hits.iter().filter(|h| h.time < self.start).count()
  }

  /// Check that all hits lie within the window
  /// boundaries
  pub fn is_consistent(&self) -> bool {
    let end = self.end();
    self.hits.iter().all(|h| h.time >= self.start && (self.is_final || h.time < end))
  }

  /// Earliest and latest hit time
  pub fn get_time_range(&self) -> Option<(Time, Time)> {
    let first = self.hits.iter().map(|h| h.time).min()?;
    let last  = self.hits.iter().map(|h| h.time).max()?;
    Some((first, last))
  }

  /// Number of hits per board id
  pub fn get_hits_per_board(&self) -> BTreeMap<u8, usize> {
    let mut counts = BTreeMap::<u8, usize>::new();
    for h in &self.hits {
      *counts.entry(h.get_board_id()).or_insert(0) += 1;
    }
    counts
  }

  /// Bring the hits into time order
  ///
  /// Hits with the same time keep their arrival order.
  pub fn sort_by_time(&mut self) {
    self.hits.sort_by_key(|h| h.time);
  }
}

impl Default for TimeWindow {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for TimeWindow {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let mut repr = String::from("<TimeWindow:");
    repr += &(format!("\n  run id / window id : {} / {}", self.run_id, self.window_id));
    repr += &(format!("\n  start [s]          : {:.9}", self.start.seconds()));
    repr += &(format!("\n  interval [s]       : {:.9}", self.interval.seconds()));
    repr += &(format!("\n  n hits             : {}", self.hits.len()));
    if self.is_final {
      repr += "\n  -- final window (flushed at shutdown)";
    }
    repr += ">";
    write!(f, "{}", repr)
  }
}

impl Serialization for TimeWindow {

  const HEAD : u16 = 0xAAAA;
  const TAIL : u16 = 0x5555;
  /// Without hits
  const SIZE : usize = 41;

  fn to_bytestream(&self) -> Vec<u8> {
    let mut bs = Vec::<u8>::with_capacity(Self::SIZE + self.hits.len()*DigitizerHit::SIZE);
    bs.extend_from_slice(&Self::HEAD.to_le_bytes());
    bs.extend_from_slice(&self.window_id.to_le_bytes());
    bs.extend_from_slice(&self.run_id.to_le_bytes());
    bs.extend_from_slice(&self.start.bits().to_le_bytes());
    bs.extend_from_slice(&self.interval.bits().to_le_bytes());
    bs.push(self.is_final as u8);
    bs.extend_from_slice(&(self.hits.len() as u64).to_le_bytes());
    for h in &self.hits {
      bs.extend_from_slice(&h.to_bytestream());
    }
    bs.extend_from_slice(&Self::TAIL.to_le_bytes());
    bs
  }

  fn from_bytestream(stream : &Vec<u8>, pos : &mut usize)
    -> Result<Self, SerializationError> {
    if stream.len() < *pos + Self::SIZE {
      return Err(SerializationError::StreamTooShort);
    }
    if parse_u16(stream, pos) != Self::HEAD {
      return Err(SerializationError::HeadInvalid);
    }
    let mut window    = Self::new();
    window.window_id  = parse_u64(stream, pos);
    window.run_id     = parse_u32(stream, pos);
    window.start      = Time::from_bits(parse_u64(stream, pos));
    window.interval   = Time::from_bits(parse_u64(stream, pos));
    window.is_final   = parse_u8(stream, pos) > 0;
    let n_hits        = parse_u64(stream, pos) as usize;
    // the count can not be trusted before the hits are parsed
    window.hits.reserve(n_hits.min((stream.len() - *pos) / DigitizerHit::SIZE));
    for _ in 0..n_hits {
      window.hits.push(DigitizerHit::from_bytestream(stream, pos)?);
    }
    if stream.len() < *pos + 2 {
      return Err(SerializationError::StreamTooShort);
    }
    if parse_u16(stream, pos) != Self::TAIL {
      return Err(SerializationError::TailInvalid);
    }
    Ok(window)
  }
}

#[cfg(feature = "random")]
impl FromRandom for TimeWindow {
  fn from_random() -> Self {
    let mut rng      = rand::thread_rng();
    let mut window   = Self::new();
    window.window_id = rng.gen::<u64>();
    window.run_id    = rng.gen::<u32>();
    window.start     = Time::from_random();
    window.interval  = Time::from_seconds(rng.gen_range(0.001..1.0));
    window.is_final  = rng.gen::<bool>();
    let n_hits       = rng.gen_range(0..50);
    for _ in 0..n_hits {
      window.hits.push(DigitizerHit::from_random());
    }
    window
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn hit_at(seconds : f64, channel : u8) -> DigitizerHit {
    let mut hit = DigitizerHit::new();
    hit.time    = Time::from_seconds(seconds);
    hit.channel = channel;
    hit
  }

  #[test]
  fn sort_keeps_all_hits() {
    let mut window  = TimeWindow::new();
    window.interval = Time::from_seconds(0.1);
    window.hits     = vec![hit_at(0.05, 0), hit_at(0.01, 1), hit_at(0.02, 0x10)];
    assert!(window.is_consistent());
    window.sort_by_time();
    let times : Vec<f64> = window.hits.iter().map(|h| (h.time.seconds()*100.0).round()).collect();
    assert_eq!(times, vec![1.0, 2.0, 5.0]);
    let per_board = window.get_hits_per_board();
    assert_eq!(per_board[&0], 2);
    assert_eq!(per_board[&1], 1);
  }

  #[test]
  fn late_hits_are_counted() {
    let mut window  = TimeWindow::new();
    window.start    = Time::from_seconds(0.2);
    window.interval = Time::from_seconds(0.1);
    window.hits     = vec![hit_at(0.25, 0), hit_at(0.05, 1)];
    assert_eq!(window.n_late(), 1);
    assert!(!window.is_consistent());
    let (first, last) = window.get_time_range().unwrap();
    assert!(first < last);
  }

  #[test]
  fn serialize_window() {
    let mut window   = TimeWindow::new();
    window.window_id = 12;
    window.run_id    = 3;
    window.start     = Time::from_seconds(1.2);
    window.interval  = Time::from_seconds(0.1);
    window.hits      = vec![hit_at(1.21, 0), hit_at(1.25, 0x11)];
    window.hits[1].waveform = vec![10, 11, 12];
    let stream = window.to_bytestream();
    let mut pos = 0usize;
    let test = TimeWindow::from_bytestream(&stream, &mut pos).unwrap();
    assert_eq!(pos, stream.len());
    assert_eq!(test, window);
  }

  #[test]
  fn corrupt_hit_count_is_rejected() {
    let mut window  = TimeWindow::new();
    window.interval = Time::from_seconds(0.1);
    window.hits     = vec![hit_at(0.01, 0), hit_at(0.02, 1)];
    let mut stream  = window.to_bytestream();
    // hit count sits right in front of the first hit
    let count_pos   = TimeWindow::SIZE - 2 - 8;
    stream[count_pos..count_pos + 8].copy_from_slice(&u64::MAX.to_le_bytes());
    let mut pos = 0usize;
    assert!(TimeWindow::from_bytestream(&stream, &mut pos).is_err());
    stream[count_pos..count_pos + 8].copy_from_slice(&(u32::MAX as u64).to_le_bytes());
    pos = 0;
    assert!(TimeWindow::from_bytestream(&stream, &mut pos).is_err());
  }
}
