//! Heartbeats - regularly sent software
//! monitoring data of the window builder
//!

use std::fmt;
use colored::*;

use crate::serialization::{
  Serialization,
  SerializationError,
  parse_u64,
};

#[cfg(feature="random")]
use crate::FromRandom;
#[cfg(feature="random")]
use rand::Rng;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct WindowerHeartbeat {
  /// elapsed time since the window builder
  /// started in seconds
  pub met_seconds        : u64,
  /// number of raw readouts taken from the
  /// inbound queue
  pub n_readouts_rcvd    : u64,
  pub n_hits_rcvd        : u64,
  /// hits handed on as part of a window
  pub n_hits_sent        : u64,
  pub n_windows_sent     : u64,
  /// windows which have been closed without
  /// any hit in them and were not sent
  pub n_windows_empty    : u64,
  /// how often a channel has been declared idle
  pub n_idle_transitions : u64,
  /// hits which arrived after their window
  /// had already been closed
  pub n_hits_late        : u64,
  /// snapshot - currently active channels
  pub n_channels_active  : u64,
  /// snapshot - hits waiting for their window
  pub n_hits_pending     : u64,
  /// snapshot - length of the inbound queue
  pub inbound_len        : u64,
  /// snapshot - length of the outbound queue
  pub outbound_len       : u64,
}

impl WindowerHeartbeat {

  pub fn new() -> Self {
    Self {
      met_seconds        : 0,
      n_readouts_rcvd    : 0,
      n_hits_rcvd        : 0,
      n_hits_sent        : 0,
      n_windows_sent     : 0,
      n_windows_empty    : 0,
      n_idle_transitions : 0,
      n_hits_late        : 0,
      n_channels_active  : 0,
      n_hits_pending     : 0,
      inbound_len        : 0,
      outbound_len       : 0,
    }
  }

  pub fn get_window_rate(&self) -> f64 {
    if self.met_seconds == 0 {
      return 0.0;
    }
    self.n_windows_sent as f64 / self.met_seconds as f64
  }

  pub fn get_hit_rate(&self) -> f64 {
    if self.met_seconds == 0 {
      return 0.0;
    }
    self.n_hits_rcvd as f64 / self.met_seconds as f64
  }

  pub fn to_string(&self) -> String {
    let mut repr = String::from("<WindowerHeartbeat");
    repr += &(format!("\n  {}", ">> ==== WINDOW BUILDER HEARTBEAT ==== <<".bright_purple().bold()));
    repr += &(format!("\n  Mission elapsed time [s]  : {}", self.met_seconds));
    repr += &(format!("\n  Received readouts / hits  : {} / {} ({:.2} hits/s)", self.n_readouts_rcvd, self.n_hits_rcvd, self.get_hit_rate()));
    repr += &(format!("\n  Sent windows / hits       : {} / {} ({:.2} windows/s)", self.n_windows_sent, self.n_hits_sent, self.get_window_rate()));
    repr += &(format!("\n  Empty windows skipped     : {}", self.n_windows_empty));
    repr += &(format!("\n  Channel idle transitions  : {}", self.n_idle_transitions));
    if self.n_hits_late > 0 {
      repr += &(format!("\n  {} : {}", "Late hits".yellow(), self.n_hits_late));
    }
    repr += &(format!("\n  Active channels           : {}", self.n_channels_active));
    repr += &(format!("\n  Pending hits              : {}", self.n_hits_pending));
    repr += &(format!("\n  Inbound/outbound queue    : {} / {}", self.inbound_len, self.outbound_len));
    repr += &(format!("\n  {}>", ">> ==== ==== END HEARTBEAT ==== ==== <<".bright_purple().bold()));
    repr
  }
}

impl Default for WindowerHeartbeat {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for WindowerHeartbeat {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let repr = self.to_string();
    write!(f, "{}", repr)
  }
}

impl Serialization for WindowerHeartbeat {

  const HEAD : u16 = 0xAAAA;
  const TAIL : u16 = 0x5555;
  const SIZE : usize = 100;

  fn from_bytestream(stream    : &Vec<u8>,
                     pos       : &mut usize)
    -> Result<Self, SerializationError>{
    Self::verify_fixed(stream, pos)?;
    let mut hb = WindowerHeartbeat::new();
    hb.met_seconds        = parse_u64(stream, pos);
    hb.n_readouts_rcvd    = parse_u64(stream, pos);
    hb.n_hits_rcvd        = parse_u64(stream, pos);
    hb.n_hits_sent        = parse_u64(stream, pos);
    hb.n_windows_sent     = parse_u64(stream, pos);
    hb.n_windows_empty    = parse_u64(stream, pos);
    hb.n_idle_transitions = parse_u64(stream, pos);
    hb.n_hits_late        = parse_u64(stream, pos);
    hb.n_channels_active  = parse_u64(stream, pos);
    hb.n_hits_pending     = parse_u64(stream, pos);
    hb.inbound_len        = parse_u64(stream, pos);
    hb.outbound_len       = parse_u64(stream, pos);
    *pos += 2;
    Ok(hb)
  }

  fn to_bytestream(&self) -> Vec<u8> {
    let mut bs = Vec::<u8>::with_capacity(Self::SIZE);
    bs.extend_from_slice(&Self::HEAD.to_le_bytes());
    bs.extend_from_slice(&self.met_seconds       .to_le_bytes());
    bs.extend_from_slice(&self.n_readouts_rcvd   .to_le_bytes());
    bs.extend_from_slice(&self.n_hits_rcvd       .to_le_bytes());
    bs.extend_from_slice(&self.n_hits_sent       .to_le_bytes());
    bs.extend_from_slice(&self.n_windows_sent    .to_le_bytes());
    bs.extend_from_slice(&self.n_windows_empty   .to_le_bytes());
    bs.extend_from_slice(&self.n_idle_transitions.to_le_bytes());
    bs.extend_from_slice(&self.n_hits_late       .to_le_bytes());
    bs.extend_from_slice(&self.n_channels_active .to_le_bytes());
    bs.extend_from_slice(&self.n_hits_pending    .to_le_bytes());
    bs.extend_from_slice(&self.inbound_len       .to_le_bytes());
    bs.extend_from_slice(&self.outbound_len      .to_le_bytes());
    bs.extend_from_slice(&Self::TAIL.to_le_bytes());
    bs
  }
}

#[cfg(feature = "random")]
impl FromRandom for WindowerHeartbeat {
  fn from_random() -> Self {
    let mut rng = rand::thread_rng();
    Self {
      met_seconds        : rng.gen::<u64>(),
      n_readouts_rcvd    : rng.gen::<u64>(),
      n_hits_rcvd        : rng.gen::<u64>(),
      n_hits_sent        : rng.gen::<u64>(),
      n_windows_sent     : rng.gen::<u64>(),
      n_windows_empty    : rng.gen::<u64>(),
      n_idle_transitions : rng.gen::<u64>(),
      n_hits_late        : rng.gen::<u64>(),
      n_channels_active  : rng.gen::<u64>(),
      n_hits_pending     : rng.gen::<u64>(),
      inbound_len        : rng.gen::<u64>(),
      outbound_len       : rng.gen::<u64>(),
    }
  }
}

#[test]
fn heartbeat_rates_without_elapsed_time() {
  let mut hb = WindowerHeartbeat::new();
  hb.n_windows_sent = 10;
  assert_eq!(hb.get_window_rate(), 0.0);
  hb.met_seconds = 5;
  assert_eq!(hb.get_window_rate(), 2.0);
}
