use std::fmt;

use crate::constants::NCHN_PER_BOARD;
use crate::serialization::{
  parse_u8,
  parse_u16,
  parse_u32,
  parse_u64,
  u16_to_u8,
  u8_to_u16,
  Serialization,
  SerializationError,
};
use crate::Time;

#[cfg(feature="random")]
use crate::FromRandom;
#[cfg(feature="random")]
use rand::Rng;

/// Polarity of the detector pulses as configured
/// on the digitizer
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub enum PulsePolarity {
  Positive,
  Negative,
}

impl Default for PulsePolarity {
  fn default() -> Self {
    PulsePolarity::Negative
  }
}

impl fmt::Display for PulsePolarity {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      PulsePolarity::Positive => write!(f, "<PulsePolarity : Positive>"),
      PulsePolarity::Negative => write!(f, "<PulsePolarity : Negative>"),
    }
  }
}

/// A single pulse as measured by one digitizer channel
///
/// The time is the full fixed point timestamp, the
/// channel is the logical channel
/// `local channel | board id << 4`.
#[derive(Debug, Clone, PartialEq)]
pub struct DigitizerHit {
  pub time         : Time,
  /// charge integral over the short gate
  pub charge_short : u16,
  /// charge integral over the long gate
  pub charge_long  : u16,
  /// baseline - needs to be decoded (see
  /// `decode_baseline`) before it can be used
  pub baseline     : u16,
  pub channel      : u8,
  /// waveform samples (ADC), only present if the
  /// digitizers run in mixed mode
  pub waveform     : Vec<u16>,
}

impl DigitizerHit {

  pub fn new() -> Self {
    Self {
      time         : Time::ZERO,
      charge_short : 0,
      charge_long  : 0,
      baseline     : 0,
      channel      : 0,
      waveform     : Vec::<u16>::new(),
    }
  }

  /// Pack board id and channel on the board into
  /// the logical channel id
  pub fn make_channel_id(board_id : u8, local_channel : u8) -> u8 {
    (local_channel & 0xf) | board_id << 4
  }

  pub fn get_board_id(&self) -> u8 {
    self.channel >> 4
  }

  pub fn get_local_channel(&self) -> u8 {
    self.channel % NCHN_PER_BOARD
  }

  pub fn has_waveform(&self) -> bool {
    !self.waveform.is_empty()
  }

  pub fn get_nsamples(&self) -> usize {
    self.waveform.len()
  }

  /// Correct the baseline for a firmware bug.
  ///
  /// The DPP-PSD firmware reports 4 times the baseline
  /// and as int16, with the sign depending on the pulse
  /// polarity. This needs to be done exactly once per hit.
  pub fn decode_baseline(&mut self, polarity : PulsePolarity) {
    self.baseline = match polarity {
      PulsePolarity::Negative => self.baseline / 4,
      PulsePolarity::Positive => self.baseline.wrapping_neg() / 4,
    };
  }
}

impl Default for DigitizerHit {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for DigitizerHit {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let mut repr = String::from("<DigitizerHit:");
    repr += &(format!("\n  board/channel : {}/{} (id {})", self.get_board_id(), self.get_local_channel(), self.channel));
    repr += &(format!("\n  time [s]      : {:.12}", self.time.seconds()));
    repr += &(format!("\n  charge S/L    : {} {}", self.charge_short, self.charge_long));
    repr += &(format!("\n  baseline      : {}", self.baseline));
    if self.has_waveform() {
      repr += &(format!("\n  waveform      : {} samples", self.get_nsamples()));
    }
    repr += ">";
    write!(f, "{}", repr)
  }
}

impl Serialization for DigitizerHit {

  const HEAD : u16 = 0xAAAA;
  const TAIL : u16 = 0x5555;
  /// Without waveform
  const SIZE : usize = 23;

  fn to_bytestream(&self) -> Vec<u8> {
    let mut bs = Vec::<u8>::with_capacity(Self::SIZE + 2*self.waveform.len());
    bs.extend_from_slice(&Self::HEAD.to_le_bytes());
    bs.extend_from_slice(&self.time.bits().to_le_bytes());
    bs.extend_from_slice(&self.charge_short.to_le_bytes());
    bs.extend_from_slice(&self.charge_long.to_le_bytes());
    bs.extend_from_slice(&self.baseline.to_le_bytes());
    bs.push(self.channel);
    bs.extend_from_slice(&(self.waveform.len() as u32).to_le_bytes());
    bs.extend_from_slice(&u16_to_u8(&self.waveform));
    bs.extend_from_slice(&Self::TAIL.to_le_bytes());
    bs
  }

  /// Deserialize a hit at a given position
  ///
  /// The length of the waveform is part of the stream,
  /// `pos` will point right after the tail.
  fn from_bytestream(stream : &Vec<u8>, pos : &mut usize)
    -> Result<Self, SerializationError> {
    if stream.len() < *pos + Self::SIZE {
      return Err(SerializationError::StreamTooShort);
    }
    if parse_u16(stream, pos) != Self::HEAD {
      return Err(SerializationError::HeadInvalid);
    }
    let mut hit      = Self::new();
    hit.time         = Time::from_bits(parse_u64(stream, pos));
    hit.charge_short = parse_u16(stream, pos);
    hit.charge_long  = parse_u16(stream, pos);
    hit.baseline     = parse_u16(stream, pos);
    hit.channel      = parse_u8(stream, pos);
    let nsamples     = parse_u32(stream, pos) as usize;
    if stream.len() < *pos + 2*nsamples + 2 {
      return Err(SerializationError::StreamTooShort);
    }
    hit.waveform     = u8_to_u16(&stream[*pos..*pos + 2*nsamples]);
    *pos += 2*nsamples;
    if parse_u16(stream, pos) != Self::TAIL {
      return Err(SerializationError::TailInvalid);
    }
    Ok(hit)
  }
}

#[cfg(feature = "random")]
impl FromRandom for DigitizerHit {
  fn from_random() -> Self {
    let mut rng      = rand::thread_rng();
    let mut hit      = Self::new();
    hit.time         = Time::from_random();
    hit.charge_short = rng.gen::<u16>();
    hit.charge_long  = rng.gen::<u16>();
    hit.baseline     = rng.gen::<u16>();
    hit.channel      = rng.gen::<u8>();
    if rng.gen::<bool>() {
      let nsamples = rng.gen_range(1..256);
      for _ in 0..nsamples {
        hit.waveform.push(rng.gen::<u16>());
      }
    }
    hit
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn channel_id_packing() {
    let id = DigitizerHit::make_channel_id(3, 7);
    assert_eq!(id, 0x37);
    let mut hit = DigitizerHit::new();
    hit.channel = id;
    assert_eq!(hit.get_board_id(), 3);
    assert_eq!(hit.get_local_channel(), 7);
    // full range: 16 boards x 16 channels
    assert_eq!(DigitizerHit::make_channel_id(15, 15), 255);
  }

  #[test]
  fn baseline_negative_polarity() {
    let mut hit  = DigitizerHit::new();
    hit.baseline = 4*3000;
    hit.decode_baseline(PulsePolarity::Negative);
    assert_eq!(hit.baseline, 3000);
  }

  #[test]
  fn baseline_positive_polarity() {
    let mut hit  = DigitizerHit::new();
    // firmware reports -4*baseline as int16
    hit.baseline = (-(4*3000i16)) as u16;
    hit.decode_baseline(PulsePolarity::Positive);
    assert_eq!(hit.baseline, 3000);
  }

  #[test]
  fn serialize_hit_with_waveform() {
    let mut hit      = DigitizerHit::new();
    hit.time         = Time::from_hardware(123456, 0x0001_0042);
    hit.charge_short = 17;
    hit.charge_long  = 42;
    hit.baseline     = 2000;
    hit.channel      = 0x21;
    hit.waveform     = vec![1,2,3,4,5];
    let stream = hit.to_bytestream();
    assert_eq!(stream.len(), DigitizerHit::SIZE + 10);
    let mut pos = 0usize;
    let test = DigitizerHit::from_bytestream(&stream, &mut pos).unwrap();
    assert_eq!(pos, stream.len());
    assert_eq!(test, hit);
  }

  #[test]
  fn truncated_stream_is_rejected() {
    let mut hit  = DigitizerHit::new();
    hit.waveform = vec![7;10];
    let mut stream = hit.to_bytestream();
    stream.truncate(stream.len() - 4);
    let result = DigitizerHit::from_bytestream(&stream, &mut 0);
    assert_eq!(result, Err(SerializationError::StreamTooShort));
  }

  #[test]
  fn serialize_hit_with_long_waveform() {
    let mut hit  = DigitizerHit::new();
    hit.waveform = (0..70000u32).map(|k| (k & 0xffff) as u16).collect();
    let stream   = hit.to_bytestream();
    assert_eq!(stream.len(), DigitizerHit::SIZE + 2*70000);
    let mut pos  = 0usize;
    let test     = DigitizerHit::from_bytestream(&stream, &mut pos).unwrap();
    assert_eq!(pos, stream.len());
    assert_eq!(test.get_nsamples(), 70000);
    assert_eq!(test, hit);
  }
}
