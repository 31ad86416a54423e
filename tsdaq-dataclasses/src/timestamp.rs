//! Fixed point hardware time
//!
//! The digitizers provide time in units of their
//! sampling period (2 ns, the "coarse" time) plus
//! a 10 bit interpolated fraction of a tick (the
//! "fine" time). Both are packed into a single u64:
//!
//! ```text
//!  63                    10 9        0
//! [ coarse ticks (54 bit) | fine (10)]
//! ```
//!
//! which gives a resolution of 2ns/1024 ~ 1/512 ns.
//! The CAEN timestamp range is 57 bits in this format.
//!
//! Since every `Time` shares the same fixed point
//! basis, arithmetic works directly on the packed
//! value. All arithmetic wraps like the hardware
//! register would, values outside of the range of
//! the format are silently truncated.

use std::fmt;
use std::ops::{
  Add,
  AddAssign,
  Sub,
  SubAssign,
  Mul,
  MulAssign,
  Div,
  DivAssign,
};
use std::time::Duration;

use crate::constants::{
  COARSE_TICK_SEC,
  FINE_TIME_BITS,
  FINE_TIME_MASK,
  FINE_TIME_PER_TICK,
  TRIGGER_TAG_BITS,
  EXTRAS_EXTENDED_MASK,
  EXTRAS_FINE_MASK,
};

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(u64);

impl Time {

  pub const ZERO : Time = Time(0);
  pub const MAX  : Time = Time(u64::MAX);

  pub fn new() -> Self {
    Self::ZERO
  }

  /// Convert a time in seconds to the fixed point
  /// representation.
  ///
  /// The coarse part is truncated to full ticks, the
  /// remainder is expressed in 1/1024 of a tick. Negative
  /// or NaN values end up as zero, values beyond the
  /// 54 bit coarse range wrap.
  pub fn from_seconds(seconds : f64) -> Self {
    let ticks  = seconds / COARSE_TICK_SEC;
    let coarse = ticks as u64;
    let fine   = ((ticks - ticks.trunc()) * FINE_TIME_PER_TICK) as u64 & FINE_TIME_MASK;
    Self(coarse.wrapping_shl(FINE_TIME_BITS) | fine)
  }

  /// Reconstruct the time from the raw digitizer words
  ///
  /// See "Channel aggregate data format" in the DPP-PSD
  /// documentation.
  ///
  /// # Arguments:
  ///
  /// * tag    : trigger time tag (31 bit)
  /// * extras : bits 16-31 extended time stamp,
  ///            bits 0-9 fine time stamp
  pub fn from_hardware(tag : u32, extras : u32) -> Self {
    let mut time = (extras & EXTRAS_EXTENDED_MASK) as u64;
    time <<= TRIGGER_TAG_BITS - 16;
    time  |= tag as u64;
    time <<= FINE_TIME_BITS;
    time  |= (extras & EXTRAS_FINE_MASK) as u64;
    Self(time)
  }

  /// Construct directly from a packed value
  pub fn from_bits(bits : u64) -> Self {
    Self(bits)
  }

  /// The packed representation
  pub fn bits(&self) -> u64 {
    self.0
  }

  /// Number of full 2ns ticks
  pub fn coarse(&self) -> u64 {
    self.0 >> FINE_TIME_BITS
  }

  /// Fraction of a tick in units of 1/1024
  pub fn fine(&self) -> u16 {
    (self.0 & FINE_TIME_MASK) as u16
  }

  /// Convert back to seconds
  ///
  /// f64 holds 53 bits of mantissa, so the last few bits
  /// of very large timestamps are lost. This is meant for
  /// logging and configuration only, never compare times
  /// in this representation.
  pub fn seconds(&self) -> f64 {
    (self.coarse() as f64 + self.fine() as f64 / FINE_TIME_PER_TICK) * COARSE_TICK_SEC
  }

  /// Wall clock duration of the same length
  pub fn as_duration(&self) -> Duration {
    Duration::from_secs_f64(self.seconds())
  }

  /// Difference which stops at zero instead of wrapping
  pub fn saturating_sub(self, other : Time) -> Time {
    Self(self.0.saturating_sub(other.0))
  }

  /// Round down to a multiple of `interval`
  pub fn floor_to(self, interval : Time) -> Time {
    if interval.0 == 0 {
      return self;
    }
    Self(self.0 - self.0 % interval.0)
  }
}

impl From<f64> for Time {
  fn from(seconds : f64) -> Self {
    Self::from_seconds(seconds)
  }
}

impl fmt::Display for Time {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "<Time : {:.12} s ({} ticks + {}/1024)>",
           self.seconds(),
           self.coarse(),
           self.fine())
  }
}

impl Add for Time {
  type Output = Time;
  fn add(self, other : Time) -> Time {
    Self(self.0.wrapping_add(other.0))
  }
}

impl AddAssign for Time {
  fn add_assign(&mut self, other : Time) {
    self.0 = self.0.wrapping_add(other.0);
  }
}

impl Sub for Time {
  type Output = Time;
  fn sub(self, other : Time) -> Time {
    Self(self.0.wrapping_sub(other.0))
  }
}

impl SubAssign for Time {
  fn sub_assign(&mut self, other : Time) {
    self.0 = self.0.wrapping_sub(other.0);
  }
}

impl Mul<u64> for Time {
  type Output = Time;
  fn mul(self, factor : u64) -> Time {
    Self(self.0.wrapping_mul(factor))
  }
}

impl Mul<Time> for u64 {
  type Output = Time;
  fn mul(self, time : Time) -> Time {
    time * self
  }
}

impl MulAssign<u64> for Time {
  fn mul_assign(&mut self, factor : u64) {
    self.0 = self.0.wrapping_mul(factor);
  }
}

/// Scaling with a real factor truncates towards zero
impl Mul<f64> for Time {
  type Output = Time;
  fn mul(self, factor : f64) -> Time {
    Self((self.0 as f64 * factor) as u64)
  }
}

impl Mul<Time> for f64 {
  type Output = Time;
  fn mul(self, time : Time) -> Time {
    time * self
  }
}

/// Panics for a divisor of 0, as integer division does
impl Div<u64> for Time {
  type Output = Time;
  fn div(self, divisor : u64) -> Time {
    Self(self.0 / divisor)
  }
}

impl DivAssign<u64> for Time {
  fn div_assign(&mut self, divisor : u64) {
    self.0 /= divisor;
  }
}

impl Div<f64> for Time {
  type Output = Time;
  fn div(self, divisor : f64) -> Time {
    Self((self.0 as f64 / divisor) as u64)
  }
}

#[cfg(feature = "random")]
impl crate::FromRandom for Time {
  fn from_random() -> Self {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    // stay within the 57 bit of the hardware
    Self(rng.gen::<u64>() >> 7)
  }
}
