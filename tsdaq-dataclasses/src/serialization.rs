//! Serialization/Deserialization helpers
//!
//! All numbers are little endian. Every serialized
//! struct is framed by a HEAD and a TAIL marker.

// re-exports
pub use crate::errors::SerializationError;

/// Convert a vector of u16 into a vector of u8
///
/// The resulting vector has twice the number
/// of entries of the original vector.
/// This is useful, when serializing data
/// represented as u16, e.g. the waveforms.
pub fn u16_to_u8(vec_u16: &[u16]) -> Vec<u8> {
  vec_u16.iter()
    .flat_map(|&n| n.to_le_bytes())
    .collect()
}

/// Restore a vector of u16 from a vector of u8
///
/// This interpretes two following u8 as an u16
/// Useful for deserialization of waveforms.
pub fn u8_to_u16(vec_u8: &[u8]) -> Vec<u16> {
  vec_u8.chunks_exact(2)
    .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
    .collect()
}

pub fn parse_u8(bs : &Vec::<u8>, pos : &mut usize) -> u8 {
  let value = bs[*pos];
  *pos += 1;
  value
}

/// Get u16 from a bytestream and move on the position marker
///
/// # Arguments
///
/// * bs
/// * pos
pub fn parse_u16(bs : &Vec::<u8>, pos : &mut usize) -> u16 {
  let value = u16::from_le_bytes([bs[*pos], bs[*pos+1]]);
  *pos += 2;
  value
}

pub fn parse_u32(bs : &Vec::<u8>, pos : &mut usize) -> u32 {
  let value = u32::from_le_bytes([bs[*pos], bs[*pos+1], bs[*pos+2], bs[*pos+3]]);
  *pos += 4;
  value
}

pub fn parse_u64(bs : &Vec::<u8>, pos : &mut usize) -> u64 {
  let value = u64::from_le_bytes([bs[*pos],   bs[*pos+1], bs[*pos+2], bs[*pos+3],
                                  bs[*pos+4], bs[*pos+5], bs[*pos+6], bs[*pos+7]]);
  *pos += 8;
  value
}

/// Encode/decode structs to Vec::<u8> to write to a file or
/// send over the network
///
pub trait Serialization {

  const HEAD: u16;
  const TAIL: u16;
  /// The SIZE is the size of the serialized
  /// bytestream INCLUDING 4 bytes for head
  /// and tail bytes. For structs without a
  /// fixed size, this is the minimum size.
  const SIZE: usize = 0;

  /// Verify that the serialized representation of the struct has the
  /// correct size, including header + footer.
  ///
  /// Only meaningful for structs with a fixed size. On success,
  /// pos points right after the header.
  fn verify_fixed(stream : &Vec<u8>,
                  pos    : &mut usize) -> Result<(), SerializationError> {
    let head_pos = search_for_u16(Self::HEAD, stream, *pos)?;
    let tail_pos = search_for_u16(Self::TAIL, stream, head_pos + Self::SIZE-2)?;
    if tail_pos + 2 - head_pos != Self::SIZE {
      error!("Seing {} bytes, but expecting {}", tail_pos + 2 - head_pos, Self::SIZE);
      *pos = head_pos + 2;
      return Err(SerializationError::WrongByteSize);
    }
    *pos = head_pos + 2;
    Ok(())
  }

  /// Decode a serializable from a bytestream
  fn from_bytestream(bytestream : &Vec<u8>,
                     pos        : &mut usize)
    -> Result<Self, SerializationError>
    where Self : Sized;

  /// Encode a serializable to a bytestream
  fn to_bytestream(&self) -> Vec<u8>;
}

/// Search for a certain number of type `u16` in a bytestream
pub fn search_for_u16(number : u16, bytestream : &Vec<u8>, start_pos : usize)
  -> Result<usize, SerializationError> {
  if bytestream.len() < 2 {
    error!("Stream empty!");
    return Err(SerializationError::StreamTooShort);
  }
  if start_pos > bytestream.len() - 2 {
    error!("Start position {} beyond stream capacity {}!", start_pos, bytestream.len() -2);
    return Err(SerializationError::StreamTooShort);
  }
  for n in start_pos..bytestream.len() - 1 {
    if u16::from_le_bytes([bytestream[n], bytestream[n + 1]]) == number {
      trace!("Found {number} at {n}");
      return Ok(n);
    }
  }
  let delta = bytestream.len() - start_pos;
  warn!("Can not find {} in bytestream [-{}:{}]!", number, delta ,bytestream.len());
  Err(SerializationError::ValueNotFound)
}
