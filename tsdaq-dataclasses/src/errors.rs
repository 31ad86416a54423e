use std::error::Error;
use std::fmt;

/// Indicate issues with (de)serialization
#[derive(Debug, Copy, Clone, PartialEq)]
#[repr(u8)]
pub enum SerializationError {
  TailInvalid,
  HeadInvalid,
  StreamTooShort,
  ValueNotFound,
  WrongByteSize,
  JsonDecodingError,
  TomlDecodingError,
  IOError,
}

impl SerializationError {
  pub fn to_string(&self) -> String {
    match self {
      SerializationError::TailInvalid       => String::from("TailInvalid"),
      SerializationError::HeadInvalid       => String::from("HeadInvalid"),
      SerializationError::StreamTooShort    => String::from("StreamTooShort"),
      SerializationError::ValueNotFound     => String::from("ValueNotFound"),
      SerializationError::WrongByteSize     => String::from("WrongByteSize"),
      SerializationError::JsonDecodingError => String::from("JsonDecodingError"),
      SerializationError::TomlDecodingError => String::from("TomlDecodingError"),
      SerializationError::IOError           => String::from("IOError"),
    }
  }
}

impl fmt::Display for SerializationError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let repr = self.to_string();
    write!(f, "<SerializationError : {}>", repr)
  }
}

impl Error for SerializationError {
}

impl From<std::io::Error> for SerializationError {
  fn from(err : std::io::Error) -> Self {
    error!("IO error during (de)serialization! {err}");
    SerializationError::IOError
  }
}
