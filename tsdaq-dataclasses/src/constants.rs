//! Hardware related constants
//!
//! The digitizers are CAEN boards running DPP-PSD
//! firmware. Timing values follow the "Channel
//! aggregate data format" of that firmware.

/// Length of a coarse tick in seconds (sampling period)
pub const COARSE_TICK_SEC      : f64   = 2e-9;

/// Number of bits reserved for the fine time
pub const FINE_TIME_BITS       : u32   = 10;

/// Mask to extract the fine time from a
/// packed timestamp
pub const FINE_TIME_MASK       : u64   = 0x3ff;

/// Number of fine time units per coarse tick
pub const FINE_TIME_PER_TICK   : f64   = 1024.0;

/// The trigger time tag occupies the lower 31 bits,
/// the extended time stamp from the extras word
/// is placed right above it
pub const TRIGGER_TAG_BITS     : u32   = 31;

/// Mask for the extended timestamp bits in the
/// extras word (bits 16-31)
pub const EXTRAS_EXTENDED_MASK : u32   = 0xffff_0000;

/// Mask for the fine timestamp bits in the
/// extras word (bits 0-9)
pub const EXTRAS_FINE_MASK     : u32   = 0x3ff;

/// Channels per digitizer board
pub const NCHN_PER_BOARD       : u8    = 16;

/// Number of digitizer boards which can be
/// addressed with the 8bit channel id
pub const MAX_BOARDS           : usize = 16;

/// Total number of logical channels
pub const MAX_CHANNELS         : usize = 256;

/// Default length of a time window in seconds
pub const DEFAULT_INTERVAL_SEC : f64   = 0.1;

/// Default dead time is this many intervals
pub const DEFAULT_DEAD_TIME_INTERVALS : u64 = 10;

/// Suffix for files with serialized time windows
pub const WINDOW_FILE_SUFFIX   : &str  = "tsw";
