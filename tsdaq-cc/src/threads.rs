pub mod window_builder;
pub mod window_sink;
pub mod digitizer_emulator;

pub use self::window_builder::window_builder;
pub use self::window_sink::window_sink;
pub use self::digitizer_emulator::digitizer_emulator;
