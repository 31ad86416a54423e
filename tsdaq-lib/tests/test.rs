#[cfg(test)]
pub mod tests {

  use tsdaq_lib::settings::{
    DaqSettings,
    WindowerSettings,
  };
  use tsdaq_dataclasses::events::PulsePolarity;

  fn tmp_file(name : &str) -> String {
    let dir = std::env::temp_dir();
    String::from(dir.join(format!("tsdaq-lib-{}-{}", std::process::id(), name)).to_string_lossy())
  }

  #[test]
  fn write_config_file() {
    let mut settings = DaqSettings::new();
    settings.run_id  = 1234;
    settings.digitizer_channel_masks = vec![0xffff, 0x00ff, 0x0001];
    settings.windower_settings.pulse_polarity = PulsePolarity::Positive;
    settings.windower_settings.dead_time_sec  = Some(2.5);
    let fname = tmp_file("write-config.toml");
    settings.to_toml(fname.clone());
    let test  = DaqSettings::from_toml(fname.clone()).unwrap();
    assert_eq!(test, settings);
    let _ = std::fs::remove_file(fname);
  }

  #[test]
  fn write_config_file_json() {
    let settings = DaqSettings::new();
    let fname    = tmp_file("write-config.json");
    settings.to_json(fname.clone());
    let test     = DaqSettings::from_json(fname.clone()).unwrap();
    assert_eq!(test, settings);
    let _ = std::fs::remove_file(fname);
  }

  #[test]
  fn read_partial_windower_config() {
    let toml_string = "interval_sec = 0.25\npulse_polarity = \"Positive\"\nhb_send_interval = 5\nemit_empty_windows = true\n";
    let settings : WindowerSettings = toml::from_str(toml_string).unwrap();
    assert_eq!(settings.dead_time_sec, None);
    assert_eq!(settings.pulse_polarity, PulsePolarity::Positive);
    assert!((settings.get_dead_time().seconds() - 2.5).abs() < 1e-9);
  }

  #[test]
  fn missing_config_file_is_an_error() {
    assert!(DaqSettings::from_toml(tmp_file("does-not-exist.toml")).is_err());
  }
}
