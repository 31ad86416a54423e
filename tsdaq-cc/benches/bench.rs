use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tsdaq_dataclasses::events::{
  DigitizerHit,
  RawReadout,
};
use tsdaq_dataclasses::Time;
use tsdaq_lib::settings::WindowerSettings;

use tsdaq_cc::liveness::AlwaysResponding;
use tsdaq_cc::Windower;

/// 2 boards x 16 channels, one hit per channel
/// every 100us
fn make_readouts(n_readouts : usize) -> Vec<RawReadout> {
  let mut readouts = Vec::<RawReadout>::with_capacity(n_readouts);
  for k in 0..n_readouts {
    let mut readout = RawReadout::new();
    for board in 0..2u8 {
      let mut board_readout = Vec::<DigitizerHit>::new();
      for local in 0..16u8 {
        for n in 0..10 {
          let mut hit = DigitizerHit::new();
          hit.time    = Time::from_seconds((k*10 + n) as f64 * 1e-4 + local as f64 * 1e-6);
          hit.channel = DigitizerHit::make_channel_id(board, local);
          board_readout.push(hit);
        }
      }
      readout.push(board_readout);
    }
    readouts.push(readout);
  }
  readouts
}

fn bench_windowing(c: &mut Criterion) {
  let mut settings      = WindowerSettings::new();
  settings.interval_sec = 0.01;
  let readouts          = make_readouts(1000);
  c.bench_function("windowing 320k hits",
                   |b| b.iter(|| {
                     let mut windower = Windower::new(&settings, vec![0xffff, 0xffff], 0);
                     let mut n_windows = 0usize;
                     for readout in readouts.clone() {
                       windower.add_readout(readout).unwrap();
                       n_windows += windower.close_ready_windows(&AlwaysResponding).len();
                     }
                     black_box(windower.drain());
                     black_box(n_windows)
                   }));
}

criterion_group!(benches, bench_windowing);
criterion_main!(benches);
