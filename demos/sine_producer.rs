//! Synthetic producer - streams a sine wave into a hub
//!
//! Run with: cargo run --example sine_producer -- [addr] [stream] [password]
//!
//! Useful for exercising a running hub without real sensor hardware:
//! opens one 50 Hz, 16-bit, single-channel stream and pushes a frame of
//! five samples every 100 ms until interrupted.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use samplecast::client::Producer;
use samplecast::protocol::{SensorKind, StreamInfo, Unit};

const FREQUENCY: u32 = 50;
const SAMPLES_PER_FRAME: usize = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8090".to_owned());
    let name = std::env::args().nth(2).unwrap_or_else(|| "temp1".to_owned());
    let password = std::env::args().nth(3).unwrap_or_else(|| "x".to_owned());

    let base_timestamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_micros() as u64;
    let info = StreamInfo {
        name: name.clone(),
        description: "synthetic sine wave".into(),
        sensor: SensorKind::Temperature as u8,
        hardware: "sine_producer".into(),
        unit: Unit::Celsius as u8,
        channel_descriptions: vec!["sine".into()],
        channels: 1,
        frequency: FREQUENCY,
        bits: 16,
        zero_offsets: vec![0],
        scale: 0.01,
        timestamp: base_timestamp,
        zoom: 1.0,
    };

    println!("Streaming '{}' to {} (Ctrl+C to stop)", name, addr);

    let mut producer = Producer::connect(&addr).await?;
    producer.open_stream(1, &password, info).await?;

    let mut sent: u64 = 0;
    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let samples: Vec<i32> = (0..SAMPLES_PER_FRAME)
                    .map(|i| {
                        let t = (sent + i as u64) as f64 / FREQUENCY as f64;
                        (2000.0 * (t * std::f64::consts::TAU).sin()) as i32
                    })
                    .collect();
                producer.write_frame(1, vec![samples]).await?;
                sent += SAMPLES_PER_FRAME as u64;

                if sent % (FREQUENCY as u64 * 10) == 0 {
                    println!("{} samples sent", sent);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nClosing stream after {} samples", sent);
                producer.close_stream(1).await?;
                break;
            }
        }
    }

    Ok(())
}
