//! Binary to connect to a Sensocto server, register a demo sensor, and
//! stream a few seconds of synthetic measurements for inspecting the
//! batching pipeline live.
//!
//! # Usage
//!
//! ```sh
//! export SENSOCTO_SERVER_URL="https://your-server.com"
//! export SENSOCTO_BEARER_TOKEN="your-token"   # optional
//! cargo run --bin sensor_check --features cli
//! ```

use std::env;
use std::time::Duration;

use sensocto_rs::{SensoctoClient, SensoctoConfig, SensorConfig};
use tokio::time;

#[tokio::main]
async fn main() -> sensocto_rs::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let server_url =
        env::var("SENSOCTO_SERVER_URL").expect("set SENSOCTO_SERVER_URL env var before running");

    let mut config = SensoctoConfig::new(server_url).with_connector_name("sensor_check");
    if let Ok(token) = env::var("SENSOCTO_BEARER_TOKEN") {
        config = config.with_bearer_token(token);
    }

    let client = SensoctoClient::from_config(config);
    println!("Connecting to Sensocto…");
    client.connect().await?;

    let sensor = client
        .register_sensor(
            SensorConfig::new("Demo Sine Wave")
                .with_sensor_type("waveform")
                .with_attributes(vec!["amplitude".into()])
                .with_sampling_rate(10),
        )
        .await?;
    println!("Registered sensor {}", sensor.sensor_id());

    sensor.on_backpressure(|config| {
        println!(
            "Backpressure: level={} window={}ms batch_size={}",
            config.attention_level, config.batch_window_ms, config.batch_size
        );
    });

    println!("Streaming measurements for 10 seconds…\n");
    let mut ticker = time::interval(Duration::from_millis(100));
    for i in 0..100u32 {
        ticker.tick().await;
        let amplitude = (f64::from(i) / 10.0).sin();
        sensor
            .add_to_batch("amplitude", serde_json::json!({ "value": amplitude }), None)
            .await?;
    }

    sensor.close().await?;
    client.disconnect().await?;
    println!("Done.");

    Ok(())
}
