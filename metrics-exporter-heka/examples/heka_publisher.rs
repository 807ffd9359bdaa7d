use std::{collections::HashMap, thread, time::Duration};

use metrics_exporter_heka::{ConfigValue, HekaPublisher, Metric, Namespace, JSON_CONTENT_TYPE};

fn main() {
    tracing_subscriber::fmt::init();

    let config = HashMap::from([
        ("host".to_string(), ConfigValue::from("127.0.0.1")),
        ("port".to_string(), ConfigValue::Int(5565)),
    ]);
    let publisher = HekaPublisher::new();

    // Publish a small batch every second, the way a collection host would.
    let mut iteration = 0u64;
    loop {
        let batch = vec![
            Metric::new(Namespace::from_static(["intel", "psutil", "load", "load1"]), 0.42),
            Metric::new(
                Namespace::from_static(["intel", "procfs", "cpu"]).push_dynamic("cpu_id", "0").push_static("idle"),
                iteration,
            )
            .with_tag("plugin_running_on", "demo-host"),
        ];
        let content = serde_json::to_vec(&batch).expect("failed to encode batch");

        match publisher.publish(JSON_CONTENT_TYPE, &content, &config) {
            Ok(report) => println!("sent {} messages, dropped {}", report.messages_sent(), report.metrics_dropped()),
            Err(e) => eprintln!("failed to publish: {e}"),
        }

        iteration += 1;
        thread::sleep(Duration::from_secs(1));
    }
}
