//! Simulate a short session and print the summary

use posture_flux::{replay_to_summary, TrackerConfig};

fn main() {
    // One frame per second: 3s good, 4s looking away, 3s good
    let frames = [
        "good_posture",
        "good_posture",
        "good_posture",
        "looking_away",
        "looking_away",
        "looking_away",
        "looking_away",
        "good_posture",
        "good_posture",
        "good_posture",
    ];

    let ndjson: Vec<String> = frames
        .iter()
        .enumerate()
        .map(|(i, top)| {
            let other = if *top == "good_posture" { "looking_away" } else { "good_posture" };
            format!(
                r#"{{"timestamp": {}, "predictions": [{{"className": "{top}", "probability": 0.85}}, {{"className": "{other}", "probability": 0.1}}, {{"className": "looking_down", "probability": 0.05}}]}}"#,
                i as i64 * 1_000
            )
        })
        .collect();

    let config = TrackerConfig::default().with_history_size(3);
    match replay_to_summary(&ndjson.join("\n"), config) {
        Ok(summary) => println!("{summary}"),
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
