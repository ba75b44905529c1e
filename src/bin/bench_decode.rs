use anyhow::Result;
use std::time::Instant;

use pose_overlay::pose::synthetic::{standing_pose, SyntheticFrame};
use pose_overlay::pose::KeypointDecoder;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 481x481 入力 / 61x61 グリッド (ストライド 8)
    let mut frame = SyntheticFrame::new(481, 481, 61, 61);
    for (k, (x, y, c)) in standing_pose(481, 481, 0.0).into_iter().enumerate() {
        frame.place(k, x, y, c)?;
    }
    let decoder = KeypointDecoder::new(481, 481);

    // デコードのみを1000フレーム計測
    let start = Instant::now();
    let iterations = 1000;
    let mut confidence = 0.0;
    let mut valid = 0;
    for _ in 0..iterations {
        let pose = decoder.decode(frame.heatmaps(), frame.offsets(), 1280, 720)?;
        confidence += pose.average_confidence();
        valid = pose.valid_count(0.3);
    }
    let elapsed = start.elapsed();

    let avg_us = elapsed.as_micros() as f64 / iterations as f64;

    println!("Decode 61x61x17: {:.1}us/frame ({} joints >= 0.3)", avg_us, valid);
    log::debug!("Average confidence: {:.3}", confidence / iterations as f32);

    Ok(())
}
