use anyhow::Result;
use std::time::Instant;

use pose_overlay::config::Config;
use pose_overlay::pipeline::PosePipeline;
use pose_overlay::pose::synthetic::{standing_pose, SyntheticFrame};
use pose_overlay::render::MinifbRenderer;

const CONFIG_PATH: &str = "config.toml";

/// 表示フレームサイズ
const FRAME_WIDTH: u32 = 640;
const FRAME_HEIGHT: u32 = 480;

/// ヒートマップグリッドサイズ
const GRID_SIZE: usize = 61;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load_or_default(CONFIG_PATH);

    println!("Pose Viewer (synthetic)");
    println!("Press ESC to exit");
    println!(
        "Model input: {}x{}, min confidence: {:.2}",
        config.model.input_width, config.model.input_height, config.pose.min_confidence
    );

    let mut pipeline = PosePipeline::from_config(&config)?;
    let mut frame = SyntheticFrame::new(
        config.model.input_width,
        config.model.input_height,
        GRID_SIZE,
        GRID_SIZE,
    );

    let mut renderer = MinifbRenderer::new("Pose Viewer", FRAME_WIDTH as usize, FRAME_HEIGHT as usize)?;

    // FPS計測用
    let mut frame_count = 0u32;
    let mut fps_timer = Instant::now();
    let start = Instant::now();

    // メインループ
    while renderer.is_open() {
        let t = start.elapsed().as_secs_f32();

        // 合成ネットワーク出力を作る (腕を振る)
        frame.clear();
        let (input_width, input_height) = frame.input_size();
        for (k, (x, y, c)) in standing_pose(input_width, input_height, t.sin())
            .into_iter()
            .enumerate()
        {
            frame.place(k, x, y, c)?;
        }

        // 3フレームに1回は推論が間に合わなかった扱い
        let tensors = if frame_count % 3 == 2 {
            None
        } else {
            Some((frame.heatmaps(), frame.offsets()))
        };
        pipeline.process_frame(tensors, FRAME_WIDTH, FRAME_HEIGHT)?;

        // 描画
        renderer.clear();
        renderer.draw_skeleton(pipeline.skeleton());
        renderer.draw_joints(pipeline.joints());
        renderer.update()?;

        // FPS計算
        frame_count += 1;
        let elapsed = fps_timer.elapsed().as_secs_f32();
        if elapsed >= 1.0 {
            let fps = frame_count as f32 / elapsed;
            println!(
                "FPS: {:.1}, Avg confidence: {:.2}, Active joints: {}, Skipped: {}",
                fps,
                pipeline.pose().average_confidence(),
                pipeline.active_count(),
                pipeline.frames_skipped()
            );
            frame_count = 0;
            fps_timer = Instant::now();
        }
    }

    println!("Shutting down...");
    Ok(())
}
