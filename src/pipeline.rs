use anyhow::Result;
use ndarray::ArrayView4;

use crate::config::Config;
use crate::pose::{ActivationGate, Joint, KeypointDecoder, KeypointIndex, Pose};
use crate::render::SkeletonRenderer;

/// 1フレーム分のネットワーク出力 (ヒートマップ, オフセット)
pub type FrameTensors<'a> = (ArrayView4<'a, f32>, ArrayView4<'a, f32>);

/// デコード → ゲート → スケルトン更新をフレームごとに順番に実行する
pub struct PosePipeline {
    decoder: KeypointDecoder,
    gate: ActivationGate,
    joints: [Joint; KeypointIndex::COUNT],
    skeleton: SkeletonRenderer,
    pose: Pose,
    frames_processed: u64,
    frames_skipped: u64,
}

impl PosePipeline {
    pub fn new(decoder: KeypointDecoder, gate: ActivationGate, skeleton: SkeletonRenderer) -> Self {
        Self {
            decoder,
            gate,
            joints: [Joint::default(); KeypointIndex::COUNT],
            skeleton,
            pose: Pose::default(),
            frames_processed: 0,
            frames_skipped: 0,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let skeleton = SkeletonRenderer::from_config(&config.skeleton)?;
        log::info!(
            "Pose pipeline: input {}x{}, min confidence {:.2}, {} bones",
            config.model.input_width,
            config.model.input_height,
            config.pose.min_confidence,
            skeleton.bones().len()
        );

        Ok(Self::new(
            KeypointDecoder::from_config(&config.model),
            ActivationGate::from_config(&config.pose),
            skeleton,
        ))
    }

    /// 1フレーム処理する
    ///
    /// テンソルが無い (推論が間に合っていない) フレームはスキップし、前フレームの状態を残す。
    /// 処理した場合は true。形状エラーは状態を変えずにそのまま返す。
    pub fn process_frame(
        &mut self,
        tensors: Option<FrameTensors<'_>>,
        frame_width: u32,
        frame_height: u32,
    ) -> Result<bool> {
        let Some((heatmaps, offsets)) = tensors else {
            self.frames_skipped += 1;
            log::debug!("No network output for this frame; keeping previous skeleton");
            return Ok(false);
        };

        let pose = self
            .decoder
            .decode(heatmaps, offsets, frame_width, frame_height)?;

        self.gate.apply(&pose, &mut self.joints);
        self.skeleton.update(&self.joints);
        self.pose = pose;
        self.frames_processed += 1;

        log::trace!(
            "Frame {}: {} joints active, {} bones visible",
            self.frames_processed,
            self.active_count(),
            self.skeleton.visible_count()
        );

        Ok(true)
    }

    /// 直近にデコードした姿勢
    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    pub fn joints(&self) -> &[Joint; KeypointIndex::COUNT] {
        &self.joints
    }

    pub fn skeleton(&self) -> &SkeletonRenderer {
        &self.skeleton
    }

    pub fn active_count(&self) -> usize {
        self.joints.iter().filter(|j| j.active).count()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped
    }
}
