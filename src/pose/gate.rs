use crate::config::PoseConfig;

use super::keypoint::{KeypointIndex, Pose};

/// 表示側に渡すジョイント状態
///
/// フレームごとに上書きされるだけで、破棄はしない。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Joint {
    /// 位置 (x, y, z)。z は固定の描画深度
    pub position: [f32; 3],
    pub confidence: f32,
    pub active: bool,
}

impl Default for Joint {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            confidence: 0.0,
            active: false,
        }
    }
}

/// 信頼度によるジョイントの有効/無効判定
#[derive(Debug, Clone, Copy)]
pub struct ActivationGate {
    min_confidence: f32,
    depth: f32,
}

impl ActivationGate {
    pub fn new(min_confidence: f32, depth: f32) -> Self {
        Self {
            min_confidence,
            depth,
        }
    }

    pub fn from_config(config: &PoseConfig) -> Self {
        Self::new(config.min_confidence, config.keypoint_depth)
    }

    /// デコード結果をジョイントへ反映
    ///
    /// 位置は無効なジョイントでも毎フレーム更新する。
    pub fn apply(&self, pose: &Pose, joints: &mut [Joint; KeypointIndex::COUNT]) {
        for (joint, kp) in joints.iter_mut().zip(pose.keypoints.iter()) {
            joint.position = [kp.x, kp.y, self.depth];
            joint.confidence = kp.confidence;
            joint.active = kp.is_valid(self.min_confidence);
        }
    }
}

impl Default for ActivationGate {
    fn default() -> Self {
        Self::from_config(&PoseConfig::default())
    }
}
