use anyhow::{ensure, Result};

use crate::config::SkeletonConfig;
use crate::pose::{Joint, KeypointIndex};

/// 骨格線の色分けグループ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoneGroup {
    Face,
    Torso,
    Arm,
    Leg,
}

/// 骨格の接続定義 (開始キーポイント, 終了キーポイント, グループ)
pub const SKELETON_TOPOLOGY: [(KeypointIndex, KeypointIndex, BoneGroup); 18] = [
    // 顔
    (KeypointIndex::Nose, KeypointIndex::LeftEye, BoneGroup::Face),
    (KeypointIndex::Nose, KeypointIndex::RightEye, BoneGroup::Face),
    (KeypointIndex::LeftEye, KeypointIndex::LeftEar, BoneGroup::Face),
    (KeypointIndex::RightEye, KeypointIndex::RightEar, BoneGroup::Face),
    // 胴体 (肩と腰のクロスを含む)
    (KeypointIndex::LeftShoulder, KeypointIndex::RightShoulder, BoneGroup::Torso),
    (KeypointIndex::LeftShoulder, KeypointIndex::LeftHip, BoneGroup::Torso),
    (KeypointIndex::RightShoulder, KeypointIndex::RightHip, BoneGroup::Torso),
    (KeypointIndex::LeftShoulder, KeypointIndex::RightHip, BoneGroup::Torso),
    (KeypointIndex::RightShoulder, KeypointIndex::LeftHip, BoneGroup::Torso),
    (KeypointIndex::LeftHip, KeypointIndex::RightHip, BoneGroup::Torso),
    // 腕
    (KeypointIndex::LeftShoulder, KeypointIndex::LeftElbow, BoneGroup::Arm),
    (KeypointIndex::LeftElbow, KeypointIndex::LeftWrist, BoneGroup::Arm),
    (KeypointIndex::RightShoulder, KeypointIndex::RightElbow, BoneGroup::Arm),
    (KeypointIndex::RightElbow, KeypointIndex::RightWrist, BoneGroup::Arm),
    // 脚
    (KeypointIndex::LeftHip, KeypointIndex::LeftKnee, BoneGroup::Leg),
    (KeypointIndex::LeftKnee, KeypointIndex::LeftAnkle, BoneGroup::Leg),
    (KeypointIndex::RightHip, KeypointIndex::RightKnee, BoneGroup::Leg),
    (KeypointIndex::RightKnee, KeypointIndex::RightAnkle, BoneGroup::Leg),
];

/// キーポイントの色 (RGB)
pub const KEYPOINT_COLOR: u32 = 0x00FF00; // 緑

/// 骨格を構成する1本のボーン
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BonePair {
    pub start: usize,
    pub end: usize,
    pub width: f32,
    pub group: BoneGroup,
}

impl BonePair {
    pub fn new(start: usize, end: usize, width: f32, group: BoneGroup) -> Self {
        Self {
            start,
            end,
            width,
            group,
        }
    }
}

/// 標準トポロジーのボーン一覧
pub fn default_bone_pairs(line_width: f32) -> Vec<BonePair> {
    SKELETON_TOPOLOGY
        .iter()
        .map(|&(start, end, group)| BonePair::new(start as usize, end as usize, line_width, group))
        .collect()
}

/// グループごとの線の色 (RGB)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupColors {
    pub face: u32,
    pub torso: u32,
    pub arm: u32,
    pub leg: u32,
}

impl GroupColors {
    pub fn from_config(config: &SkeletonConfig) -> Self {
        Self {
            face: config.face_color,
            torso: config.torso_color,
            arm: config.arm_color,
            leg: config.leg_color,
        }
    }

    pub fn color(&self, group: BoneGroup) -> u32 {
        match group {
            BoneGroup::Face => self.face,
            BoneGroup::Torso => self.torso,
            BoneGroup::Arm => self.arm,
            BoneGroup::Leg => self.leg,
        }
    }
}

impl Default for GroupColors {
    fn default() -> Self {
        Self::from_config(&SkeletonConfig::default())
    }
}

/// ボーン1本分の描画プリミティブ
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    pub start: [f32; 3],
    pub end: [f32; 3],
    pub width: f32,
    pub color: u32,
    pub visible: bool,
}

/// ボーンごとの線分を保持し、毎フレームのジョイント状態で更新する
#[derive(Debug, Clone)]
pub struct SkeletonRenderer {
    bones: Vec<BonePair>,
    segments: Vec<LineSegment>,
}

impl SkeletonRenderer {
    /// ボーン1本につき線分を1つ確保する。以後トポロジーは変更しない
    pub fn initialize(bones: &[BonePair], colors: GroupColors) -> Result<Self> {
        for (i, bone) in bones.iter().enumerate() {
            ensure!(
                bone.start < KeypointIndex::COUNT && bone.end < KeypointIndex::COUNT,
                "bone {} ({} -> {}) references a keypoint outside 0..{}",
                i,
                bone.start,
                bone.end,
                KeypointIndex::COUNT
            );
        }

        let segments = bones
            .iter()
            .map(|bone| LineSegment {
                start: [0.0; 3],
                end: [0.0; 3],
                width: bone.width,
                color: colors.color(bone.group),
                visible: false,
            })
            .collect();

        log::debug!("Skeleton initialized with {} bones", bones.len());

        Ok(Self {
            bones: bones.to_vec(),
            segments,
        })
    }

    /// 標準トポロジーで初期化
    pub fn from_config(config: &SkeletonConfig) -> Result<Self> {
        Self::initialize(
            &default_bone_pairs(config.line_width),
            GroupColors::from_config(config),
        )
    }

    /// 両端のジョイントが有効なボーンだけ表示し、端点を更新する
    ///
    /// 非表示にしたボーンの端点は前の値のまま。
    pub fn update(&mut self, joints: &[Joint; KeypointIndex::COUNT]) {
        for (bone, segment) in self.bones.iter().zip(self.segments.iter_mut()) {
            let start = &joints[bone.start];
            let end = &joints[bone.end];

            if start.active && end.active {
                segment.visible = true;
                segment.start = start.position;
                segment.end = end.position;
            } else {
                segment.visible = false;
            }
        }
    }

    pub fn bones(&self) -> &[BonePair] {
        &self.bones
    }

    pub fn segments(&self) -> &[LineSegment] {
        &self.segments
    }

    pub fn visible_count(&self) -> usize {
        self.segments.iter().filter(|s| s.visible).count()
    }
}
