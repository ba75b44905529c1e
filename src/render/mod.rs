pub mod skeleton;
#[cfg(feature = "desktop")]
pub mod window;

pub use skeleton::{
    default_bone_pairs, BoneGroup, BonePair, GroupColors, LineSegment, SkeletonRenderer,
    SKELETON_TOPOLOGY,
};
#[cfg(feature = "desktop")]
pub use window::MinifbRenderer;
