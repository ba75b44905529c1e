use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub pose: PoseConfig,
    #[serde(default)]
    pub skeleton: SkeletonConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// ONNXモデルのパス
    #[serde(default = "default_model_path")]
    pub path: String,
    /// モデル入力幅
    #[serde(default = "default_input_size")]
    pub input_width: u32,
    /// モデル入力高さ
    #[serde(default = "default_input_size")]
    pub input_height: u32,
    /// モデル入力テンソル名
    #[serde(default = "default_input_name")]
    pub input_name: String,
    /// ヒートマップ出力名 (シグモイド前のロジット)
    #[serde(default = "default_heatmap_output")]
    pub heatmap_output: String,
    /// 短距離オフセット出力名
    #[serde(default = "default_offsets_output")]
    pub offsets_output: String,
}

fn default_model_path() -> String { "models/posenet_resnet50.onnx".to_string() }
fn default_input_size() -> u32 { 480 }
fn default_input_name() -> String { "sub_2".to_string() }
fn default_heatmap_output() -> String { "float_heatmaps".to_string() }
fn default_offsets_output() -> String { "float_short_offsets".to_string() }

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            input_width: default_input_size(),
            input_height: default_input_size(),
            input_name: default_input_name(),
            heatmap_output: default_heatmap_output(),
            offsets_output: default_offsets_output(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PoseConfig {
    /// この信頼度以上のジョイントを表示
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    /// ジョイントの描画深度 (z)
    #[serde(default = "default_keypoint_depth")]
    pub keypoint_depth: f32,
}

fn default_min_confidence() -> f32 { 0.3 }
fn default_keypoint_depth() -> f32 { -1.0 }

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            keypoint_depth: default_keypoint_depth(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SkeletonConfig {
    /// 骨格線の太さ (全グループ共通)
    #[serde(default = "default_line_width")]
    pub line_width: f32,
    /// 顔 (RGB)
    #[serde(default = "default_face_color")]
    pub face_color: u32,
    /// 胴体 (RGB)
    #[serde(default = "default_torso_color")]
    pub torso_color: u32,
    /// 腕 (RGB)
    #[serde(default = "default_arm_color")]
    pub arm_color: u32,
    /// 脚 (RGB)
    #[serde(default = "default_leg_color")]
    pub leg_color: u32,
}

fn default_line_width() -> f32 { 5.0 }
fn default_face_color() -> u32 { 0xFF0000 }
fn default_torso_color() -> u32 { 0xFF00FF }
fn default_arm_color() -> u32 { 0x0000FF }
fn default_leg_color() -> u32 { 0x00FF00 }

impl Default for SkeletonConfig {
    fn default() -> Self {
        Self {
            line_width: default_line_width(),
            face_color: default_face_color(),
            torso_color: default_torso_color(),
            arm_color: default_arm_color(),
            leg_color: default_leg_color(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read {}", path.as_ref().display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("failed to parse config")?;
        Ok(config)
    }

    /// 読み込みに失敗したらデフォルト値
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("{:#}; using default config", e);
                Self::default()
            }
        }
    }
}
