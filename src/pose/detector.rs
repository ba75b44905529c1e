use anyhow::{ensure, Context, Result};
use ndarray::{Array4, ArrayView4, Ix4};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

use crate::config::ModelConfig;

/// ネットワーク出力 (ヒートマップはシグモイド適用済み)
#[derive(Debug, Clone)]
pub struct NetworkOutput {
    /// [1, H, W, 17]
    pub heatmaps: Array4<f32>,
    /// [1, H, W, 34]
    pub offsets: Array4<f32>,
}

impl NetworkOutput {
    pub fn views(&self) -> (ArrayView4<'_, f32>, ArrayView4<'_, f32>) {
        (self.heatmaps.view(), self.offsets.view())
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// PoseNet 系 ONNX モデルの推論セッション
pub struct PoseNetSession {
    session: Session,
    input_name: String,
    heatmap_output: String,
    offsets_output: String,
    input_width: u32,
    input_height: u32,
}

impl PoseNetSession {
    /// ONNXモデルを読み込んで初期化
    pub fn new<P: AsRef<Path>>(model_path: P, config: &ModelConfig) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path.as_ref())
            .with_context(|| format!("Failed to load ONNX model: {}", model_path.as_ref().display()))?;

        log::info!(
            "Loaded pose model {} ({}x{})",
            model_path.as_ref().display(),
            config.input_width,
            config.input_height
        );

        Ok(Self {
            session,
            input_name: config.input_name.clone(),
            heatmap_output: config.heatmap_output.clone(),
            offsets_output: config.offsets_output.clone(),
            input_width: config.input_width,
            input_height: config.input_height,
        })
    }

    /// 前処理済みテンソルから推論
    ///
    /// 入力: [1, input_height, input_width, 3] の f32 テンソル (前処理は呼び出し側)
    /// 出力: ヒートマップ (シグモイド適用) と短距離オフセット
    pub fn run(&mut self, input: Array4<f32>) -> Result<NetworkOutput> {
        let expected = (1, self.input_height as usize, self.input_width as usize, 3);
        ensure!(
            input.dim() == expected,
            "input tensor shape {:?} does not match model input {:?}",
            input.dim(),
            expected
        );

        let input_tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .context("Inference failed")?;

        // ヒートマップはロジットで出てくるのでシグモイドをかける
        let logits: ndarray::ArrayViewD<f32> = outputs
            .get(self.heatmap_output.as_str())
            .with_context(|| format!("Model has no output named '{}'", self.heatmap_output))?
            .try_extract_array()
            .context("Failed to extract heatmap tensor")?;
        let heatmaps = logits
            .mapv(sigmoid)
            .into_dimensionality::<Ix4>()
            .context("Heatmap tensor is not 4-D")?;

        let offsets: ndarray::ArrayViewD<f32> = outputs
            .get(self.offsets_output.as_str())
            .with_context(|| format!("Model has no output named '{}'", self.offsets_output))?
            .try_extract_array()
            .context("Failed to extract offsets tensor")?;
        let offsets = offsets
            .to_owned()
            .into_dimensionality::<Ix4>()
            .context("Offsets tensor is not 4-D")?;

        Ok(NetworkOutput { heatmaps, offsets })
    }
}
