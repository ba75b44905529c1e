//! 合成ヒートマップ/オフセットテンソル
//!
//! モデルなしでデコーダとスケルトン描画を動かすためのもの。
//! テスト、ベンチマーク、ビューアのデモで使う。

use anyhow::Result;
use ndarray::{Array4, ArrayView4};

use super::decoder::output_stride;
use super::keypoint::KeypointIndex;

/// 1フレーム分の合成ネットワーク出力
#[derive(Debug, Clone)]
pub struct SyntheticFrame {
    input_width: u32,
    input_height: u32,
    heatmaps: Array4<f32>,
    offsets: Array4<f32>,
}

impl SyntheticFrame {
    /// 全て 0 のヒートマップ [1, H, W, 17] とオフセット [1, H, W, 34] を作成
    pub fn new(input_width: u32, input_height: u32, grid_height: usize, grid_width: usize) -> Self {
        Self {
            input_width,
            input_height,
            heatmaps: Array4::zeros((1, grid_height, grid_width, KeypointIndex::COUNT)),
            offsets: Array4::zeros((1, grid_height, grid_width, 2 * KeypointIndex::COUNT)),
        }
    }

    pub fn input_size(&self) -> (u32, u32) {
        (self.input_width, self.input_height)
    }

    pub fn heatmaps(&self) -> ArrayView4<'_, f32> {
        self.heatmaps.view()
    }

    pub fn offsets(&self) -> ArrayView4<'_, f32> {
        self.offsets.view()
    }

    /// 全チャンネルを 0 に戻す
    pub fn clear(&mut self) {
        self.heatmaps.fill(0.0);
        self.offsets.fill(0.0);
    }

    /// セル (grid_y, grid_x) にジョイント k の値とオフセットを書き込む
    pub fn set_cell(
        &mut self,
        k: usize,
        grid_y: usize,
        grid_x: usize,
        confidence: f32,
        offset_x: f32,
        offset_y: f32,
    ) {
        self.heatmaps[[0, grid_y, grid_x, k]] = confidence;
        self.offsets[[0, grid_y, grid_x, k]] = offset_y;
        self.offsets[[0, grid_y, grid_x, k + KeypointIndex::COUNT]] = offset_x;
    }

    /// 入力画像上の点 (左上原点、ピクセル) をヒートマップのセルとオフセットに変換して配置
    ///
    /// デコード結果は Y 反転されるので (x, input_height - y) になる。
    /// グリッド外に出る座標はグリッド端にクランプされ、差分はオフセットに入る。
    /// ストライドが計算できないグリッド (1行以下) ではエラー。
    pub fn place(&mut self, k: usize, x: f32, y: f32, confidence: f32) -> Result<()> {
        let (_, grid_height, grid_width, _) = self.heatmaps.dim();
        let stride = output_stride(self.input_height as usize, grid_height)?.max(1) as f32;

        let grid_x = ((x / stride).floor().max(0.0) as usize).min(grid_width - 1);
        let grid_y = ((y / stride).floor().max(0.0) as usize).min(grid_height - 1);
        let offset_x = x - grid_x as f32 * stride;
        let offset_y = y - grid_y as f32 * stride;

        self.set_cell(k, grid_y, grid_x, confidence, offset_x, offset_y);
        Ok(())
    }
}

/// 入力画像上 (左上原点) の立ち姿 (x, y, 信頼度)
///
/// `sway` は -1.0〜1.0 で腕と頭を左右に振る。
pub fn standing_pose(input_width: u32, input_height: u32, sway: f32) -> [(f32, f32, f32); KeypointIndex::COUNT] {
    let w = input_width as f32;
    let h = input_height as f32;
    let cx = w * 0.5;
    let head = sway * w * 0.03;
    let arm = sway * h * 0.12;

    [
        (cx + head, h * 0.15, 0.95),
        (cx + head - w * 0.03, h * 0.12, 0.9),
        (cx + head + w * 0.03, h * 0.12, 0.9),
        (cx + head - w * 0.07, h * 0.14, 0.6),
        (cx + head + w * 0.07, h * 0.14, 0.6),
        (cx - w * 0.12, h * 0.28, 0.9),
        (cx + w * 0.12, h * 0.28, 0.9),
        (cx - w * 0.18, h * 0.42 - arm * 0.5, 0.85),
        (cx + w * 0.18, h * 0.42 + arm * 0.5, 0.85),
        (cx - w * 0.2, h * 0.55 - arm, 0.8),
        (cx + w * 0.2, h * 0.55 + arm, 0.8),
        (cx - w * 0.08, h * 0.58, 0.9),
        (cx + w * 0.08, h * 0.58, 0.9),
        (cx - w * 0.09, h * 0.74, 0.85),
        (cx + w * 0.09, h * 0.74, 0.85),
        (cx - w * 0.1, h * 0.9, 0.2),
        (cx + w * 0.1, h * 0.9, 0.2),
    ]
}
