use anyhow::{ensure, Result};
use ndarray::ArrayView4;

use super::keypoint::{Keypoint, KeypointIndex, Pose};
use crate::config::ModelConfig;

/// ストライドはこの倍数に切り下げる (ネットワークのダウンサンプリング率)
const STRIDE_ALIGN: usize = 8;

/// ヒートマップの出力ストライドを計算
///
/// (入力高さ - 1) / (ヒートマップ高さ - 1) を整数除算し、8の倍数に切り下げる。
/// ヒートマップが1行以下、または入力高さが0の場合はエラー。
pub fn output_stride(input_height: usize, heatmap_height: usize) -> Result<usize> {
    ensure!(
        heatmap_height >= 2,
        "heatmap height must be at least 2, got {}",
        heatmap_height
    );
    ensure!(input_height >= 1, "input height must be non-zero");

    let stride = (input_height - 1) / (heatmap_height - 1);
    Ok(stride - stride % STRIDE_ALIGN)
}

/// モデル入力座標 → フレーム座標の変換
///
/// 推論前に正方形へリサイズした際のアスペクト歪みを戻す。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameScale {
    /// 短辺基準の倍率
    pub scale: f32,
    /// 長辺 / 短辺
    pub aspect_scale: f32,
    /// 横長フレーム (長辺がX)
    pub landscape: bool,
}

impl FrameScale {
    pub fn new(input_width: u32, input_height: u32, frame_width: u32, frame_height: u32) -> Self {
        let min_dim = frame_width.min(frame_height) as f32;
        let max_dim = frame_width.max(frame_height) as f32;

        Self {
            scale: min_dim / input_width.min(input_height) as f32,
            aspect_scale: max_dim / min_dim,
            landscape: frame_width > frame_height,
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let x = x * self.scale;
        let y = y * self.scale;
        if self.landscape {
            (x * self.aspect_scale, y)
        } else {
            (x, y * self.aspect_scale)
        }
    }
}

/// ヒートマップ上のピーク
#[derive(Debug, Clone, Copy, PartialEq)]
struct Peak {
    grid_x: usize,
    grid_y: usize,
    offset_x: f32,
    offset_y: f32,
    confidence: f32,
}

/// ヒートマップ + オフセットからキーポイントを復元するデコーダ
#[derive(Debug, Clone)]
pub struct KeypointDecoder {
    input_width: u32,
    input_height: u32,
}

impl KeypointDecoder {
    /// モデル入力解像度を指定して作成
    pub fn new(input_width: u32, input_height: u32) -> Self {
        Self {
            input_width,
            input_height,
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(config.input_width, config.input_height)
    }

    /// 1フレーム分のテンソルをデコード
    ///
    /// - heatmaps: [1, H, W, 17]
    /// - offsets: [1, H, W, 34] (チャンネル k = Yオフセット, k + 17 = Xオフセット)
    /// - 戻り値: フレーム座標系 (Y 上向き) の 17 キーポイント
    ///
    /// テンソル形状の不一致は配線ミスなのでエラーを返す。
    pub fn decode(
        &self,
        heatmaps: ArrayView4<f32>,
        offsets: ArrayView4<f32>,
        frame_width: u32,
        frame_height: u32,
    ) -> Result<Pose> {
        self.check_inputs(&heatmaps, &offsets, frame_width, frame_height)?;

        let heatmap_height = heatmaps.dim().1;
        let stride = output_stride(self.input_height as usize, heatmap_height)? as f32;
        let frame_scale = FrameScale::new(
            self.input_width,
            self.input_height,
            frame_width,
            frame_height,
        );

        let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];

        for (k, keypoint) in keypoints.iter_mut().enumerate() {
            let peak = locate_peak(&heatmaps, &offsets, k);

            // ヒートマップの行は上から下、表示座標は Y 上向きなので反転
            let x_model = peak.grid_x as f32 * stride + peak.offset_x;
            let y_model =
                self.input_height as f32 - (peak.grid_y as f32 * stride + peak.offset_y);

            let (x, y) = frame_scale.apply(x_model, y_model);
            *keypoint = Keypoint::new(x, y, peak.confidence);
        }

        Ok(Pose::new(keypoints))
    }

    fn check_inputs(
        &self,
        heatmaps: &ArrayView4<f32>,
        offsets: &ArrayView4<f32>,
        frame_width: u32,
        frame_height: u32,
    ) -> Result<()> {
        let (batch, height, width, channels) = heatmaps.dim();
        let (offset_batch, offset_height, offset_width, offset_channels) = offsets.dim();

        ensure!(
            batch == 1 && offset_batch == 1,
            "expected batch size 1, got heatmaps={} offsets={}",
            batch,
            offset_batch
        );
        ensure!(
            channels == KeypointIndex::COUNT,
            "heatmaps must have {} channels, got {}",
            KeypointIndex::COUNT,
            channels
        );
        ensure!(
            offset_channels == 2 * KeypointIndex::COUNT,
            "offsets must have {} channels, got {}",
            2 * KeypointIndex::COUNT,
            offset_channels
        );
        ensure!(
            height == offset_height && width == offset_width,
            "heatmap grid {}x{} does not match offset grid {}x{}",
            height,
            width,
            offset_height,
            offset_width
        );
        ensure!(height >= 2 && width >= 1, "heatmap grid too small: {}x{}", height, width);
        ensure!(
            self.input_width > 0 && self.input_height > 0,
            "invalid model input size {}x{}",
            self.input_width,
            self.input_height
        );
        ensure!(
            frame_width > 0 && frame_height > 0,
            "invalid frame size {}x{}",
            frame_width,
            frame_height
        );
        Ok(())
    }
}

/// ジョイント k のヒートマップ最大セルを探す
///
/// 行→列の順に走査し、厳密に大きい値のみ採用 (同値は先勝ち)。
/// 初期値 0 なので全て 0 以下ならセル (0, 0)・信頼度 0 になる。
fn locate_peak(heatmaps: &ArrayView4<f32>, offsets: &ArrayView4<f32>, k: usize) -> Peak {
    let (_, height, width, _) = heatmaps.dim();
    let mut peak = Peak {
        grid_x: 0,
        grid_y: 0,
        offset_x: 0.0,
        offset_y: 0.0,
        confidence: 0.0,
    };

    for y in 0..height {
        for x in 0..width {
            let value = heatmaps[[0, y, x, k]];
            if value > peak.confidence {
                peak = Peak {
                    grid_x: x,
                    grid_y: y,
                    offset_x: offsets[[0, y, x, k + KeypointIndex::COUNT]],
                    offset_y: offsets[[0, y, x, k]],
                    confidence: value,
                };
            }
        }
    }

    peak
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::synthetic::SyntheticFrame;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_output_stride() {
        assert_eq!(output_stride(481, 61).unwrap(), 8);
        assert_eq!(output_stride(513, 33).unwrap(), 16);
        // 480 / 40 = 12 → 8
        assert_eq!(output_stride(481, 41).unwrap(), 8);
        // 479 / 59 = 8 (整数除算)
        assert_eq!(output_stride(480, 60).unwrap(), 8);
    }

    #[test]
    fn test_output_stride_degenerate_sizes() {
        assert!(output_stride(481, 1).is_err());
        assert!(output_stride(481, 0).is_err());
        assert!(output_stride(0, 61).is_err());
        // 1 / 60 = 0 はエラーではない
        assert_eq!(output_stride(1, 61).unwrap(), 0);
    }

    #[test]
    fn test_frame_scale_square() {
        let fs = FrameScale::new(480, 480, 720, 720);
        assert_eq!(fs.aspect_scale, 1.0);
        assert!(approx_eq(fs.scale, 1.5));
        let (x, y) = fs.apply(100.0, 200.0);
        assert!(approx_eq(x, 150.0));
        assert!(approx_eq(y, 300.0));
    }

    #[test]
    fn test_frame_scale_landscape() {
        let fs = FrameScale::new(480, 480, 640, 480);
        assert!(fs.landscape);
        let (x, y) = fs.apply(240.0, 240.0);
        assert!(approx_eq(x, 320.0));
        assert!(approx_eq(y, 240.0));
    }

    #[test]
    fn test_frame_scale_portrait() {
        let fs = FrameScale::new(480, 480, 480, 640);
        assert!(!fs.landscape);
        let (x, y) = fs.apply(240.0, 240.0);
        assert!(approx_eq(x, 240.0));
        assert!(approx_eq(y, 320.0));
    }

    #[test]
    fn test_all_zero_heatmap() {
        let frame = SyntheticFrame::new(481, 481, 61, 61);
        let decoder = KeypointDecoder::new(481, 481);
        let pose = decoder.decode(frame.heatmaps(), frame.offsets(), 481, 481).unwrap();

        for kp in pose.keypoints.iter() {
            assert_eq!(kp.confidence, 0.0);
            assert!(!kp.is_valid(0.01));
            // グリッド (0, 0) → Y反転で入力高さ
            assert_eq!(kp.x, 0.0);
            assert!(approx_eq(kp.y, 481.0));
        }
    }

    #[test]
    fn test_negative_heatmap_keeps_origin() {
        let heatmaps = ndarray::Array4::<f32>::from_elem((1, 61, 61, 17), -0.5);
        let offsets = ndarray::Array4::<f32>::from_elem((1, 61, 61, 34), 7.0);
        let decoder = KeypointDecoder::new(481, 481);
        let pose = decoder.decode(heatmaps.view(), offsets.view(), 481, 481).unwrap();
        for kp in pose.keypoints.iter() {
            assert_eq!(kp.confidence, 0.0);
            // セル (0, 0) のオフセットも読まない
            assert_eq!(kp.x, 0.0);
            assert!(approx_eq(kp.y, 481.0));
        }
    }

    #[test]
    fn test_single_peak_selected() {
        let mut frame = SyntheticFrame::new(481, 481, 61, 61);
        frame.set_cell(KeypointIndex::LeftWrist as usize, 12, 45, 0.75, 0.0, 0.0);
        let decoder = KeypointDecoder::new(481, 481);
        let pose = decoder.decode(frame.heatmaps(), frame.offsets(), 481, 481).unwrap();

        let wrist = pose.get(KeypointIndex::LeftWrist);
        assert_eq!(wrist.confidence, 0.75);
        // 正方形フレームかつ入力と同サイズなので倍率 1
        assert!(approx_eq(wrist.x, 45.0 * 8.0));
        assert!(approx_eq(wrist.y, 481.0 - 12.0 * 8.0));
    }

    #[test]
    fn test_tie_keeps_first_in_raster_order() {
        let mut frame = SyntheticFrame::new(481, 481, 61, 61);
        frame.set_cell(0, 20, 50, 0.6, 0.0, 0.0);
        frame.set_cell(0, 20, 10, 0.6, 0.0, 0.0);
        frame.set_cell(0, 40, 5, 0.6, 0.0, 0.0);
        let decoder = KeypointDecoder::new(481, 481);
        let pose = decoder.decode(frame.heatmaps(), frame.offsets(), 481, 481).unwrap();

        let nose = pose.get(KeypointIndex::Nose);
        assert!(approx_eq(nose.x, 10.0 * 8.0));
        assert!(approx_eq(nose.y, 481.0 - 20.0 * 8.0));
    }

    #[test]
    fn test_offset_channel_layout() {
        let mut frame = SyntheticFrame::new(481, 481, 61, 61);
        let k = KeypointIndex::RightKnee as usize;
        frame.set_cell(k, 30, 20, 0.8, 3.0, -2.0);
        let decoder = KeypointDecoder::new(481, 481);

        // X は k + 17、Y は k
        assert_eq!(frame.offsets()[[0, 30, 20, k + KeypointIndex::COUNT]], 3.0);
        assert_eq!(frame.offsets()[[0, 30, 20, k]], -2.0);

        let pose = decoder.decode(frame.heatmaps(), frame.offsets(), 481, 481).unwrap();
        let knee = pose.get(KeypointIndex::RightKnee);
        assert!(approx_eq(knee.x, 20.0 * 8.0 + 3.0));
        assert!(approx_eq(knee.y, 481.0 - (30.0 * 8.0 - 2.0)));
    }

    #[test]
    fn test_decode_is_deterministic() {
        let mut frame = SyntheticFrame::new(481, 481, 61, 61);
        for k in 0..KeypointIndex::COUNT {
            frame.set_cell(k, k * 3, 60 - k * 2, 0.1 + k as f32 * 0.05, 1.5, 0.5);
        }
        let decoder = KeypointDecoder::new(481, 481);
        let a = decoder.decode(frame.heatmaps(), frame.offsets(), 1280, 720).unwrap();
        let b = decoder.decode(frame.heatmaps(), frame.offsets(), 1280, 720).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_end_to_end_landscape_frame() {
        let mut frame = SyntheticFrame::new(481, 481, 61, 61);
        frame.set_cell(0, 30, 30, 0.9, 0.0, 0.0);
        let decoder = KeypointDecoder::new(481, 481);
        let pose = decoder.decode(frame.heatmaps(), frame.offsets(), 640, 480).unwrap();

        let scale = 480.0 / 481.0;
        let aspect = 640.0 / 480.0;
        let nose = pose.get(KeypointIndex::Nose);
        assert_eq!(nose.confidence, 0.9);
        assert!(nose.is_valid(0.3));
        assert!(approx_eq(nose.x, 240.0 * scale * aspect));
        assert!(approx_eq(nose.y, 241.0 * scale));

        // 検出なしのジョイントはグリッド (0, 0) → (0, 481 * scale) = (0, 480)
        for kp in pose.keypoints.iter().skip(1) {
            assert_eq!(kp.confidence, 0.0);
            assert!(!kp.is_valid(0.3));
            assert_eq!(kp.x, 0.0);
            assert!(approx_eq(kp.y, 481.0 * scale));
            assert!(approx_eq(kp.y, 480.0));
        }
    }

    #[test]
    fn test_end_to_end_portrait_frame() {
        let mut frame = SyntheticFrame::new(481, 481, 61, 61);
        frame.set_cell(0, 30, 30, 0.9, 0.0, 0.0);
        let decoder = KeypointDecoder::new(481, 481);
        let pose = decoder.decode(frame.heatmaps(), frame.offsets(), 480, 640).unwrap();

        // 縦長フレームでは縦横比を Y に掛ける
        let scale = 480.0 / 481.0;
        let aspect = 640.0 / 480.0;
        let nose = pose.get(KeypointIndex::Nose);
        assert_eq!(nose.confidence, 0.9);
        assert!(approx_eq(nose.x, 240.0 * scale));
        assert!(approx_eq(nose.y, 241.0 * scale * aspect));

        for kp in pose.keypoints.iter().skip(1) {
            assert_eq!(kp.confidence, 0.0);
            assert_eq!(kp.x, 0.0);
            assert!(approx_eq(kp.y, 481.0 * scale * aspect));
            assert!(approx_eq(kp.y, 640.0));
        }
    }

    #[test]
    fn test_channel_count_mismatch() {
        let decoder = KeypointDecoder::new(481, 481);
        let heatmaps = ndarray::Array4::<f32>::zeros((1, 61, 61, 16));
        let offsets = ndarray::Array4::<f32>::zeros((1, 61, 61, 34));
        assert!(decoder.decode(heatmaps.view(), offsets.view(), 640, 480).is_err());

        let heatmaps = ndarray::Array4::<f32>::zeros((1, 61, 61, 17));
        let offsets = ndarray::Array4::<f32>::zeros((1, 61, 61, 17));
        assert!(decoder.decode(heatmaps.view(), offsets.view(), 640, 480).is_err());
    }

    #[test]
    fn test_grid_size_mismatch() {
        let decoder = KeypointDecoder::new(481, 481);
        let heatmaps = ndarray::Array4::<f32>::zeros((1, 61, 61, 17));
        let offsets = ndarray::Array4::<f32>::zeros((1, 31, 31, 34));
        let err = decoder
            .decode(heatmaps.view(), offsets.view(), 640, 480)
            .unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn test_batch_and_frame_size_rejected() {
        let decoder = KeypointDecoder::new(481, 481);
        let heatmaps = ndarray::Array4::<f32>::zeros((2, 61, 61, 17));
        let offsets = ndarray::Array4::<f32>::zeros((2, 61, 61, 34));
        assert!(decoder.decode(heatmaps.view(), offsets.view(), 640, 480).is_err());

        let frame = SyntheticFrame::new(481, 481, 61, 61);
        assert!(decoder.decode(frame.heatmaps(), frame.offsets(), 0, 480).is_err());
    }

    #[test]
    fn test_single_row_grid_rejected() {
        let decoder = KeypointDecoder::new(481, 481);
        let heatmaps = ndarray::Array4::<f32>::zeros((1, 1, 61, 17));
        let offsets = ndarray::Array4::<f32>::zeros((1, 1, 61, 34));
        assert!(decoder.decode(heatmaps.view(), offsets.view(), 640, 480).is_err());
    }
}
