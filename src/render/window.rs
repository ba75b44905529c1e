use anyhow::Result;
use minifb::{Key, Window, WindowOptions};

use crate::pose::{Joint, KeypointIndex};
use crate::render::skeleton::{SkeletonRenderer, KEYPOINT_COLOR};

/// 背景色 (RGB)
const BACKGROUND_COLOR: u32 = 0x101018;

/// ジョイントの描画半径
const JOINT_RADIUS: i32 = 4;

/// minifbを使用したオーバーレイ表示
///
/// ジョイント座標は Y 上向き (原点は左下) なので、描画時に反転する。
pub struct MinifbRenderer {
    window: Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

/// 線幅 (ピクセル) → スタンプ半径
///
/// 半径 r のスタンプは幅 2r + 1 になる。
fn stroke_radius(width: f32) -> i32 {
    ((width - 1.0) / 2.0).round().max(0.0) as i32
}

impl MinifbRenderer {
    /// ウィンドウを作成 (サイズはフレームと同じにする)
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )?;

        let buffer = vec![BACKGROUND_COLOR; width * height];

        Ok(Self {
            window,
            buffer,
            width,
            height,
        })
    }

    /// ウィンドウが開いているか
    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }

    pub fn clear(&mut self) {
        self.buffer.fill(BACKGROUND_COLOR);
    }

    /// 表示中の線分を描画
    pub fn draw_skeleton(&mut self, skeleton: &SkeletonRenderer) {
        for segment in skeleton.segments().iter().filter(|s| s.visible) {
            let (x1, y1) = self.to_pixel(segment.start);
            let (x2, y2) = self.to_pixel(segment.end);
            let radius = stroke_radius(segment.width);
            self.draw_line(x1, y1, x2, y2, radius, segment.color);
        }
    }

    /// 有効なジョイントを描画
    pub fn draw_joints(&mut self, joints: &[Joint; KeypointIndex::COUNT]) {
        for joint in joints.iter().filter(|j| j.active) {
            let (px, py) = self.to_pixel(joint.position);
            self.draw_circle(px, py, JOINT_RADIUS, KEYPOINT_COLOR);
        }
    }

    /// バッファをウィンドウに表示
    pub fn update(&mut self) -> Result<()> {
        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)?;
        Ok(())
    }

    fn to_pixel(&self, position: [f32; 3]) -> (i32, i32) {
        let px = position[0] as i32;
        let py = self.height as i32 - position[1] as i32;
        (px, py)
    }

    /// Bresenhamで線を引き、各点に半径 radius の円を置いて太さを出す
    fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, radius: i32, color: u32) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        let mut x = x0;
        let mut y = y0;

        loop {
            self.draw_circle(x, y, radius, color);

            if x == x1 && y == y1 {
                break;
            }

            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// 円を描画（塗りつぶし）
    fn draw_circle(&mut self, cx: i32, cy: i32, radius: i32, color: u32) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.set_pixel(cx + dx, cy + dy, color);
                }
            }
        }
    }

    /// ピクセルをセット（境界チェック付き）
    fn set_pixel(&mut self, x: i32, y: i32, color: u32) {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            self.buffer[y as usize * self.width + x as usize] = color;
        }
    }
}
