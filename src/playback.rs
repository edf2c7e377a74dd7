// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 播放控制器
// 速度状态 + 主播放循环 (读帧 → 检测 → 渲染/节流)

use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use image::DynamicImage;
use macroquad::prelude::*;

use crate::annotate;
use crate::input::{VideoEvent, VideoSource};
use crate::{Bbox, YOLOv8};

pub const SPEED_MIN: f32 = 0.1;
pub const SPEED_MAX: f32 = 2.0;
pub const SPEED_STEP: f32 = 0.1;

/// 播放速度状态
///
/// The speed multiplier is the only mutable playback state. It moves in
/// fixed steps and is always clamped to `[SPEED_MIN, SPEED_MAX]`, so the
/// frame delay below can never divide by zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackState {
    speed: f32,
}

impl PlaybackState {
    pub fn new(speed: f32) -> Self {
        Self {
            speed: quantize(speed.clamp(SPEED_MIN, SPEED_MAX)),
        }
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// 加速一档, 返回新速度
    pub fn speed_up(&mut self) -> f32 {
        self.speed = quantize((self.speed + SPEED_STEP).clamp(SPEED_MIN, SPEED_MAX));
        self.speed
    }

    /// 减速一档, 返回新速度
    pub fn slow_down(&mut self) -> f32 {
        self.speed = quantize((self.speed - SPEED_STEP).clamp(SPEED_MIN, SPEED_MAX));
        self.speed
    }

    /// 每帧停留时长: 1000ms / (fps × speed)
    pub fn frame_delay(&self, fps: f32) -> Duration {
        Duration::from_secs_f32(1.0 / (fps * self.speed))
    }
}

// 按 0.1 步进工作, 量化到一位小数避免浮点漂移 (0.7000001x)
fn quantize(speed: f32) -> f32 {
    (speed * 10.0).round() / 10.0
}

/// 视频文件播放器
///
/// Owns the decoded-frame source, the detector and the on-screen state.
/// One iteration of [`Player::run`] pulls a frame, runs detection on it,
/// then keeps redrawing (and polling keys) until the frame's display
/// deadline passes.
pub struct Player {
    source: VideoSource,
    model: YOLOv8,
    state: PlaybackState,
    texture: Option<Texture2D>,
    detections: Vec<Bbox>,
    frame_count: u64,
}

impl Player {
    pub fn new(model: YOLOv8, source: VideoSource, speed: f32) -> Self {
        Self {
            source,
            model,
            state: PlaybackState::new(speed),
            texture: None,
            detections: Vec::new(),
            frame_count: 0,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let fps = self.source.fps();
        println!(
            "▶️  开始播放: {}x{} @ {:.2} fps, 初始速度 {:.1}x",
            self.source.width(),
            self.source.height(),
            fps,
            self.state.speed()
        );

        loop {
            match self.source.read() {
                VideoEvent::Frame(frame) => {
                    let img = to_image(frame.width, frame.height, &frame.rgba)?;
                    self.detections = self.model.detect(&img)?;
                    self.upload(frame.width, frame.height, &frame.rgba);
                    self.frame_count += 1;
                }
                VideoEvent::EndOfStream => break,
            }

            // 节流: 在截止时刻前持续重绘并响应按键
            let deadline = Instant::now() + self.state.frame_delay(fps);
            loop {
                if self.handle_keys() {
                    println!("⏹️  用户退出, 已播放 {} 帧", self.frame_count);
                    return Ok(());
                }
                self.draw();
                next_frame().await;
                if Instant::now() >= deadline {
                    break;
                }
            }
        }

        println!("🏁 播放结束, 共 {} 帧", self.frame_count);
        Ok(())
    }

    /// 纹理上传: 分辨率变化时重建, 否则原地更新像素
    fn upload(&mut self, width: u32, height: u32, rgba: &[u8]) {
        let needs_rebuild = match &self.texture {
            Some(tex) => tex.width() != width as f32 || tex.height() != height as f32,
            None => true,
        };

        if needs_rebuild {
            let texture = Texture2D::from_rgba8(width as u16, height as u16, rgba);
            texture.set_filter(FilterMode::Linear);
            self.texture = Some(texture);
        } else if let Some(tex) = &self.texture {
            let img = Image {
                bytes: rgba.to_vec(),
                width: width as u16,
                height: height as u16,
            };
            tex.update(&img);
        }
    }

    fn draw(&self) {
        clear_background(BLACK);
        if let Some(texture) = &self.texture {
            let placement = annotate::fit_to_screen(
                texture.width(),
                texture.height(),
                screen_width(),
                screen_height(),
            );
            draw_texture_ex(
                texture,
                placement.offset_x,
                placement.offset_y,
                WHITE,
                DrawTextureParams {
                    dest_size: Some(vec2(
                        texture.width() * placement.scale,
                        texture.height() * placement.scale,
                    )),
                    ..Default::default()
                },
            );
            annotate::draw_detections(&self.detections, self.model.names(), &placement);
        }
        annotate::draw_hud(self.state.speed(), self.detections.len());
    }

    /// 处理按键, 返回 true 表示退出
    fn handle_keys(&mut self) -> bool {
        if is_key_pressed(KeyCode::Q) || is_key_pressed(KeyCode::Escape) {
            return true;
        }
        if is_key_pressed(KeyCode::Equal) || is_key_pressed(KeyCode::KpAdd) {
            let speed = self.state.speed_up();
            println!("⏩ 播放速度: {:.1}x", speed);
        }
        if is_key_pressed(KeyCode::Minus) || is_key_pressed(KeyCode::KpSubtract) {
            let speed = self.state.slow_down();
            println!("⏪ 播放速度: {:.1}x", speed);
        }
        false
    }
}

fn to_image(width: u32, height: u32, rgba: &[u8]) -> Result<DynamicImage> {
    let buf = image::RgbaImage::from_raw(width, height, rgba.to_vec())
        .ok_or_else(|| anyhow!("frame buffer does not match {}x{} RGBA", width, height))?;
    Ok(DynamicImage::ImageRgba8(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_steps_by_tenths() {
        let mut s = PlaybackState::new(0.5);
        assert_eq!(s.speed_up(), 0.6);
        assert_eq!(s.speed_up(), 0.7);
        assert_eq!(s.slow_down(), 0.6);
    }

    #[test]
    fn speed_never_leaves_bounds() {
        let mut s = PlaybackState::new(0.5);
        for _ in 0..50 {
            s.speed_up();
            assert!(s.speed() <= SPEED_MAX);
        }
        assert_eq!(s.speed(), SPEED_MAX);

        for _ in 0..50 {
            s.slow_down();
            assert!(s.speed() >= SPEED_MIN);
        }
        assert_eq!(s.speed(), SPEED_MIN);
    }

    #[test]
    fn repeated_stepping_does_not_drift() {
        let mut s = PlaybackState::new(0.1);
        for _ in 0..6 {
            s.speed_up();
        }
        assert_eq!(s.speed(), 0.7);
    }

    #[test]
    fn out_of_range_initial_speed_is_clamped() {
        assert_eq!(PlaybackState::new(0.0).speed(), SPEED_MIN);
        assert_eq!(PlaybackState::new(9.0).speed(), SPEED_MAX);
    }

    #[test]
    fn frame_delay_follows_speed_and_fps() {
        let s = PlaybackState::new(1.0);
        let d = s.frame_delay(30.0);
        assert!((d.as_secs_f32() - 1.0 / 30.0).abs() < 1e-6);

        // half speed doubles the delay
        let s = PlaybackState::new(0.5);
        let d = s.frame_delay(30.0);
        assert!((d.as_secs_f32() - 1.0 / 15.0).abs() < 1e-6);
    }

    #[test]
    fn frame_buffer_converts_to_image() {
        let rgba = vec![255u8; 4 * 4 * 4];
        let img = to_image(4, 4, &rgba).unwrap();
        assert_eq!(img.width(), 4);
        assert_eq!(img.height(), 4);
        assert!(to_image(4, 4, &rgba[..8]).is_err());
    }
}
