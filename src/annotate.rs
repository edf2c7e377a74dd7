// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 叠加绘制
// 检测框/标签/HUD 直接画在 macroquad 窗口上

use macroquad::prelude::*;

use crate::Bbox;

const BOX_THICKNESS: f32 = 3.0;
const LABEL_FONT_SIZE: f32 = 20.0;
const HUD_FONT_SIZE: f32 = 22.0;

// 高区分度调色板, 按类别ID取模循环
const BRIGHT_COLORS: [(u8, u8, u8); 12] = [
    (255, 0, 0),     // 红色
    (0, 255, 0),     // 绿色
    (0, 0, 255),     // 蓝色
    (255, 255, 0),   // 黄色
    (255, 0, 255),   // 品红
    (0, 255, 255),   // 青色
    (255, 128, 0),   // 橙色
    (255, 0, 128),   // 粉红
    (128, 255, 0),   // 黄绿
    (0, 128, 255),   // 天蓝
    (255, 255, 255), // 白色
    (128, 0, 255),   // 紫色
];

/// 帧在窗口中的摆放: 等比缩放 + 居中
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

/// Aspect-preserving fit of a frame into the window, centered. The same
/// scale applies to both axes so boxes keep their shape.
pub fn fit_to_screen(frame_w: f32, frame_h: f32, screen_w: f32, screen_h: f32) -> Placement {
    let scale = (screen_w / frame_w).min(screen_h / frame_h);
    Placement {
        scale,
        offset_x: (screen_w - frame_w * scale) / 2.0,
        offset_y: (screen_h - frame_h * scale) / 2.0,
    }
}

pub fn class_color(id: usize) -> Color {
    let (r, g, b) = BRIGHT_COLORS[id % BRIGHT_COLORS.len()];
    Color::from_rgba(r, g, b, 255)
}

/// 标签文本: "car 0.87"
pub fn label_text(name: &str, confidence: f32) -> String {
    format!("{} {:.2}", name, confidence)
}

/// 画一帧的全部检测: 边框 + 实底标签条
pub fn draw_detections(detections: &[Bbox], names: &[String], placement: &Placement) {
    for bbox in detections {
        let color = class_color(bbox.id());
        let x = bbox.xmin() * placement.scale + placement.offset_x;
        let y = bbox.ymin() * placement.scale + placement.offset_y;
        let w = bbox.width() * placement.scale;
        let h = bbox.height() * placement.scale;

        draw_rectangle_lines(x, y, w, h, BOX_THICKNESS, color);

        let name = names.get(bbox.id()).map(String::as_str).unwrap_or("unknown");
        let label = label_text(name, bbox.confidence());
        let dims = measure_text(&label, None, LABEL_FONT_SIZE as u16, 1.0);

        // 标签条画在框上沿上方, 顶到窗口边缘时落到框内
        let text_y = if y - dims.height - 4.0 > 0.0 {
            y - 4.0
        } else {
            y + dims.height + 4.0
        };
        draw_rectangle(
            x,
            text_y - dims.height - 2.0,
            dims.width + 4.0,
            dims.height + 6.0,
            color,
        );
        draw_text(&label, x + 2.0, text_y, LABEL_FONT_SIZE, BLACK);
    }
}

/// HUD: 当前速度/检测数/按键提示
pub fn draw_hud(speed: f32, detection_count: usize) {
    let status = format!("{:.1}x | {} 目标", speed, detection_count);
    draw_text(&status, 10.0, 26.0, HUD_FONT_SIZE, WHITE);
    draw_text(
        "[+/-] 速度  [Q] 退出",
        10.0,
        screen_height() - 12.0,
        HUD_FONT_SIZE,
        GRAY,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_centers_letterboxed_frame() {
        // 640x480 into a 1280x720 window: height binds, bars left and right
        let p = fit_to_screen(640.0, 480.0, 1280.0, 720.0);
        assert!((p.scale - 1.5).abs() < 1e-6);
        assert!((p.offset_x - 160.0).abs() < 1e-6);
        assert!(p.offset_y.abs() < 1e-6);
    }

    #[test]
    fn fit_never_overflows_the_window() {
        let p = fit_to_screen(1920.0, 1080.0, 640.0, 640.0);
        assert!(1920.0 * p.scale <= 640.0 + 1e-3);
        assert!(1080.0 * p.scale <= 640.0 + 1e-3);
    }

    #[test]
    fn label_shows_two_decimal_confidence() {
        assert_eq!(label_text("car", 0.8712), "car 0.87");
        assert_eq!(label_text("person", 1.0), "person 1.00");
    }

    #[test]
    fn class_colors_cycle_through_the_palette() {
        assert_eq!(class_color(0), class_color(12));
        assert_ne!(class_color(0), class_color(1));
    }
}
