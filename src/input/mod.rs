// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 视频输入系统
/// 文件解码 → RGBA 帧通道
pub mod decode_filter;
pub mod video;

pub use video::{DecodedFrame, VideoEvent, VideoSource};
