// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 视频文件源
// FFmpeg 解码线程 + 有界帧通道, 播放端逐帧拉取

use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, bail, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::stream_info::{find_video_stream_info, StreamInfo};
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};

use super::decode_filter::PlaybackFilter;

// 通道容量: 解码端最多领先播放端这么多帧
const FRAME_QUEUE_LEN: usize = 4;

const FALLBACK_FPS: f32 = 25.0;

/// 一帧解码输出, RGBA像素
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub rgba: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
}

/// 帧通道上的事件
#[derive(Debug, Clone)]
pub enum VideoEvent {
    Frame(DecodedFrame),
    EndOfStream,
}

/// 视频文件解码源
///
/// Opening a source probes the container for the nominal frame rate, then
/// spawns one decode thread running an FFmpeg pipeline whose only output
/// is [`PlaybackFilter`]. Frames arrive through a bounded channel, so the
/// decoder blocks instead of racing ahead of playback.
pub struct VideoSource {
    rx: Receiver<VideoEvent>,
    fps: f32,
    width: u32,
    height: u32,
    _handle: JoinHandle<()>,
}

impl VideoSource {
    pub fn open(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            bail!("video file not found: {path}");
        }

        let (fps, width, height) = probe(path)?;
        println!("📹 视频: {path} ({width}x{height} @ {fps:.2}fps)");

        let (tx, rx) = bounded(FRAME_QUEUE_LEN);
        let path = path.to_string();
        let handle = thread::spawn(move || {
            if let Err(err) = decode_file(&path, tx.clone()) {
                log::error!("decode pipeline failed: {err}");
            }
            // 正常播完与失败都以EOS收尾; 播放端已退出时忽略
            let _ = tx.send(VideoEvent::EndOfStream);
        });

        Ok(Self {
            rx,
            fps,
            width,
            height,
            _handle: handle,
        })
    }

    /// 阻塞读取下一事件; 解码线程消失视同流结束
    pub fn read(&self) -> VideoEvent {
        self.rx.recv().unwrap_or(VideoEvent::EndOfStream)
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// 探测容器的标称帧率与分辨率
fn probe(path: &str) -> Result<(f32, u32, u32)> {
    let info = find_video_stream_info(path).map_err(|e| anyhow!("stream probe failed: {e}"))?;
    match info {
        Some(StreamInfo::Video {
            fps, width, height, ..
        }) => {
            let fps = fps as f32;
            let fps = if fps.is_finite() && fps > 0.0 {
                fps
            } else {
                log::warn!("container reports no usable fps, assuming {FALLBACK_FPS}");
                FALLBACK_FPS
            };
            Ok((fps, width as u32, height as u32))
        }
        _ => bail!("no video stream in {path}"),
    }
}

/// 解码线程主体: 文件 → PlaybackFilter → 空输出
fn decode_file(path: &str, tx: Sender<VideoEvent>) -> Result<()> {
    let filter = PlaybackFilter::new(tx);

    let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
    let pipe = pipe.filter("playback", Box::new(filter));
    let out = create_null_output().add_frame_pipeline(pipe);

    let ctx = FfmpegContext::builder()
        .input(Input::new(path))
        .output(out)
        .build()
        .map_err(|e| anyhow!("构建失败: {e}"))?;

    let sch = ctx.start().map_err(|e| anyhow!("启动失败: {e}"))?;
    sch.wait().map_err(|e| anyhow!("解码失败: {e}"))?;
    Ok(())
}
