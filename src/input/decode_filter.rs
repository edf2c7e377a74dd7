// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// FFmpeg解码过滤器模块
/// FFmpeg decode filter module
use crate::input::video::{DecodedFrame, VideoEvent};
use crossbeam_channel::Sender;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};
use std::sync::Arc;

/// FFmpeg解码过滤器: 视频文件 → RGBA帧
///
/// Each decoded frame is converted to RGBA and pushed into a bounded
/// channel with a blocking send. File playback must not outrun the
/// player, so backpressure here is what paces the decoder.
pub struct PlaybackFilter {
    tx: Sender<VideoEvent>,
    dropped_frames: usize,
    total_frames: usize,
    buffer: Arc<Vec<u8>>, // Arc包装避免每帧clone
}

impl PlaybackFilter {
    pub fn new(tx: Sender<VideoEvent>) -> Self {
        Self {
            tx,
            dropped_frames: 0,
            total_frames: 0,
            buffer: Arc::new(Vec::new()),
        }
    }
}

impl FrameFilter for PlaybackFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        println!("✅ 解码线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        unsafe {
            self.total_frames += 1;

            // 基本检查：空帧或损坏帧
            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                self.dropped_frames += 1;
                if self.total_frames <= 10 {
                    println!("⚠️ 丢弃帧 #{}: 空帧/损坏帧", self.total_frames);
                }
                return Ok(None);
            }

            let w = (*frame.as_ptr()).width as u32;
            let h = (*frame.as_ptr()).height as u32;

            // 检查分辨率合法性
            if w == 0 || h == 0 || w > 4096 || h > 4096 {
                self.dropped_frames += 1;
                if self.total_frames <= 10 {
                    println!("⚠️ 丢弃帧 #{}: 非法分辨率 {}x{}", self.total_frames, w, h);
                }
                return Ok(None);
            }

            let decode_error_flags = (*frame.as_ptr()).decode_error_flags;
            // 只丢弃严重错误的帧 (缺少参考帧、无效比特流)
            if decode_error_flags & 0x03 != 0 {
                self.dropped_frames += 1;
                if self.total_frames <= 10 {
                    println!(
                        "⚠️ 丢弃帧 #{}: 解码错误标志=0x{:02x}",
                        self.total_frames, decode_error_flags
                    );
                }
                return Ok(None);
            }

            // YUV420P数据指针
            let y_plane = (*frame.as_ptr()).data[0];
            let u_plane = (*frame.as_ptr()).data[1];
            let v_plane = (*frame.as_ptr()).data[2];
            let y_stride = (*frame.as_ptr()).linesize[0] as usize;
            let uv_stride = (*frame.as_ptr()).linesize[1] as usize;

            if y_plane.is_null() || u_plane.is_null() || v_plane.is_null() {
                self.dropped_frames += 1;
                if self.total_frames <= 10 {
                    println!("⚠️ 丢弃帧 #{}: YUV指针为空", self.total_frames);
                }
                return Ok(None);
            }

            if y_stride < w as usize || uv_stride < (w as usize / 2) {
                self.dropped_frames += 1;
                if self.total_frames <= 10 {
                    println!(
                        "⚠️ 丢弃帧 #{}: 步长异常 y_stride={} uv_stride={}",
                        self.total_frames, y_stride, uv_stride
                    );
                }
                return Ok(None);
            }

            let pixel_count = (w * h) as usize;
            let required_size = pixel_count * 4;

            // 只在尺寸变化或下游仍持有上一帧时重新分配Arc
            if Arc::strong_count(&self.buffer) > 1 || self.buffer.len() != required_size {
                self.buffer = Arc::new(vec![255; required_size]);
            }

            let buffer = Arc::get_mut(&mut self.buffer)
                .ok_or_else(|| "frame buffer still shared".to_string())?;
            yuv420p_to_rgba(
                y_plane,
                u_plane,
                v_plane,
                y_stride,
                uv_stride,
                buffer,
                w as usize,
                h as usize,
            );

            let decoded = DecodedFrame {
                rgba: Arc::clone(&self.buffer),
                width: w,
                height: h,
            };

            // 阻塞发送: 通道满即等待播放端消费; 播放端退出则停止解码
            if self.tx.send(VideoEvent::Frame(decoded)).is_err() {
                return Err("playback side closed".to_string());
            }

            Ok(Some(frame))
        }
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        println!(
            "✅ 解码线程退出: 总帧{} | 丢弃{}",
            self.total_frames, self.dropped_frames
        );
    }
}

/// YUV420P → RGBA, BT.601整数近似 (系数×128)
#[inline]
unsafe fn yuv420p_to_rgba(
    y_plane: *const u8,
    u_plane: *const u8,
    v_plane: *const u8,
    y_stride: usize,
    uv_stride: usize,
    buffer: &mut [u8],
    width: usize,
    height: usize,
) {
    let mut out_idx = 0;
    for y in 0..height {
        let y_row = y * y_stride;
        let uv_row = (y >> 1) * uv_stride;

        for x in 0..width {
            let y_val = *y_plane.add(y_row + x) as i32;
            let u_val = *u_plane.add(uv_row + (x >> 1)) as i32 - 128;
            let v_val = *v_plane.add(uv_row + (x >> 1)) as i32 - 128;

            buffer[out_idx] = (y_val + ((v_val * 179) >> 7)).clamp(0, 255) as u8;
            buffer[out_idx + 1] =
                (y_val - ((u_val * 44) >> 7) - ((v_val * 91) >> 7)).clamp(0, 255) as u8;
            buffer[out_idx + 2] = (y_val + ((u_val * 227) >> 7)).clamp(0, 255) as u8;
            out_idx += 4;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(y: u8, u: u8, v: u8, w: usize, h: usize) -> Vec<u8> {
        let y_plane = vec![y; w * h];
        let u_plane = vec![u; (w / 2) * h.div_ceil(2)];
        let v_plane = vec![v; (w / 2) * h.div_ceil(2)];
        let mut out = vec![255u8; w * h * 4];
        unsafe {
            yuv420p_to_rgba(
                y_plane.as_ptr(),
                u_plane.as_ptr(),
                v_plane.as_ptr(),
                w,
                w / 2,
                &mut out,
                w,
                h,
            );
        }
        out
    }

    #[test]
    fn neutral_chroma_maps_to_gray() {
        let out = convert(128, 128, 128, 4, 2);
        for px in out.chunks(4) {
            assert_eq!(px, &[128, 128, 128, 255]);
        }
    }

    #[test]
    fn black_and_white_extremes_saturate() {
        let black = convert(0, 128, 128, 2, 2);
        assert_eq!(&black[..4], &[0, 0, 0, 255]);

        let white = convert(255, 128, 128, 2, 2);
        assert_eq!(&white[..4], &[255, 255, 255, 255]);
    }

    #[test]
    fn strong_v_pushes_red_channel() {
        let out = convert(128, 128, 255, 2, 2);
        let [r, _g, b, _a] = [out[0], out[1], out[2], out[3]];
        assert!(r > 200, "red should saturate upward, got {r}");
        assert!(b == 128, "blue should be untouched by V, got {b}");
    }
}
