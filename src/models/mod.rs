// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 模型实现
///
/// ## 完整模型 (Full Model)
/// - **YOLOv8**: 模型加载 (new) → 预处理 (preprocess) → 推理 → 解码 (decode)
///   - 文件: `yolov8.rs`
///
/// ## 后处理器模式 (Postprocessor Pattern)
/// - **YOLOv8Decoder**: 独立的输出张量解码器, 不持有推理引擎,
///   由配置参数 (阈值/输入分辨率/评分策略/坐标空间) 构造, 可单独测试
pub mod yolov8;

pub use yolov8::{YOLOv8, YOLOv8Decoder};
