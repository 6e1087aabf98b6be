use serde::{Deserialize, Serialize};

/// 视频元数据（由 ffprobe 报告）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// 视频总时长（秒）
    pub duration: f64,
    /// 宽度（像素）
    pub width: u32,
    /// 高度（像素）
    pub height: u32,
    /// 帧率
    pub fps: f64,
    /// 码率（bps）
    pub bitrate: u64,
    /// 视频编码
    pub codec: String,
    /// 容器格式
    pub format: String,
    /// 文件大小（MB）
    pub size_mb: f64,
}

/// 场景变化点（由 ffmpeg scene 滤镜报告）
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SceneChange {
    /// 变化发生的时间戳（秒）
    pub timestamp: f64,
    /// 源视频中对应的帧号
    pub frame_number: u64,
    /// 场景变化得分（0.0-1.0）
    pub scene_score: f64,
}

/// 帧表格中的一行
///
/// 字段顺序即 CSV 列顺序。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRecord {
    /// 帧序号（从 0 开始，与提取顺序一致）
    pub index: usize,
    /// 格式化时间戳（HH:MM:SS.mmm）
    pub timestamp: String,
    /// 时间戳（秒）
    pub time_seconds: f64,
    /// 场景序号（从 0 开始）
    pub scene: usize,
    /// 进入该场景时的变化得分（场景 0 为 0.0）
    pub scene_score: f64,
    /// 帧文件名
    pub frame_file: String,
    /// 帧文件路径
    pub frame_path: String,
}
