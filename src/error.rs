use std::path::PathBuf;

use thiserror::Error;

/// 视频处理错误（外部 ffmpeg/ffprobe 调用失败）
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("未找到 ffmpeg，请先安装 ffmpeg: {0}")]
    FfmpegNotFound(#[source] std::io::Error),
    #[error("视频文件不存在: {0}")]
    VideoNotFound(PathBuf),
    #[error("{tool} 退出异常 ({status}): {stderr}")]
    CommandFailed {
        tool: &'static str,
        status: String,
        stderr: String,
    },
    #[error("解析 {tool} 输出失败: {message}")]
    InvalidOutput {
        tool: &'static str,
        message: String,
    },
    #[error("未在文件中找到视频流")]
    NoVideoStream,
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 帧组织错误
#[derive(Debug, Error)]
pub enum OrganizationError {
    #[error("没有提取到任何视频帧")]
    NoFrames,
    #[error(transparent)]
    Processing(#[from] ProcessingError),
    #[error("写入帧表格失败: {0}")]
    Csv(#[from] csv::Error),
    #[error("写入产物失败: {0}")]
    Io(#[from] std::io::Error),
}

/// 口述脚本生成错误
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("选中的帧列表为空，无法生成口述脚本")]
    EmptySelection,
    #[error("读取选帧文件失败: {path}: {message}")]
    InvalidSelection { path: PathBuf, message: String },
    #[error("处理帧图片失败: {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("缺少 API Key，请设置环境变量 OPENAI_API_KEY")]
    MissingApiKey,
    #[error("推理接口调用失败: {0}")]
    Api(#[from] async_openai::error::OpenAIError),
    #[error("推理接口调用超时（{0} 秒）")]
    Timeout(u64),
    #[error("推理接口返回了空响应")]
    EmptyResponse,
}
