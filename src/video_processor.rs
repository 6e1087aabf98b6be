use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ProcessingError;
use crate::metadata::{SceneChange, VideoMetadata};

/// 视频处理器，通过子进程调用 ffmpeg/ffprobe 完成所有解码相关工作
///
/// 三个操作（提取帧、检测场景、读取元数据）互相独立，均为同步阻塞调用，
/// 相同输入下可重复执行。
pub struct VideoProcessor {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl VideoProcessor {
    /// 创建处理器并探测 ffmpeg 是否可用
    pub fn new() -> Result<Self, ProcessingError> {
        Self::with_paths("ffmpeg", "ffprobe")
    }

    /// 使用自定义的 ffmpeg/ffprobe 路径创建处理器
    pub fn with_paths(
        ffmpeg: impl Into<String>,
        ffprobe: impl Into<String>,
    ) -> Result<Self, ProcessingError> {
        let processor = Self {
            ffmpeg_path: ffmpeg.into(),
            ffprobe_path: ffprobe.into(),
        };
        processor.check_ffmpeg()?;
        Ok(processor)
    }

    /// 执行 `ffmpeg -version` 确认二进制存在
    fn check_ffmpeg(&self) -> Result<(), ProcessingError> {
        let output = Command::new(&self.ffmpeg_path)
            .arg("-version")
            .output()
            .map_err(ProcessingError::FfmpegNotFound)?;
        if !output.status.success() {
            return Err(command_failed("ffmpeg", &output));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = stdout.split_whitespace().nth(2).unwrap_or("unknown");
        info!("✓ ffmpeg 可用，版本: {}", version);
        Ok(())
    }

    /// 按固定采样率提取视频帧，返回排序后的帧文件列表
    ///
    /// 帧图片以 `frame_%04d.jpg` 命名写入 `output_dir`；目录中上次提取
    /// 残留的 jpg 会先被清理，保证重复提取的结果一致。
    pub fn extract_frames(
        &self,
        video_path: &Path,
        fps: f64,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, ProcessingError> {
        ensure_video_exists(video_path)?;

        if output_dir.exists() {
            for entry in fs::read_dir(output_dir)? {
                let path = entry?.path();
                if path.extension().map(|ext| ext == "jpg").unwrap_or(false) {
                    fs::remove_file(&path)?;
                }
            }
        } else {
            fs::create_dir_all(output_dir)?;
        }

        let pattern = output_dir.join("frame_%04d.jpg");
        let output = Command::new(&self.ffmpeg_path)
            .arg("-i")
            .arg(video_path)
            .arg("-vf")
            .arg(format!("fps={}", fps))
            .arg("-f")
            .arg("image2")
            .arg("-y")
            .arg(&pattern)
            .output()?;
        if !output.status.success() {
            return Err(command_failed("ffmpeg", &output));
        }

        let mut frames: Vec<PathBuf> = fs::read_dir(output_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().map(|ext| ext == "jpg").unwrap_or(false))
            .collect();
        frames.sort();
        debug!("💾 提取 {} 帧 -> {}", frames.len(), output_dir.display());
        Ok(frames)
    }

    /// 检测场景变化点，返回按时间排序的变化列表
    ///
    /// threshold 取值 0.0-1.0，越大越不敏感；没有检测到变化时返回空列表。
    /// 通过 scene 滤镜把变化点的元数据打印到临时文件再解析。
    pub fn detect_scene_changes(
        &self,
        video_path: &Path,
        threshold: f64,
    ) -> Result<Vec<SceneChange>, ProcessingError> {
        ensure_video_exists(video_path)?;

        let metadata_file = std::env::temp_dir().join(format!(
            "video-narrate-scene-{}.txt",
            uuid::Uuid::new_v4()
        ));
        let filter = format!(
            "select='gt(scene,{})',metadata=mode=print:file={}",
            threshold,
            metadata_file.display()
        );

        let result = Command::new(&self.ffmpeg_path)
            .arg("-i")
            .arg(video_path)
            .arg("-vf")
            .arg(&filter)
            .arg("-f")
            .arg("null")
            .arg("-")
            .output();

        let parsed = match result {
            Ok(output) if output.status.success() => {
                // 没有变化点时 ffmpeg 可能不生成文件，视为空列表
                let content = fs::read_to_string(&metadata_file).unwrap_or_default();
                Ok(parse_scene_metadata(&content))
            }
            Ok(output) => Err(command_failed("ffmpeg", &output)),
            Err(e) => Err(ProcessingError::Io(e)),
        };

        let _ = fs::remove_file(&metadata_file);
        parsed
    }

    /// 读取视频元数据（时长、分辨率、帧率、编码等）
    pub fn get_video_metadata(&self, video_path: &Path) -> Result<VideoMetadata, ProcessingError> {
        ensure_video_exists(video_path)?;
        let size_mb = fs::metadata(video_path)?.len() as f64 / (1024.0 * 1024.0);

        let output = Command::new(&self.ffprobe_path)
            .arg("-v")
            .arg("quiet")
            .arg("-print_format")
            .arg("json")
            .arg("-show_format")
            .arg("-show_streams")
            .arg(video_path)
            .output()?;
        if !output.status.success() {
            return Err(command_failed("ffprobe", &output));
        }

        let probe: ProbeOutput =
            serde_json::from_slice(&output.stdout).map_err(|e| ProcessingError::InvalidOutput {
                tool: "ffprobe",
                message: e.to_string(),
            })?;
        build_metadata(probe, size_mb)
    }
}

/// ffprobe -print_format json 的输出结构（只取用到的字段）
#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
    format_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
}

fn build_metadata(probe: ProbeOutput, size_mb: f64) -> Result<VideoMetadata, ProcessingError> {
    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or(ProcessingError::NoVideoStream)?;

    let duration = probe
        .format
        .duration
        .as_deref()
        .and_then(|v| v.parse().ok())
        .ok_or(ProcessingError::InvalidOutput {
            tool: "ffprobe",
            message: "缺少 duration 字段".to_string(),
        })?;

    Ok(VideoMetadata {
        duration,
        width: video_stream.width.unwrap_or(0),
        height: video_stream.height.unwrap_or(0),
        fps: parse_frame_rate(video_stream.r_frame_rate.as_deref().unwrap_or("0/0")),
        bitrate: probe
            .format
            .bit_rate
            .as_deref()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        codec: video_stream.codec_name.clone().unwrap_or_default(),
        format: probe.format.format_name.clone().unwrap_or_default(),
        size_mb,
    })
}

/// 解析 ffprobe 的分数帧率（例如 30000/1001）
fn parse_frame_rate(raw: &str) -> f64 {
    match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().unwrap_or(0.0);
            let den: f64 = den.parse().unwrap_or(0.0);
            if den > 0.0 {
                num / den
            } else {
                0.0
            }
        }
        None => raw.parse().unwrap_or(0.0),
    }
}

/// 解析 scene 滤镜 metadata=mode=print 的输出
///
/// 输出成对出现：
/// ```text
/// frame:12   pts:614   pts_time:2.456
/// lavfi.scene_score=0.428
/// ```
fn parse_scene_metadata(content: &str) -> Vec<SceneChange> {
    let pts_re = Regex::new(r"pts_time:(\d+\.?\d*)").unwrap();
    let frame_re = Regex::new(r"frame:(\d+)").unwrap();
    let score_re = Regex::new(r"scene_score=(\d+\.?\d*)").unwrap();

    let lines: Vec<&str> = content.lines().collect();
    let mut changes = Vec::new();
    let mut i = 0;
    while i + 1 < lines.len() {
        let frame_line = lines[i];
        let score_line = lines[i + 1];
        let timestamp = pts_re
            .captures(frame_line)
            .and_then(|c| c[1].parse::<f64>().ok());
        let frame_number = frame_re
            .captures(frame_line)
            .and_then(|c| c[1].parse::<u64>().ok());
        let scene_score = score_re
            .captures(score_line)
            .and_then(|c| c[1].parse::<f64>().ok());
        if let (Some(timestamp), Some(frame_number), Some(scene_score)) =
            (timestamp, frame_number, scene_score)
        {
            changes.push(SceneChange {
                timestamp,
                frame_number,
                scene_score,
            });
        }
        i += 2;
    }
    changes
}

fn ensure_video_exists(video_path: &Path) -> Result<(), ProcessingError> {
    if !video_path.exists() {
        return Err(ProcessingError::VideoNotFound(video_path.to_path_buf()));
    }
    Ok(())
}

fn command_failed(tool: &'static str, output: &Output) -> ProcessingError {
    ProcessingError::CommandFailed {
        tool,
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_scene_metadata_reads_timestamp_pairs() {
        let content = "frame:120  pts:61440 pts_time:2.56\n\
                       lavfi.scene_score=0.428\n\
                       frame:301  pts:154112 pts_time:6.421\n\
                       lavfi.scene_score=0.917\n";
        let changes = parse_scene_metadata(content);
        assert_eq!(changes.len(), 2);
        assert!((changes[0].timestamp - 2.56).abs() < 1e-9);
        assert_eq!(changes[0].frame_number, 120);
        assert!((changes[1].scene_score - 0.917).abs() < 1e-9);
    }

    #[test]
    fn parse_scene_metadata_accepts_empty_dump() {
        assert!(parse_scene_metadata("").is_empty());
    }

    #[test]
    fn parse_frame_rate_handles_fractions() {
        assert!((parse_frame_rate("30000/1001") - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("25/1") - 25.0).abs() < 1e-9);
        assert_eq!(parse_frame_rate("0/0"), 0.0);
    }

    #[test]
    fn build_metadata_picks_video_stream() {
        let json = r#"{
            "format": { "duration": "10.5", "bit_rate": "1200000", "format_name": "mov,mp4" },
            "streams": [
                { "codec_type": "audio", "codec_name": "aac" },
                { "codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080, "r_frame_rate": "30/1" }
            ]
        }"#;
        let probe: ProbeOutput = serde_json::from_str(json).unwrap();
        let metadata = build_metadata(probe, 4.2).unwrap();
        assert!((metadata.duration - 10.5).abs() < 1e-9);
        assert_eq!(metadata.width, 1920);
        assert_eq!(metadata.codec, "h264");
        assert!((metadata.fps - 30.0).abs() < 1e-9);
    }

    #[test]
    fn build_metadata_rejects_audio_only_input() {
        let json = r#"{
            "format": { "duration": "3.0" },
            "streams": [ { "codec_type": "audio", "codec_name": "mp3" } ]
        }"#;
        let probe: ProbeOutput = serde_json::from_str(json).unwrap();
        assert!(matches!(
            build_metadata(probe, 1.0),
            Err(ProcessingError::NoVideoStream)
        ));
    }
}
