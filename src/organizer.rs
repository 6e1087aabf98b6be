use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::OrganizationError;
use crate::html_report;
use crate::metadata::{FrameRecord, SceneChange};
use crate::video_processor::VideoProcessor;

/// 帧组织配置
#[derive(Debug, Clone)]
pub struct OrganizeConfig {
    /// 帧采样率（每秒提取多少帧）
    pub fps: f64,
    /// 场景变化检测阈值 (0.0-1.0)，值越大越不敏感
    pub scene_threshold: f64,
}

impl Default for OrganizeConfig {
    fn default() -> Self {
        Self {
            fps: 2.0,
            scene_threshold: 0.3,
        }
    }
}

/// 帧组织结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizeResult {
    /// 输入视频路径
    pub video_path: String,
    /// 总帧数
    pub total_frames: usize,
    /// 总场景数
    pub total_scenes: usize,
    /// CSV 帧表格路径
    pub csv_file: PathBuf,
    /// HTML 选帧页面路径
    pub html_file: PathBuf,
    /// 帧图片目录
    pub frames_dir: PathBuf,
}

/// 帧组织响应
///
/// 组织失败不会向调用方抛出异常，而是以 success=false 加错误信息返回。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizeResponse {
    pub success: bool,
    pub message: String,
    pub result: Option<OrganizeResult>,
}

/// 组织视频帧：提取帧、计算时间戳、划分场景，输出 CSV 表格和 HTML 选帧页面
pub fn organize_frames(
    video_path: &Path,
    output_root: Option<&Path>,
    config: &OrganizeConfig,
) -> OrganizeResponse {
    match run_organize(video_path, output_root, config) {
        Ok(result) => OrganizeResponse {
            success: true,
            message: format!(
                "共 {} 帧，{} 个场景",
                result.total_frames, result.total_scenes
            ),
            result: Some(result),
        },
        Err(e) => {
            error!("❌ [帧组织] 组织失败: {}", e);
            OrganizeResponse {
                success: false,
                message: e.to_string(),
                result: None,
            }
        }
    }
}

fn run_organize(
    video_path: &Path,
    output_root: Option<&Path>,
    config: &OrganizeConfig,
) -> Result<OrganizeResult, OrganizationError> {
    let total_start = Instant::now();
    info!("🎬 [帧组织] 开始组织视频帧: {}", video_path.display());

    let stem = video_stem(video_path);
    let output_root = output_root
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&output_root)?;
    let frames_dir = output_root.join(format!("{stem}_extracted_frames"));

    let processor = VideoProcessor::new()?;

    // 1. 提取帧
    let extract_start = Instant::now();
    info!("⏳ [帧组织] 正在提取视频帧（采样率: {:.1} fps）...", config.fps);
    let frame_paths = processor.extract_frames(video_path, config.fps, &frames_dir)?;
    if frame_paths.is_empty() {
        return Err(OrganizationError::NoFrames);
    }
    info!(
        "✅ [帧组织] 提取视频帧完成，耗时: {:.2}秒",
        extract_start.elapsed().as_secs_f64()
    );
    info!("  • 提取帧数: {} 帧", frame_paths.len());

    // 2. 检测场景变化
    let scene_start = Instant::now();
    info!(
        "⏳ [帧组织] 正在检测场景变化（阈值: {:.2}）...",
        config.scene_threshold
    );
    let scene_changes = processor.detect_scene_changes(video_path, config.scene_threshold)?;
    info!(
        "✅ [帧组织] 场景检测完成，耗时: {:.2}秒",
        scene_start.elapsed().as_secs_f64()
    );
    info!("  • 检测到场景变化: {} 处", scene_changes.len());

    // 3. 计算时间戳并划分场景
    let records = build_frame_records(&frame_paths, config.fps, &scene_changes);
    let total_scenes = records.last().map(|r| r.scene + 1).unwrap_or(0);

    // 4. 输出 CSV 表格
    let csv_file = output_root.join(format!("{stem}_frame_table.csv"));
    write_csv(&csv_file, &records)?;
    info!("📊 [帧组织] 帧表格已保存: {}", csv_file.display());

    // 5. 输出 HTML 选帧页面
    let html_file = output_root.join(format!("{stem}_frame_table.html"));
    html_report::write_selection_page(&html_file, &stem, &records)?;
    info!("🌐 [帧组织] 选帧页面已保存: {}", html_file.display());

    info!(
        "🎉 [帧组织] 组织完成！总耗时: {:.2}秒",
        total_start.elapsed().as_secs_f64()
    );
    info!("  • 总帧数: {} 帧", records.len());
    info!("  • 总场景数: {} 个", total_scenes);

    Ok(OrganizeResult {
        video_path: video_path.to_string_lossy().to_string(),
        total_frames: records.len(),
        total_scenes,
        csv_file,
        html_file,
        frames_dir,
    })
}

/// 根据提取顺序为每一帧计算时间戳，并分配到最近的前序场景
pub fn build_frame_records(
    frame_paths: &[PathBuf],
    fps: f64,
    scene_changes: &[SceneChange],
) -> Vec<FrameRecord> {
    frame_paths
        .iter()
        .enumerate()
        .map(|(index, path)| {
            let time_seconds = index as f64 / fps;
            let (scene, scene_score) = assign_scene(time_seconds, scene_changes);
            FrameRecord {
                index,
                timestamp: format_timestamp(time_seconds),
                time_seconds,
                scene,
                scene_score,
                frame_file: path
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_default(),
                frame_path: path.to_string_lossy().to_string(),
            }
        })
        .collect()
}

/// 返回 (场景序号, 进入该场景时的变化得分)
///
/// 场景序号等于时间戳之前（含）出现过的变化次数；没有任何变化在前时为场景 0。
/// 变化列表按时间升序。
fn assign_scene(time_seconds: f64, scene_changes: &[SceneChange]) -> (usize, f64) {
    let mut scene = 0;
    let mut score = 0.0;
    for change in scene_changes {
        if change.timestamp <= time_seconds {
            scene += 1;
            score = change.scene_score;
        } else {
            break;
        }
    }
    (scene, score)
}

/// 将秒格式化为 HH:MM:SS.mmm
pub fn format_timestamp(seconds: f64) -> String {
    let hours = (seconds / 3600.0) as u64;
    let minutes = ((seconds % 3600.0) / 60.0) as u64;
    let secs = (seconds % 60.0) as u64;
    let millis = ((seconds % 1.0) * 1000.0) as u64;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
}

fn write_csv(path: &Path, records: &[FrameRecord]) -> Result<(), OrganizationError> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

fn video_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "video".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(count: usize) -> Vec<PathBuf> {
        (1..=count)
            .map(|i| PathBuf::from(format!("frames/frame_{:04}.jpg", i)))
            .collect()
    }

    #[test]
    fn timestamps_follow_extraction_order() {
        assert!(build_frame_records(&[], 2.0, &[]).is_empty());

        let records = build_frame_records(&paths(5), 2.0, &[]);
        assert_eq!(records.len(), 5);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.index, i);
            assert!((record.time_seconds - i as f64 / 2.0).abs() < 1e-9);
            assert_eq!(record.scene, 0);
        }
        for pair in records.windows(2) {
            assert!(pair[0].time_seconds < pair[1].time_seconds);
        }
    }

    #[test]
    fn scene_index_counts_preceding_boundaries() {
        let changes = vec![
            SceneChange {
                timestamp: 1.0,
                frame_number: 30,
                scene_score: 0.45,
            },
            SceneChange {
                timestamp: 3.0,
                frame_number: 90,
                scene_score: 0.62,
            },
        ];
        assert_eq!(assign_scene(0.5, &changes), (0, 0.0));
        // 正好落在边界上的帧属于新场景
        assert_eq!(assign_scene(1.0, &changes), (1, 0.45));
        assert_eq!(assign_scene(2.5, &changes), (1, 0.45));
        assert_eq!(assign_scene(9.0, &changes), (2, 0.62));
    }

    #[test]
    fn ten_second_video_at_two_fps_splits_into_two_scenes() {
        let changes = vec![SceneChange {
            timestamp: 5.0,
            frame_number: 150,
            scene_score: 0.5,
        }];
        let records = build_frame_records(&paths(20), 2.0, &changes);
        assert_eq!(records.len(), 20);
        assert!((records[0].time_seconds - 0.0).abs() < 1e-9);
        assert!((records[19].time_seconds - 9.5).abs() < 1e-9);
        assert!(records[..10].iter().all(|r| r.scene == 0));
        assert!(records[10..].iter().all(|r| r.scene == 1));
    }

    #[test]
    fn format_timestamp_renders_hours_minutes_seconds() {
        assert_eq!(format_timestamp(0.0), "00:00:00.000");
        assert_eq!(format_timestamp(9.5), "00:00:09.500");
        assert_eq!(format_timestamp(3661.25), "01:01:01.250");
    }

    #[test]
    fn csv_rows_mirror_records() {
        let records = build_frame_records(&paths(2), 2.0, &[]);
        let mut writer = csv::Writer::from_writer(Vec::new());
        for record in &records {
            writer.serialize(record).unwrap();
        }
        let data = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let mut lines = data.lines();
        assert_eq!(
            lines.next(),
            Some("index,timestamp,time_seconds,scene,scene_score,frame_file,frame_path")
        );
        assert!(data.contains("frame_0001.jpg"));
        assert!(data.contains("frame_0002.jpg"));
    }
}
