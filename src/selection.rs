use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::GenerationError;

/// 选帧页面导出的一条勾选记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedFrame {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub frame_file: String,
}

/// 送入脚本生成的一帧（时间戳 + 图片路径）
#[derive(Debug, Clone)]
pub struct FrameInput {
    pub timestamp: String,
    pub image_path: PathBuf,
}

/// 读取选帧 JSON 文件
pub fn load_selection(path: &Path) -> Result<Vec<SelectedFrame>, GenerationError> {
    let content = fs::read_to_string(path).map_err(|e| GenerationError::InvalidSelection {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| GenerationError::InvalidSelection {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// 将勾选记录解析为生成输入
///
/// 字段缺失或图片文件不存在的记录会被跳过并告警，不会中断整个流程；
/// 顺序保持调用方给出的顺序。
pub fn resolve_frames(selection: &[SelectedFrame], frames_dir: &Path) -> Vec<FrameInput> {
    let mut frames = Vec::new();
    for entry in selection {
        if entry.timestamp.is_empty() || entry.frame_file.is_empty() {
            warn!("⚠️  跳过字段缺失的勾选记录: {:?}", entry);
            continue;
        }
        let image_path = frames_dir.join(&entry.frame_file);
        if !image_path.exists() {
            warn!("⚠️  帧文件不存在，跳过: {}", image_path.display());
            continue;
        }
        frames.push(FrameInput {
            timestamp: entry.timestamp.clone(),
            image_path,
        });
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_json_round_trip() {
        let json = r#"[
            { "timestamp": "00:00:05.000", "frame_file": "frame_0011.jpg" },
            { "timestamp": "00:00:07.500", "frame_file": "frame_0016.jpg" }
        ]"#;
        let selection: Vec<SelectedFrame> = serde_json::from_str(json).unwrap();
        assert_eq!(selection.len(), 2);
        assert_eq!(selection[0].frame_file, "frame_0011.jpg");
        assert_eq!(selection[1].timestamp, "00:00:07.500");
    }

    #[test]
    fn incomplete_entries_are_skipped() {
        let dir = std::env::temp_dir().join(format!("video-narrate-test-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("frame_0001.jpg"), b"jpg").unwrap();

        let selection = vec![
            SelectedFrame {
                timestamp: "00:00:00.000".to_string(),
                frame_file: "frame_0001.jpg".to_string(),
            },
            SelectedFrame {
                timestamp: String::new(),
                frame_file: "frame_0002.jpg".to_string(),
            },
            SelectedFrame {
                timestamp: "00:00:01.000".to_string(),
                frame_file: "missing.jpg".to_string(),
            },
        ];
        let frames = resolve_frames(&selection, &dir);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].timestamp, "00:00:00.000");

        fs::remove_dir_all(&dir).unwrap();
    }
}
