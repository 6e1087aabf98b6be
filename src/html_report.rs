use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

use chrono::Local;

use crate::metadata::FrameRecord;

/// 生成静态选帧页面
///
/// 每行对应帧表格的一行（序号、时间戳、场景、缩略图、勾选框），页面内的
/// 提交按钮把勾选结果导出为 `<视频名>_selected_frames.json`，供脚本生成使用。
pub fn write_selection_page(
    path: &Path,
    video_name: &str,
    records: &[FrameRecord],
) -> io::Result<()> {
    fs::write(path, render_selection_page(video_name, records))
}

fn render_selection_page(video_name: &str, records: &[FrameRecord]) -> String {
    let generated_at = Local::now().format("%Y-%m-%d %H:%M:%S");

    let mut page = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Frame Table - {video_name}</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 20px; }}
        table {{ border-collapse: collapse; width: 100%; }}
        th, td {{ border: 1px solid #ddd; padding: 8px; text-align: left; }}
        th {{ background-color: #f2f2f2; }}
        .frame-image {{ max-width: 120px; max-height: 90px; }}
        .centered {{ text-align: center; }}
        .submit-btn {{ margin-top: 20px; padding: 10px 20px; font-size: 16px; }}
    </style>
</head>
<body>
    <h1>Frame Table - {video_name}</h1>
    <p>Generated on: {generated_at}</p>
    <form id="frameForm" onsubmit="return false;">
    <table>
        <thead>
            <tr>
                <th>#</th>
                <th>Timestamp</th>
                <th>Scene</th>
                <th>Frame Image</th>
                <th class="centered">Select</th>
            </tr>
        </thead>
        <tbody>
"#
    );

    for record in records {
        let _ = write!(
            page,
            r#"            <tr>
                <td>{index}</td>
                <td>{timestamp}</td>
                <td>{scene}</td>
                <td><img src="{thumbnail}" class="frame-image" alt="Frame at {timestamp}"></td>
                <td class="centered"><input type="checkbox" class="frame-checkbox" data-timestamp="{timestamp}" data-frame="{frame_file}"></td>
            </tr>
"#,
            index = record.index,
            timestamp = record.timestamp,
            scene = record.scene,
            thumbnail = thumbnail_src(record),
            frame_file = record.frame_file,
        );
    }

    page.push_str(
        r#"        </tbody>
    </table>
    <button class="submit-btn" onclick="downloadSelectedFrames()">Submit</button>
    </form>
    <script>
    function downloadSelectedFrames() {
        const checkboxes = document.querySelectorAll('.frame-checkbox:checked');
        const selected = [];
        checkboxes.forEach(cb => {
            selected.push({
                timestamp: cb.getAttribute('data-timestamp'),
                frame_file: cb.getAttribute('data-frame')
            });
        });
        const blob = new Blob([JSON.stringify(selected, null, 2)], {type: 'application/json'});
        const url = URL.createObjectURL(blob);
        const a = document.createElement('a');
        a.href = url;
"#,
    );
    let _ = write!(
        page,
        "        a.download = '{video_name}_selected_frames.json';\n"
    );
    page.push_str(
        r#"        document.body.appendChild(a);
        a.click();
        document.body.removeChild(a);
        URL.revokeObjectURL(url);
    }
    </script>
</body>
</html>
"#,
    );

    page
}

/// 页面与帧目录位于同一输出目录下，缩略图用相对路径引用
fn thumbnail_src(record: &FrameRecord) -> String {
    Path::new(&record.frame_path)
        .parent()
        .and_then(Path::file_name)
        .map(|dir| format!("{}/{}", dir.to_string_lossy(), record.frame_file))
        .unwrap_or_else(|| record.frame_path.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(index: usize) -> FrameRecord {
        FrameRecord {
            index,
            timestamp: format!("00:00:0{}.000", index),
            time_seconds: index as f64,
            scene: 0,
            scene_score: 0.0,
            frame_file: format!("frame_{:04}.jpg", index + 1),
            frame_path: format!("demo_extracted_frames/frame_{:04}.jpg", index + 1),
        }
    }

    #[test]
    fn page_contains_one_checkbox_per_frame() {
        let page = render_selection_page("demo", &[record(0), record(1), record(2)]);
        assert_eq!(page.matches("frame-checkbox").count(), 4); // 3 行 + querySelectorAll 选择器
        assert!(page.contains("frame_0002.jpg"));
        assert!(page.contains("Frame Table - demo"));
    }

    #[test]
    fn thumbnails_stay_relative_to_the_page() {
        let mut with_prefix = record(0);
        with_prefix.frame_path = "out/demo_extracted_frames/frame_0001.jpg".to_string();
        let page = render_selection_page("demo", &[with_prefix]);
        assert!(page.contains(r#"src="demo_extracted_frames/frame_0001.jpg""#));
        assert!(!page.contains(r#"src="out/"#));
    }

    #[test]
    fn export_targets_the_video_selection_file() {
        let page = render_selection_page("movie1", &[record(0)]);
        assert!(page.contains("a.download = 'movie1_selected_frames.json';"));
        assert!(page.contains("downloadSelectedFrames()"));
    }
}
