use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use video_narrate::config::ConfigLoader;
use video_narrate::generator::{self, NarrationStyle, TargetAudience};
use video_narrate::organizer;
use video_narrate::selection;
use video_narrate::VideoProcessor;

/// 视频口述影像工具 - 提取视频帧、组织场景表格、生成无障碍口述脚本
#[derive(Parser, Debug)]
#[command(name = "video-narrate")]
#[command(about = "视频口述影像工具：提取帧、划分场景、生成口述脚本", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 查看视频元数据（时长、分辨率、帧率、编码）
    Info {
        /// 输入视频文件路径
        #[arg(short, long)]
        input: PathBuf,
    },
    /// 检测场景变化点
    Scenes {
        /// 输入视频文件路径
        #[arg(short, long)]
        input: PathBuf,

        /// 场景变化检测阈值 (0.0-1.0)，值越大越不敏感
        /// 可通过环境变量 VIDEO_NARRATE_THRESHOLD 或配置文件设置
        #[arg(long)]
        threshold: Option<f64>,

        /// 配置文件路径（可选，.ini 格式）
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// 按固定采样率提取视频帧
    Extract {
        /// 输入视频文件路径
        #[arg(short, long)]
        input: PathBuf,

        /// 帧图片输出目录
        #[arg(short, long, default_value = "./frames")]
        output: PathBuf,

        /// 帧采样率（每秒提取多少帧）
        /// 可通过环境变量 VIDEO_NARRATE_FPS 或配置文件设置
        #[arg(long)]
        fps: Option<f64>,

        /// 配置文件路径（可选，.ini 格式）
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// 组织视频帧：提取、标注时间戳、划分场景，输出 CSV 表格和 HTML 选帧页面
    Organize {
        /// 输入视频文件路径
        #[arg(short, long)]
        input: PathBuf,

        /// 产物输出目录
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// 帧采样率（每秒提取多少帧）
        #[arg(long)]
        fps: Option<f64>,

        /// 场景变化检测阈值 (0.0-1.0)
        #[arg(long)]
        threshold: Option<f64>,

        /// 配置文件路径（可选，.ini 格式）
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// 根据选帧结果生成口述脚本
    Generate {
        /// 选帧 JSON 文件（由选帧页面导出）
        #[arg(short, long)]
        selection: PathBuf,

        /// 帧图片所在目录
        #[arg(short, long)]
        frames_dir: PathBuf,

        /// 叙述风格: serious | funny | dramatic | educational | neutral
        #[arg(long, default_value = "neutral")]
        style: String,

        /// 目标观众: children | adults | elderly | general
        #[arg(long, default_value = "general")]
        audience: String,

        /// 输出脚本文件（默认 <视频名>_storyscript.txt）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 将结果重排为带 [HH:MM:SS] 标记的逐条格式
        #[arg(long)]
        timestamped: bool,

        /// 配置文件路径（可选，.ini 格式）
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志，并加载 .env（API Key 等凭证）
    tracing_subscriber::fmt::init();
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    match args.command {
        Commands::Info { input } => {
            let processor = VideoProcessor::new().context("初始化视频处理器失败")?;
            let metadata = processor
                .get_video_metadata(&input)
                .context("读取视频元数据失败")?;
            println!("📊 视频信息:");
            println!("   时长: {:.2} 秒", metadata.duration);
            println!("   分辨率: {}x{}", metadata.width, metadata.height);
            println!("   帧率: {:.2} fps", metadata.fps);
            println!("   编码: {}", metadata.codec);
            println!("   容器格式: {}", metadata.format);
            println!("   码率: {} bps", metadata.bitrate);
            println!("   大小: {:.2} MB", metadata.size_mb);
        }
        Commands::Scenes {
            input,
            threshold,
            config,
        } => {
            let organize = ConfigLoader::load_organize_config(config.as_deref(), None, threshold);
            let processor = VideoProcessor::new().context("初始化视频处理器失败")?;
            let changes = processor
                .detect_scene_changes(&input, organize.scene_threshold)
                .context("场景检测失败")?;
            println!("🎭 检测到场景变化: {} 处", changes.len());
            for (i, change) in changes.iter().enumerate() {
                println!(
                    "   {:2}. {:6.2}s - 得分: {:.3}",
                    i + 1,
                    change.timestamp,
                    change.scene_score
                );
            }
        }
        Commands::Extract {
            input,
            output,
            fps,
            config,
        } => {
            let organize = ConfigLoader::load_organize_config(config.as_deref(), fps, None);
            let processor = VideoProcessor::new().context("初始化视频处理器失败")?;
            let frames = processor
                .extract_frames(&input, organize.fps, &output)
                .context("提取视频帧失败")?;
            println!("✅ 已提取 {} 帧到: {}", frames.len(), output.display());
        }
        Commands::Organize {
            input,
            output,
            fps,
            threshold,
            config,
        } => {
            let organize = ConfigLoader::load_organize_config(config.as_deref(), fps, threshold);
            info!(
                "使用配置: fps={:.2}, threshold={:.2}",
                organize.fps, organize.scene_threshold
            );
            let response = organizer::organize_frames(&input, Some(&output), &organize);
            if response.success {
                let result = response.result.context("组织成功但缺少结果")?;
                println!("✅ 帧组织成功！");
                println!("📊 总帧数: {}", result.total_frames);
                println!("🎭 总场景数: {}", result.total_scenes);
                println!("📄 CSV 表格: {}", result.csv_file.display());
                println!("🌐 选帧页面: {}", result.html_file.display());
                println!("📁 帧目录: {}", result.frames_dir.display());
            } else {
                anyhow::bail!("帧组织失败: {}", response.message);
            }
        }
        Commands::Generate {
            selection: selection_file,
            frames_dir,
            style,
            audience,
            output,
            timestamped,
            config,
        } => {
            let generator_config =
                ConfigLoader::load_generator_config(config.as_deref()).context("加载生成配置失败")?;
            let style = NarrationStyle::from_input(&style);
            let audience = TargetAudience::from_input(&audience);

            let selected =
                selection::load_selection(&selection_file).context("读取选帧文件失败")?;
            info!("已读取 {} 条勾选记录", selected.len());
            let frames = selection::resolve_frames(&selected, &frames_dir);

            let narration = generator::generate_script(&generator_config, &frames, style, audience)
                .await
                .context("生成口述脚本失败")?;
            let narration = if timestamped {
                generator::format_timestamped_script(&narration)
            } else {
                narration
            };

            let video_name = video_name_of(&selection_file);
            let output = output
                .unwrap_or_else(|| PathBuf::from(format!("{}_storyscript.txt", video_name)));
            generator::save_script(&output, &video_name, style, audience, &narration)
                .context("保存口述脚本失败")?;
            println!("✅ 口述脚本已保存到: {}", output.display());
        }
    }

    Ok(())
}

/// 从选帧文件名推断视频名（去掉 _selected_frames 后缀）
fn video_name_of(selection_file: &Path) -> String {
    let stem = selection_file
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "video".to_string());
    stem.strip_suffix("_selected_frames")
        .map(str::to_string)
        .unwrap_or(stem)
}
