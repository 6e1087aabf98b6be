use std::env;
use std::path::{Path, PathBuf};

use configparser::ini::Ini;
use tracing::warn;

use crate::error::GenerationError;
use crate::organizer::OrganizeConfig;

/// 脚本生成配置
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// OpenAI 兼容接口的 API Key
    pub api_key: String,
    /// 自定义接口地址（可选）
    pub api_base: Option<String>,
    /// 模型名称
    pub model: String,
    /// 生成上限 token 数
    pub max_tokens: u32,
    /// 推理调用超时（秒）
    pub timeout_secs: u64,
}

/// 配置加载器
///
/// 优先级：命令行参数 > 环境变量 > 配置文件 > 默认值。
/// 配置文件为 .ini 格式，默认依次探测当前目录的 video-narrate.ini、
/// .video-narrate.ini、用户主目录的 .video-narrate.ini 和 /etc/video-narrate.ini。
pub struct ConfigLoader;

impl ConfigLoader {
    /// 加载帧组织配置
    pub fn load_organize_config(
        config_file: Option<&Path>,
        fps: Option<f64>,
        scene_threshold: Option<f64>,
    ) -> OrganizeConfig {
        let file = Self::load_file(config_file);
        let defaults = OrganizeConfig::default();

        OrganizeConfig {
            fps: fps
                .or_else(|| env_parse("VIDEO_NARRATE_FPS"))
                .or_else(|| file_parse(&file, "video_narrate", "fps"))
                .unwrap_or(defaults.fps),
            scene_threshold: scene_threshold
                .or_else(|| env_parse("VIDEO_NARRATE_THRESHOLD"))
                .or_else(|| file_parse(&file, "video_narrate", "scene_threshold"))
                .unwrap_or(defaults.scene_threshold),
        }
    }

    /// 加载脚本生成配置；API Key 缺失时返回错误
    ///
    /// 凭证只从环境变量（含 .env）读取，不写入配置文件。
    pub fn load_generator_config(
        config_file: Option<&Path>,
    ) -> Result<GeneratorConfig, GenerationError> {
        let file = Self::load_file(config_file);

        let api_key = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or(GenerationError::MissingApiKey)?;
        let api_base = env::var("OPENAI_BASE_URL").ok().filter(|v| !v.is_empty());

        Ok(GeneratorConfig {
            api_key,
            api_base,
            model: env::var("VIDEO_NARRATE_MODEL")
                .ok()
                .filter(|v| !v.is_empty())
                .or_else(|| file_get(&file, "generator", "model"))
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            max_tokens: env_parse("VIDEO_NARRATE_MAX_TOKENS")
                .or_else(|| file_parse(&file, "generator", "max_tokens"))
                .unwrap_or(16000),
            timeout_secs: env_parse("VIDEO_NARRATE_TIMEOUT")
                .or_else(|| file_parse(&file, "generator", "timeout_secs"))
                .unwrap_or(300),
        })
    }

    fn load_file(config_file: Option<&Path>) -> Option<Ini> {
        let path = match config_file {
            Some(path) => path.to_path_buf(),
            None => Self::default_location()?,
        };
        let mut ini = Ini::new();
        match ini.load(&path) {
            Ok(_) => Some(ini),
            Err(e) => {
                warn!("⚠️  读取配置文件失败: {}: {}", path.display(), e);
                None
            }
        }
    }

    /// 依次探测默认配置文件位置
    fn default_location() -> Option<PathBuf> {
        let mut candidates = vec![
            PathBuf::from("video-narrate.ini"),
            PathBuf::from(".video-narrate.ini"),
        ];
        if let Some(home) = env::var_os("HOME") {
            candidates.push(PathBuf::from(home).join(".video-narrate.ini"));
        }
        candidates.push(PathBuf::from("/etc/video-narrate.ini"));
        candidates.into_iter().find(|path| path.exists())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn file_get(file: &Option<Ini>, section: &str, key: &str) -> Option<String> {
    let ini = file.as_ref()?;
    ini.get(section, key)
        .or_else(|| ini.get("DEFAULT", key))
        .filter(|v| !v.is_empty())
}

fn file_parse<T: std::str::FromStr>(file: &Option<Ini>, section: &str, key: &str) -> Option<T> {
    file_get(file, section, key).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_apply_without_file_or_overrides() {
        let config = ConfigLoader::load_organize_config(None, None, None);
        assert!((config.fps - 2.0).abs() < 1e-9);
        assert!((config.scene_threshold - 0.3).abs() < 1e-9);
    }

    #[test]
    fn cli_arguments_override_config_file() {
        let dir = std::env::temp_dir().join(format!("video-narrate-test-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let ini_path = dir.join("video-narrate.ini");
        fs::write(
            &ini_path,
            "[video_narrate]\nfps = 1.0\nscene_threshold = 0.5\n",
        )
        .unwrap();

        let from_file = ConfigLoader::load_organize_config(Some(&ini_path), None, None);
        assert!((from_file.fps - 1.0).abs() < 1e-9);
        assert!((from_file.scene_threshold - 0.5).abs() < 1e-9);

        let overridden = ConfigLoader::load_organize_config(Some(&ini_path), Some(4.0), None);
        assert!((overridden.fps - 4.0).abs() < 1e-9);
        assert!((overridden.scene_threshold - 0.5).abs() < 1e-9);

        fs::remove_dir_all(&dir).unwrap();
    }
}
