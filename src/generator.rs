use std::fs;
use std::path::Path;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
    CreateChatCompletionRequestArgs, ImageUrlArgs,
};
use async_openai::Client;
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::GenericImageView;
use regex::Regex;
use tracing::{info, warn};

use crate::config::GeneratorConfig;
use crate::error::GenerationError;
use crate::selection::FrameInput;

/// 推理请求中图片的最长边（像素），超过则等比缩小以控制请求体积
const MAX_IMAGE_EDGE: u32 = 768;

/// 口述脚本的叙述风格
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrationStyle {
    Serious,
    Funny,
    Dramatic,
    Educational,
    Neutral,
}

impl NarrationStyle {
    /// 解析用户输入
    ///
    /// 风格只是语气提示，无法识别的值回退为 neutral 并告警，不视为错误。
    pub fn from_input(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "serious" => Self::Serious,
            "funny" => Self::Funny,
            "dramatic" => Self::Dramatic,
            "educational" => Self::Educational,
            "neutral" => Self::Neutral,
            other => {
                warn!("⚠️  未识别的叙述风格 \"{}\"，回退为 neutral", other);
                Self::Neutral
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Serious => "serious",
            Self::Funny => "funny",
            Self::Dramatic => "dramatic",
            Self::Educational => "educational",
            Self::Neutral => "neutral",
        }
    }

    /// 对应的中文语气要求
    fn instructions(&self) -> &'static str {
        match self {
            Self::Serious => "保持严肃、专业的语调，避免幽默或轻松的表达。",
            Self::Funny => "使用轻松、幽默的语调，可以适当添加有趣的描述。",
            Self::Dramatic => "使用戏剧性的语调，强调情感和氛围。",
            Self::Educational => "使用教育性的语调，注重解释和说明。",
            Self::Neutral => "使用中性、平衡的语调。",
        }
    }
}

/// 口述脚本的目标观众
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetAudience {
    Children,
    Adults,
    Elderly,
    General,
}

impl TargetAudience {
    /// 解析用户输入，无法识别的值回退为 general 并告警
    pub fn from_input(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "children" => Self::Children,
            "adults" => Self::Adults,
            "elderly" => Self::Elderly,
            "general" => Self::General,
            other => {
                warn!("⚠️  未识别的目标观众 \"{}\"，回退为 general", other);
                Self::General
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Children => "children",
            Self::Adults => "adults",
            Self::Elderly => "elderly",
            Self::General => "general",
        }
    }

    fn instructions(&self) -> &'static str {
        match self {
            Self::Children => {
                "使用简单易懂的词汇，避免复杂概念，保持积极、快乐的氛围，使用温暖的语调。"
            }
            Self::Adults => "可以使用更丰富的词汇和概念，适合成年人的理解水平。",
            Self::Elderly => "使用清晰、缓慢的描述，避免快速变化的场景描述，保持温和的语调。",
            Self::General => "使用适合一般观众的平衡语调。",
        }
    }
}

/// 将所有选中帧放入同一次推理请求，生成按时间顺序的口述脚本
///
/// 帧列表为空属于调用方错误，在任何网络调用之前直接失败；
/// 该函数本身不做重试。
pub async fn generate_script(
    config: &GeneratorConfig,
    frames: &[FrameInput],
    style: NarrationStyle,
    audience: TargetAudience,
) -> Result<String, GenerationError> {
    if frames.is_empty() {
        return Err(GenerationError::EmptySelection);
    }

    let mut parts: Vec<ChatCompletionRequestUserMessageContentPart> =
        Vec::with_capacity(frames.len() * 2 + 1);
    parts.push(ChatCompletionRequestUserMessageContentPart::Text(
        ChatCompletionRequestMessageContentPartTextArgs::default()
            .text(build_prompt(style, audience))
            .build()?,
    ));
    for frame in frames {
        parts.push(ChatCompletionRequestUserMessageContentPart::ImageUrl(
            ChatCompletionRequestMessageContentPartImageArgs::default()
                .image_url(
                    ImageUrlArgs::default()
                        .url(encode_frame(&frame.image_path)?)
                        .build()?,
                )
                .build()?,
        ));
        parts.push(ChatCompletionRequestUserMessageContentPart::Text(
            ChatCompletionRequestMessageContentPartTextArgs::default()
                .text(format!("\n[Frame at {}]", frame.timestamp))
                .build()?,
        ));
    }

    let request = CreateChatCompletionRequestArgs::default()
        .model(&config.model)
        .max_tokens(config.max_tokens)
        .messages([ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(ChatCompletionRequestUserMessageContent::Array(parts))
                .build()?,
        )])
        .build()?;

    info!(
        "📤 [脚本生成] 正在发送 {} 帧进行分析（风格: {}，观众: {}）...",
        frames.len(),
        style.as_str(),
        audience.as_str()
    );

    let mut openai_config = OpenAIConfig::new().with_api_key(&config.api_key);
    if let Some(base) = &config.api_base {
        openai_config = openai_config.with_api_base(base);
    }
    let client = Client::with_config(openai_config);

    let response = tokio::time::timeout(
        Duration::from_secs(config.timeout_secs),
        client.chat().create(request),
    )
    .await
    .map_err(|_| GenerationError::Timeout(config.timeout_secs))??;

    let narration = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|text| text.trim().to_string())
        .ok_or(GenerationError::EmptyResponse)?;
    if narration.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }

    info!(
        "📥 [脚本生成] 已收到口述脚本（{} 字符）",
        narration.chars().count()
    );
    Ok(narration)
}

/// 将口述文本重排为带时间戳标记的逐条格式
///
/// 纯文本变换，不发起新的推理请求：识别 "HH:MM:SS: 描述" 或
/// "HH:MM:SS.mmm：描述" 形式的行，重写为 "[HH:MM:SS] 描述"，其余行原样保留。
pub fn format_timestamped_script(narration: &str) -> String {
    let line_re =
        Regex::new(r"^\s*[-*]?\s*(\d{2}:\d{2}:\d{2}(?:\.\d{1,3})?)\s*[:：]\s*(.+)$").unwrap();
    narration
        .lines()
        .map(|line| match line_re.captures(line) {
            Some(caps) => format!("[{}] {}", &caps[1], caps[2].trim()),
            None => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 将口述脚本写入文本文件，带有视频名、风格、观众的头部信息
pub fn save_script(
    path: &Path,
    video_name: &str,
    style: NarrationStyle,
    audience: TargetAudience,
    narration: &str,
) -> std::io::Result<()> {
    let mut content = String::new();
    content.push_str(&format!("视频故事分析: {}\n", video_name));
    content.push_str(&format!("电影风格: {}\n", style.as_str()));
    content.push_str(&format!("目标观众: {}\n", audience.as_str()));
    content.push_str(&"=".repeat(80));
    content.push_str("\n\n个性化时间戳描述\n");
    content.push_str(&"-".repeat(40));
    content.push('\n');
    content.push_str(narration);
    content.push('\n');
    fs::write(path, content)
}

fn build_prompt(style: NarrationStyle, audience: TargetAudience) -> String {
    format!(
        "你正在分析一系列讲述故事的视频帧。\n\n\
         请检查所有帧并创建一系列简洁但富有情感和全面的描述，这些描述可以在特定的时间间隔内进行语音播报。\n\n\
         电影风格：{style}\n\
         目标观众：{audience}\n\n\
         要求：\n\
         1. 为每一帧创建简洁但富有情感和全面的描述，可以在几秒钟内说完\n\
         2. 在每个描述的开头包含时间戳（例如：\"00:00:15: 显示了一张海报...\"）\n\
         3. 专注于事实观察 - 描述你看到的内容（物体、颜色、位置、动作）\n\
         4. 保持每个描述简短明了 - 适合音频叙述\n\
         5. 以清晰、按时间顺序的方式编写，适合视障观众\n\
         6. 每个描述应该足够短，可以在其代表的时间间隔内说完\n\
         7. 所有的描述连在一起应该是具有一定的故事性\n\
         8. 请用中文回答\n\n\
         风格要求：\n\
         - {style_instructions}\n\
         - {audience_instructions}\n\n\
         请将你的回答格式化为一系列时间戳描述，每个帧一个描述。",
        style = style.as_str(),
        audience = audience.as_str(),
        style_instructions = style.instructions(),
        audience_instructions = audience.instructions(),
    )
}

/// 读取帧图片，必要时等比缩小，再编码为 base64 data URL
fn encode_frame(path: &Path) -> Result<String, GenerationError> {
    let image = image::open(path).map_err(|source| GenerationError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    let (width, height) = image.dimensions();
    let image = if width.max(height) > MAX_IMAGE_EDGE {
        image.resize(
            MAX_IMAGE_EDGE,
            MAX_IMAGE_EDGE,
            image::imageops::FilterType::Triangle,
        )
    } else {
        image
    };

    let rgb = image.to_rgb8();
    let mut jpeg_data = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg_data, 85);
    encoder
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), image::ColorType::Rgb8)
        .map_err(|source| GenerationError::Image {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(format!(
        "data:image/jpeg;base64,{}",
        BASE64_STANDARD.encode(jpeg_data)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> GeneratorConfig {
        GeneratorConfig {
            api_key: "test-key".to_string(),
            api_base: None,
            model: "gpt-4o-mini".to_string(),
            max_tokens: 16,
            timeout_secs: 1,
        }
    }

    #[test]
    fn unrecognized_style_falls_back_to_neutral() {
        assert_eq!(NarrationStyle::from_input("whimsical"), NarrationStyle::Neutral);
        assert_eq!(NarrationStyle::from_input("DRAMATIC"), NarrationStyle::Dramatic);
        assert_eq!(TargetAudience::from_input("teenagers"), TargetAudience::General);
        assert_eq!(TargetAudience::from_input("Elderly"), TargetAudience::Elderly);
    }

    #[tokio::test]
    async fn empty_selection_fails_before_any_network_call() {
        let result = generate_script(
            &test_config(),
            &[],
            NarrationStyle::Neutral,
            TargetAudience::General,
        )
        .await;
        assert!(matches!(result, Err(GenerationError::EmptySelection)));
    }

    #[test]
    fn prompt_carries_style_and_audience_instructions() {
        let prompt = build_prompt(NarrationStyle::Serious, TargetAudience::Children);
        assert!(prompt.contains("电影风格：serious"));
        assert!(prompt.contains("目标观众：children"));
        assert!(prompt.contains("保持严肃、专业的语调"));
        assert!(prompt.contains("使用简单易懂的词汇"));
    }

    #[test]
    fn timestamped_reformat_brackets_each_entry() {
        let narration = "00:00:05: 一位老人走进画面。\n\
                         00:00:07.500：远处的灯光亮起。\n\
                         这是一行没有时间戳的总结。";
        let formatted = format_timestamped_script(narration);
        assert_eq!(
            formatted,
            "[00:00:05] 一位老人走进画面。\n\
             [00:00:07.500] 远处的灯光亮起。\n\
             这是一行没有时间戳的总结。"
        );
    }
}
