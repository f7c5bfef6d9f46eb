use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Local two-pass voice cloning (base TTS + tone converter).
    Local,
    /// Voice-cloning web UI driven through a WebDriver endpoint.
    CloneSite,
    /// Prebuilt character-voice catalog, same automation.
    CatalogSite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlideSide {
    Left,
    Right,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterSpec {
    pub name: String,
    pub aliases: Vec<String>,
    pub image: PathBuf,
    pub sample: PathBuf,
    pub embedding: Option<PathBuf>,
    pub catalog_voice: Option<String>,
    pub side: SlideSide,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cast {
    pub characters: Vec<CharacterSpec>,
}

impl Cast {
    pub fn get(&self, idx: usize) -> &CharacterSpec {
        &self.characters[idx]
    }

    /// Case-insensitive match of a speaker label against the roster.
    pub fn match_speaker(&self, label: &str) -> Option<usize> {
        let label = label.trim().to_lowercase();
        self.characters.iter().position(|c| {
            c.name.to_lowercase() == label
                || c.aliases.iter().any(|a| a.to_lowercase() == label)
        })
    }
}

impl Default for Cast {
    fn default() -> Self {
        Cast {
            characters: vec![
                CharacterSpec {
                    name: "Peter".to_string(),
                    aliases: vec!["peter".to_string(), "peter griffin".to_string()],
                    image: PathBuf::from("peter.png"),
                    sample: PathBuf::from("peter_clone.mp3"),
                    embedding: None,
                    catalog_voice: Some("Peter Griffin".to_string()),
                    side: SlideSide::Left,
                },
                CharacterSpec {
                    name: "Stewie".to_string(),
                    aliases: vec!["stewie".to_string(), "stewie griffin".to_string()],
                    image: PathBuf::from("stewie.png"),
                    sample: PathBuf::from("stewie_clone.mp3"),
                    embedding: None,
                    catalog_voice: Some("Stewie Griffin".to_string()),
                    side: SlideSide::Right,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub endpoint: String,
    pub country: String,
    pub page_size: u32,
    pub min_paragraph_chars: usize,
}

impl Default for NewsConfig {
    fn default() -> Self {
        NewsConfig {
            endpoint: "https://newsapi.org/v2/top-headlines".to_string(),
            country: "us".to_string(),
            page_size: 5,
            min_paragraph_chars: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    pub endpoint: String,
    pub model: String,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        ScriptConfig {
            endpoint: "https://api.mistral.ai/v1/chat/completions".to_string(),
            model: "mistral-medium".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub backend: BackendKind,
    pub webdriver_url: String,
    pub headless: bool,
    pub clone_site_url: String,
    pub catalog_site_url: String,
    pub element_deadline_secs: u64,
    pub download_deadline_secs: u64,
    pub poll_interval_ms: u64,
    pub base_tts_program: String,
    pub base_tts_model: PathBuf,
    pub converter_program: String,
    pub converter_checkpoint: PathBuf,
    pub language: String,
}

impl Default for TtsConfig {
    fn default() -> Self {
        TtsConfig {
            backend: BackendKind::CloneSite,
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            clone_site_url: "https://nicevoice.org".to_string(),
            catalog_site_url: "https://nicevoice.org/ai-voices".to_string(),
            element_deadline_secs: 30,
            download_deadline_secs: 90,
            poll_interval_ms: 500,
            base_tts_program: "piper".to_string(),
            base_tts_model: PathBuf::from("./tts/en_US-amy-medium.onnx"),
            converter_program: "openvoice".to_string(),
            converter_checkpoint: PathBuf::from("./checkpoints_v2/converter"),
            language: "EN".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    pub frame_width: u32,
    pub frame_height: u32,
    pub fps: u32,
    pub fade_secs: f64,
    pub slide_secs: f64,
    pub overlay_margin: u32,
    pub character_frac: f64,
    pub caption_bottom: u32,
    pub words_per_phrase: usize,
    pub wrap_chars: usize,
    pub font_px: u32,
    pub stroke_px: u32,
    pub font_paths: Vec<PathBuf>,
}

impl Default for StyleConfig {
    fn default() -> Self {
        StyleConfig {
            frame_width: 1080,
            frame_height: 1920,
            fps: 24,
            fade_secs: 0.2,
            slide_secs: 0.5,
            overlay_margin: 30,
            character_frac: 0.25,
            caption_bottom: 120,
            words_per_phrase: 7,
            wrap_chars: 60,
            font_px: 48,
            stroke_px: 3,
            font_paths: vec![
                PathBuf::from("/usr/share/fonts/truetype/msttcorefonts/Impact.ttf"),
                PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf"),
                PathBuf::from("/Library/Fonts/Impact.ttf"),
                PathBuf::from("C:\\Windows\\Fonts\\impact.ttf"),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    pub background: PathBuf,
    pub out: PathBuf,
    pub temp_dir: PathBuf,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        AssetsConfig {
            background: PathBuf::from("bg.mp4"),
            out: PathBuf::from("newstoon.mp4"),
            temp_dir: PathBuf::from("temp_audio"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub news: NewsConfig,
    pub script: ScriptConfig,
    pub tts: TtsConfig,
    pub style: StyleConfig,
    pub assets: AssetsConfig,
    pub cast: Cast,
}

impl Config {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Config> {
        match path {
            Some(p) => {
                let data = fs::read_to_string(p)?;
                let cfg = serde_json::from_str(&data)?;
                Ok(cfg)
            }
            None => Ok(Config::default()),
        }
    }
}
