//! 程序配置
//!
//! 优先级：默认值 → TOML 配置文件 → 环境变量 (`GDDOWN_*`) → 命令行参数

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::services::DiscoveryConfig;
use crate::utils::RetryPolicy;

/// 页面发现的默认条目上限
pub const DEFAULT_PAGE_CAP: usize = 200;

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 浏览器 ---
    /// 无头模式
    pub headless: bool,
    /// 浏览器可执行文件路径
    pub chrome_path: Option<PathBuf>,
    /// 连接已运行浏览器的调试端口，为空时自动启动
    pub debug_port: Option<u16>,
    /// 页面加载超时（秒）
    pub timeout_secs: u64,

    // --- 输出 ---
    pub output_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub log_file: PathBuf,
    pub log_level: String,
    /// JPEG 质量 (1-100)
    pub image_quality: u8,
    /// 像素到 PDF 页面尺寸的换算
    pub page_dpi: f32,
    /// 单个文档最多抓取的页数，0 表示使用默认上限
    pub max_pages: usize,

    // --- 节奏控制（毫秒）---
    pub file_delay_ms: u64,
    pub folder_file_delay_ms: u64,
    pub folder_delay_ms: u64,
    /// 打开文件夹后等待列表渲染
    pub folder_settle_ms: u64,

    // --- 发现 ---
    /// 等待首个页面出现的检测次数
    pub page_gate_retries: usize,
    pub page_gate_delay_ms: u64,
    pub probe_delay_ms: u64,
    pub page_idle_probes: usize,
    pub folder_idle_probes: usize,

    // --- 打开资源重试 ---
    pub open_retries: usize,
    pub open_retry_delay_ms: u64,
    pub open_retry_jitter_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            headless: false,
            chrome_path: None,
            debug_port: None,
            timeout_secs: 30,
            output_dir: PathBuf::from("downloads"),
            temp_dir: PathBuf::from("temp_images"),
            log_file: PathBuf::from("gdrive_pdf_downloader.log"),
            log_level: "info".to_string(),
            image_quality: 95,
            page_dpi: 96.0,
            max_pages: 0,
            file_delay_ms: 2000,
            folder_file_delay_ms: 1000,
            folder_delay_ms: 2000,
            folder_settle_ms: 3000,
            page_gate_retries: 10,
            page_gate_delay_ms: 2000,
            probe_delay_ms: 1000,
            page_idle_probes: 8,
            folder_idle_probes: 15,
            open_retries: 3,
            open_retry_delay_ms: 2000,
            open_retry_jitter_ms: 500,
        }
    }
}

impl Config {
    /// 从 TOML 文件加载，缺省字段使用默认值
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 用 `GDDOWN_*` 环境变量覆盖
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// 无法解析的值会被忽略，保留原值
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
            lookup(key).and_then(|v| v.trim().parse().ok())
        }

        if let Some(v) = parsed(&lookup, "GDDOWN_HEADLESS") {
            self.headless = v;
        }
        if let Some(v) = lookup("GDDOWN_CHROME") {
            self.chrome_path = Some(PathBuf::from(v));
        }
        if let Some(v) = parsed(&lookup, "GDDOWN_DEBUG_PORT") {
            self.debug_port = Some(v);
        }
        if let Some(v) = parsed(&lookup, "GDDOWN_TIMEOUT") {
            self.timeout_secs = v;
        }
        if let Some(v) = lookup("GDDOWN_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("GDDOWN_TEMP_DIR") {
            self.temp_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("GDDOWN_LOG_FILE") {
            self.log_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("GDDOWN_LOG_LEVEL") {
            self.log_level = v;
        }
        if let Some(v) = parsed(&lookup, "GDDOWN_QUALITY") {
            self.image_quality = v;
        }
        if let Some(v) = parsed(&lookup, "GDDOWN_MAX_PAGES") {
            self.max_pages = v;
        }
        self
    }

    /// 校验取值范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.image_quality) {
            return Err(ConfigError::InvalidValue {
                key: "image_quality",
                reason: format!("{} 不在 1..=100 范围内", self.image_quality),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timeout_secs",
                reason: "必须大于 0".into(),
            });
        }
        if self.page_dpi <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "page_dpi",
                reason: format!("{} 必须为正数", self.page_dpi),
            });
        }
        Ok(())
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// 页面图片的发现参数
    pub fn page_discovery(&self) -> DiscoveryConfig {
        let defaults = DiscoveryConfig::page_images();
        DiscoveryConfig {
            max_idle_probes: self.page_idle_probes,
            max_items: if self.max_pages > 0 {
                self.max_pages
            } else {
                DEFAULT_PAGE_CAP
            },
            inter_probe_delay: Duration::from_millis(self.probe_delay_ms),
            ..defaults
        }
    }

    /// 文件夹条目的发现参数
    pub fn folder_discovery(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            max_idle_probes: self.folder_idle_probes,
            inter_probe_delay: Duration::from_millis(self.probe_delay_ms),
            ..DiscoveryConfig::folder_entries()
        }
    }

    /// "已检测到页面"等待门
    pub fn pages_gate(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.page_gate_retries,
            Duration::from_millis(self.page_gate_delay_ms),
        )
    }

    /// 打开资源的退避重试
    pub fn open_retry(&self) -> RetryPolicy {
        RetryPolicy::backoff(
            self.open_retries,
            Duration::from_millis(self.open_retry_delay_ms),
            Duration::from_millis(self.open_retry_jitter_ms),
        )
    }
}
