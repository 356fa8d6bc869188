use std::path::PathBuf;

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器相关错误
    #[error("{0}")]
    Browser(#[from] BrowserError),
    /// 单页抓取错误
    #[error("{0}")]
    Capture(#[from] CaptureError),
    /// PDF 合成错误
    #[error("{0}")]
    Assembly(#[from] AssemblyError),
    /// 输入列表错误
    #[error("{0}")]
    Input(#[from] InputError),
    /// 配置错误
    #[error("{0}")]
    Config(#[from] ConfigError),
    /// 用户中断（Ctrl-C）
    #[error("用户中断")]
    Interrupted,
    /// 其他错误（用于包装第三方库错误）
    #[error("{0}")]
    Other(String),
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 启动浏览器失败
    #[error("浏览器启动失败: {source}")]
    LaunchFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 连接浏览器失败
    #[error("无法连接到端口 {port} 上的浏览器: {source}")]
    ConnectionFailed {
        port: u16,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 浏览器配置失败
    #[error("浏览器配置错误: {0}")]
    ConfigurationFailed(String),
    /// 打开页面失败
    #[error("打开页面失败 {url}: {source}")]
    OpenFailed {
        url: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 执行脚本失败
    #[error("脚本执行失败: {source}")]
    ScriptExecutionFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 单次调用超时
    #[error("{operation} 超时 ({millis}ms)")]
    Timeout { operation: String, millis: u64 },
}

/// 单页抓取错误（两种策略各自的失败原因）
#[derive(Debug, Error)]
pub enum CaptureError {
    /// 直接获取返回了非成功状态码
    #[error("直接获取返回 HTTP {status}")]
    HttpStatus { status: u16 },
    /// 直接获取在页面内抛出异常
    #[error("直接获取失败: {0}")]
    FetchFailed(String),
    /// 画布回退找不到对应的已渲染图片
    #[error("图片未在当前视图中渲染")]
    NotRendered,
    /// 返回数据不是合法的 base64
    #[error("返回数据不是合法的 base64: {0}")]
    Decode(#[from] base64::DecodeError),
    /// 返回了空数据
    #[error("返回的图片数据为空")]
    EmptyPayload,
    /// 返回的 JSON 结构不符合预期
    #[error("返回结构不符合预期: {0}")]
    UnexpectedReply(String),
    /// 首次检测窗口内没有出现任何页面
    #[error("未检测到任何页面 (no pages detected)")]
    NoPagesDetected,
    /// 所有页面都抓取失败
    #[error("所有页面抓取失败 (共尝试 {attempted} 页)")]
    NothingCaptured { attempted: usize },
}

/// PDF 合成错误
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// 输入为空，或所有图片都无法解码
    #[error("没有可合成的内容")]
    NoContent,
    /// 创建临时工作区失败
    #[error("临时工作区准备失败 {path:?}: {source}")]
    Workspace {
        path: PathBuf,
        source: std::io::Error,
    },
    /// 单张图片解码/规范化失败（该页被丢弃）
    #[error("第 {position} 页规范化失败: {detail}")]
    Encode { position: usize, detail: String },
    /// 构建 PDF 文档失败
    #[error("PDF 构建失败: {0}")]
    Pdf(#[from] lopdf::Error),
    /// 目标文件无法写入
    #[error("写入失败 {path:?}: {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// 后台任务异常退出
    #[error("合成任务异常退出: {0}")]
    TaskAborted(String),
}

/// 输入列表错误
#[derive(Debug, Error)]
pub enum InputError {
    /// 链接文件不存在
    #[error("链接文件不存在: {path:?}")]
    ListNotFound { path: PathBuf },
    /// 读取链接文件失败
    #[error("读取链接文件失败 {path:?}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// 没有任何可处理的链接
    #[error("没有可处理的有效链接")]
    NoUrls,
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("读取配置文件失败 {path:?}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// 配置文件格式错误
    #[error("配置文件格式错误 {path:?}: {source}")]
    ParseFailed {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// 配置项取值非法
    #[error("配置项 {key} 取值非法: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

// ========== 从常见错误类型转换 ==========
// anyhow 已经为所有实现了 std::error::Error 的类型提供了自动转换

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::ScriptExecutionFailed {
            source: Box::new(err),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Capture(CaptureError::UnexpectedReply(err.to_string()))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Other(err.to_string())
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建浏览器连接错误
    pub fn browser_connection_failed(
        port: u16,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Browser(BrowserError::ConnectionFailed {
            port,
            source: Box::new(source),
        })
    }

    /// 创建页面打开失败错误
    pub fn open_failed(
        url: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Browser(BrowserError::OpenFailed {
            url: url.into(),
            source: Box::new(source),
        })
    }

    /// 创建超时错误
    pub fn timeout(operation: impl Into<String>, millis: u64) -> Self {
        AppError::Browser(BrowserError::Timeout {
            operation: operation.into(),
            millis,
        })
    }

    /// 是否为用户中断
    pub fn is_interrupted(&self) -> bool {
        matches!(self, AppError::Interrupted)
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_errors_surface_through_app_error() {
        let err: AppError = CaptureError::NoPagesDetected.into();
        assert!(err.to_string().contains("no pages detected"));
        assert!(!err.is_interrupted());
    }

    #[test]
    fn interrupted_is_detected() {
        assert!(AppError::Interrupted.is_interrupted());
    }

    #[test]
    fn timeout_message_names_operation() {
        let err = AppError::timeout("eval", 1500);
        assert_eq!(err.to_string(), "eval 超时 (1500ms)");
    }
}
