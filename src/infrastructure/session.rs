//! 浏览器会话 - 基础设施层
//!
//! 唯一的 Browser 持有者，整批资源共享同一个上下文

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Browser;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::browser::{connect_to_browser, launch_browser, LaunchOptions};
use crate::error::{AppError, AppResult};
use crate::infrastructure::js_executor::JsExecutor;
use crate::infrastructure::remote_view::{RemoteView, ViewOpener};

/// 浏览器会话
pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    /// 由本程序启动（退出时需要关闭）
    launched: bool,
    load_timeout: Duration,
    call_timeout: Duration,
}

impl BrowserSession {
    /// 启动本地浏览器
    pub async fn launch(options: &LaunchOptions, load_timeout: Duration) -> AppResult<Self> {
        let (browser, handler_task) = launch_browser(options).await?;
        Ok(Self {
            browser,
            handler_task,
            launched: true,
            load_timeout,
            call_timeout: options.request_timeout,
        })
    }

    /// 连接到已运行的浏览器
    pub async fn connect(port: u16, load_timeout: Duration) -> AppResult<Self> {
        let (browser, handler_task) = connect_to_browser(port).await?;
        Ok(Self {
            browser,
            handler_task,
            launched: false,
            load_timeout,
            call_timeout: load_timeout,
        })
    }

    /// 结束会话
    pub async fn shutdown(mut self) {
        if self.launched {
            info!("🛑 关闭浏览器...");
            if let Err(e) = self.browser.close().await {
                warn!("关闭浏览器失败: {}", e);
            }
            if let Err(e) = self.browser.wait().await {
                debug!("等待浏览器进程退出失败: {}", e);
            }
        }
        self.handler_task.abort();
    }
}

#[async_trait]
impl ViewOpener for BrowserSession {
    async fn open(&self, url: &str) -> AppResult<Box<dyn RemoteView>> {
        debug!("打开页面: {}", url);
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| AppError::open_failed(url, e))?;

        if let Err(e) = page.goto(url).await {
            let _ = page.clone().close().await;
            return Err(AppError::open_failed(url, e));
        }

        // 懒加载页面很少真正达到空闲状态，超时后继续
        if timeout(self.load_timeout, page.wait_for_navigation())
            .await
            .is_err()
        {
            debug!(
                "等待页面加载超时 ({}ms)，继续处理",
                self.load_timeout.as_millis()
            );
        }

        Ok(Box::new(JsExecutor::new(page, self.call_timeout)))
    }
}
