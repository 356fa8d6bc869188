pub mod js_executor;
pub mod remote_view;
pub mod session;

pub use js_executor::JsExecutor;
pub use remote_view::{close_quietly, eval_as, open_with_retry, RemoteView, ViewOpener};
pub use session::BrowserSession;
