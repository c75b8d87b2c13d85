//! Bridge engine: model invocation, request routing and the framed host loop.
mod api;
mod cli;
mod handlers;
mod host;
mod invoke;
mod router;
mod types;

pub use api::ApiBackend;
pub use cli::{CliBackend, STREAM_REPORT_BYTES};
pub use handlers::{bridge_router, ACTION_FOLLOW_UP, ACTION_PING, ACTION_SUMMARIZE};
pub use host::{serve, serve_stdio};
pub use invoke::{
    usable_credential, ChannelProgressSink, InvokeSettings, InvokerFactory, ModelBackend,
    ModelInvoker, ProgressReceiver, ProgressSink, PROGRESS_CHANNEL_CAPACITY,
};
pub use router::{ActionHandler, Router};
pub use types::{BridgeError, FailureKind, HostError, InvokeError};
