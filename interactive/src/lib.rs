pub mod api;
pub mod auth;
pub mod client;
pub mod comments;
pub mod config;
pub mod error;
pub mod guard;
pub mod likes;
pub mod notice;
pub mod reconcile;
pub mod repl;
pub mod session;
pub mod telemetry;
pub mod topics;
pub mod votes;

#[cfg(test)]
mod fake;

pub use api::{ApiRequest, ApiResponse, HttpTransport, Transport};
pub use auth::{Auth, SignupForm};
pub use client::Client;
pub use comments::CommentThread;
pub use config::ClientConfig;
pub use error::ApiError;
pub use guard::SessionGuard;
pub use likes::LikeTarget;
pub use notice::{Notice, NoticeKind, Notifier};
pub use reconcile::Reconciler;
pub use session::{Session, SessionHandle};
pub use topics::{TopicBoard, TopicPage};
