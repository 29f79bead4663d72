pub mod api;
pub mod app_state;
pub mod chat;
pub mod config;
pub mod constants;
pub mod countdown;
pub mod events;
pub mod render;
pub mod session;
pub mod transcript;
pub mod web_server;

pub use api::{ApiError, AskResponse, GravidClient, QuestionApi};
pub use app_state::{ChatSnapshot, ChatState, SubmitError};
pub use config::ChatConfig;
pub use events::ChatEvent;
pub use session::{SessionError, SessionHandle};
pub use transcript::{Exchange, Transcript};
