pub mod config;
pub mod driver;
pub mod error;
pub mod http;
pub mod local;
pub mod replay;
pub mod scheduler;
pub mod service;
pub mod session;

pub use config::{
    CONFIG_ENV, CanvasConfig, EngineConfig, ServiceConfig, load_config, parse_config, to_toml,
};
pub use driver::{Driver, DriverHandle, UiEvent};
pub use error::{EngineError, Result, ServiceError};
pub use http::HttpThoughtService;
pub use local::LocalThoughtService;
pub use replay::{Action, ReplayReport, Script, ScriptEvent, run_script};
pub use scheduler::RemovalScheduler;
pub use service::{Articulation, GenerationRequest, ThoughtService, build_service};
pub use session::{Completion, Effect, GenerationJob, Session, TriggerEvent};
