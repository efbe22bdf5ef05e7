pub mod config;
pub mod enums;
pub mod result;

// Re-export commonly used types for convenience
pub use config::{
    AgentConfig, DetectionConfig, ExecConfig, PathConfig, PathConfigType, SessionConfig,
    ShimConfig,
};
pub use enums::{CompletionSignal, OutputFormat, SecurityPolicy, SessionStatus};
pub use result::{
    AgentSessionPayload, AnalyzePayload, DirectRunPayload, ListPayload, MessagePayload,
    OutputPayload, QuickTaskPayload, Response, RunPayload, ServePayload, SessionEntry,
    StartPayload, StatusPayload,
};
