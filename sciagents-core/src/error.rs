//! Error types for the SciAgents core.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering LLM calls, configuration, output parsing, simulation,
//! inter-agent communication, and workflow phases.

/// Top-level error type for the SciAgents core library.
#[derive(Debug, thiserror::Error)]
pub enum SciError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Simulation error: {0}")]
    Simulation(#[from] SimulationError),

    #[error("Communication error: {0}")]
    Communication(#[from] CommunicationError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from LLM provider interactions.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Context window exceeded: used {used} of {limit} tokens")]
    ContextOverflow { used: usize, limit: usize },

    #[error("Provider not supported: {provider}")]
    UnsupportedProvider { provider: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },
}

/// Errors from configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Environment variable not set: {var}")]
    EnvVarMissing { var: String },
}

/// Errors from coercing model output into typed records.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("No JSON object found in model output")]
    NoJsonObject,

    #[error("Malformed JSON: {message}")]
    MalformedJson { message: String },

    #[error("Missing field '{field}' in model output")]
    MissingField { field: String },
}

/// Errors raised by the experiment simulators.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Series '{series}' contains non-finite values")]
    NonFinite { series: String },
}

/// Errors from routing messages between agents.
#[derive(Debug, thiserror::Error)]
pub enum CommunicationError {
    #[error("Receiver agent '{name}' not found.")]
    UnknownAgent { name: String },

    #[error("Agent '{name}' failed to handle message: {message}")]
    DeliveryFailed { name: String, message: String },
}

/// Errors from the investigation workflow.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Phase '{phase}' failed: {message}")]
    PhaseFailed { phase: String, message: String },
}

/// Convenience type alias for SciAgents results.
pub type Result<T> = std::result::Result<T, SciError>;
