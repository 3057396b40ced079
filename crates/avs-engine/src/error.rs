use thiserror::Error;

/// Error taxonomy shared across the engine. Preset input never causes a
/// panic: parse problems become warnings, effect failures become a `false`
/// render result, and only caller contract violations surface as errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("preset warning: {0}")]
    PresetWarning(String),

    #[error("unknown effect: {0}")]
    UnknownEffect(String),

    #[error("script compile error in {stage}: {message}")]
    ScriptCompile { stage: String, message: String },

    #[error("script runtime error in {stage}: {message}")]
    ScriptRuntime { stage: String, message: String },

    #[error("missing resource: {0}")]
    ResourceMissing(String),

    #[error("internal error: {0}")]
    Internal(String),
}
