use thiserror::Error;

/// Problems found while turning the configuration file into layers.
///
/// All of these are fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("malformed tap code `{0}` (expected 0-31 or a 5 glyph pattern like `●○○○●`)")]
    MalformedTapCode(String),
    #[error("unknown key name `{0}`")]
    UnknownKey(String),
    #[error("unknown action type `{0}`")]
    UnknownActionType(String),
    #[error("`{kind}` action is missing its `{field}` field")]
    MissingField { kind: String, field: &'static str },
    #[error("layer `{0}` is defined more than once")]
    DuplicateLayer(String),
    #[error("layer `{layer}` binds tap code {code} as {arity} more than once")]
    DuplicateBinding {
        layer: String,
        code: u8,
        arity: &'static str,
    },
    #[error("layer `{layer}` extends unknown layer `{base}`")]
    UnknownBaseLayer { layer: String, base: String },
    #[error("layer `{0}` is part of an `extends` cycle")]
    ExtendsCycle(String),
    #[error("no layer is marked as default")]
    NoDefaultLayer,
    #[error("timeout must be at least 1 ms")]
    InvalidTimeout,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("scheduler worker has stopped")]
    Stopped,
}
