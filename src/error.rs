use thiserror::Error;

pub type Result<T> = std::result::Result<T, DeltaError>;

/// Error type for the delta algebra. Every variant is fatal to the call
/// that raised it; no partial output is produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeltaError {
    /// Two embeds were paired whose types differ, so neither handler can
    /// interpret the other's payload.
    #[error("embed types do not match: `{left}` paired with `{right}`")]
    EmbedTypeMismatch { left: String, right: String },

    /// An embed retain was paired with a value that is not an embed at all,
    /// for example a text insert under a nested-delta retain.
    #[error("expected an embed to pair with the `{embed_type}` retain, found {found}")]
    ExpectedEmbed { embed_type: String, found: String },

    /// No handler is registered for the embed's type key.
    #[error("no embed handler registered for type `{embed_type}`")]
    UnknownEmbedType { embed_type: String },

    /// A handler rejected the payload it was given, e.g. a `delta` embed
    /// whose value does not decode as an operation sequence.
    #[error("invalid `{embed_type}` embed payload: {reason}")]
    InvalidEmbedPayload { embed_type: String, reason: String },
}
