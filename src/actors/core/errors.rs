// ============================================================================
// Actor Runtime Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    #[error("No eventizer registered for contract {contract}")]
    UnsupportedContract { contract: &'static str },

    #[error("Malformed message {message} for actor {actor}: {reason}")]
    MalformedMessage {
        actor: String,
        message: &'static str,
        reason: String,
    },

    #[error("Failed to create {what}")]
    ResourceExhaustion {
        what: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Actor runtime is shut down")]
    ShutDown,
}
