use thiserror::Error;

/// Error returned by any external collaborator port. Collaborator-specific
/// errors are wrapped with context, as required by the error-propagation
/// rule ("init vif: ...").
#[derive(Debug, Error)]
pub enum PortError {
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("{0}")]
    Message(String),
}

impl PortError {
    pub fn context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        PortError::Context {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
