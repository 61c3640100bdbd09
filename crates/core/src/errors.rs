use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("audio payload is empty")]
    EmptyAudio,
    #[error("text payload is empty")]
    EmptyText,
    #[error("unsupported sample width: {0} bytes")]
    UnsupportedSampleWidth(u16),
    #[error("invalid audio: {0}")]
    InvalidAudio(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IntegrationError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),
    #[error("upstream request timed out")]
    Timeout,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Integration(#[from] IntegrationError),
    #[error("configuration failure: {0}")]
    Configuration(String),
    #[error("io failure: {0}")]
    Io(String),
}

impl ApplicationError {
    /// Sentence safe to show or speak to an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Input(_) => {
                "I'm sorry, I didn't catch that. Could you please repeat your request?"
            }
            Self::Integration(_) => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Configuration(_) | Self::Io(_) => "An unexpected internal error occurred.",
        }
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Input(_) => "input",
            Self::Integration(_) => "integration",
            Self::Configuration(_) => "configuration",
            Self::Io(_) => "io",
        }
    }
}

impl From<std::io::Error> for ApplicationError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}
