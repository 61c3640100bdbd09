use serde::Serialize;

/// Uniform result of a routed request.
///
/// `success` is true exactly when a temporary credential is present and
/// non-empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResetOutcome {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    temporary_credential: Option<String>,
}

impl ResetOutcome {
    /// Successful reset. An empty credential degrades to a refusal carrying the
    /// same message.
    pub fn success(message: impl Into<String>, temporary_credential: impl Into<String>) -> Self {
        let temporary_credential = temporary_credential.into();
        if temporary_credential.is_empty() {
            return Self::refusal(message);
        }

        Self {
            success: true,
            message: message.into(),
            temporary_credential: Some(temporary_credential),
        }
    }

    pub fn refusal(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into(), temporary_credential: None }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn temporary_credential(&self) -> Option<&str> {
        self.temporary_credential.as_deref()
    }

    /// Sentence handed to speech synthesis. Appends the credential on success.
    pub fn spoken_response(&self) -> String {
        match &self.temporary_credential {
            Some(credential) => {
                format!("{} Your temporary password is: {credential}", self.message)
            }
            None => self.message.clone(),
        }
    }
}
