use reqwest::StatusCode;

const SNIPPET_LEN: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{url} responded with {status}: {body}")]
    Http {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("Credentials rejected ({status}): {body}")]
    Authentication { status: StatusCode, body: String },

    #[error("Layout drift: {0}")]
    StructureDrift(String),

    #[error("Could not resolve title: {0}")]
    Unresolved(String),

    #[error("Could not write list {slug} ({status}): {body}")]
    RemoteWrite {
        slug: String,
        status: StatusCode,
        body: String,
    },

    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Could not parse configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("Could not initialize logging: {0}")]
    Logging(String),

    #[error("Run aborted")]
    Aborted,
}

impl Error {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Request(err) => !(err.is_builder() || err.is_decode()),
            Error::Http { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Http { status, .. }
            | Error::Authentication { status, .. }
            | Error::RemoteWrite { status, .. } => Some(*status),
            Error::Request(err) => err.status(),
            _ => None,
        }
    }

    /// The response body (or message) truncated for the run log.
    pub fn snippet(&self) -> String {
        let text = match self {
            Error::Http { body, .. }
            | Error::Authentication { body, .. }
            | Error::RemoteWrite { body, .. } => body.clone(),
            other => other.to_string(),
        };

        truncate(&text, SNIPPET_LEN)
    }

    /// Reinterprets an HTTP failure of a list write as a `RemoteWrite` error.
    pub fn into_remote_write(self, slug: &str) -> Error {
        match self {
            Error::Http { status, body, .. } => Error::RemoteWrite {
                slug: slug.to_owned(),
                status,
                body,
            },
            other => other,
        }
    }
}

pub(crate) fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((index, _)) => format!("{}...", &text[..index]),
        None => text.to_owned(),
    }
}
