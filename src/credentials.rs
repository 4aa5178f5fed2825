use crate::error::Error;
use crate::result::Result;

use std::{env, fmt};

pub const CLIENT_ID: &str = "CLIENT_ID";
pub const ACCESS_TOKEN: &str = "ACCESS_TOKEN";
pub const TMDB_API_KEY: &str = "TMDB_API_KEY";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub access_token: String,
    /// Enrichment is skipped without it.
    pub tmdb_api_key: Option<String>,
}

impl Credentials {
    pub fn from_lookup<F>(lookup: F) -> Result<Credentials>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        Ok(Credentials {
            client_id: value(CLIENT_ID).ok_or(Error::MissingCredential(CLIENT_ID))?,
            access_token: value(ACCESS_TOKEN).ok_or(Error::MissingCredential(ACCESS_TOKEN))?,
            tmdb_api_key: value(TMDB_API_KEY),
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("access_token", &"<redacted>")
            .field("tmdb_api_key", &self.tmdb_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Supplies pre-authenticated credentials. Tokens are never refreshed here.
pub trait CredentialProvider {
    fn credentials(&self) -> Result<Credentials>;
}

/// Reads credentials from the process environment, after loading `.env`.
#[derive(Debug, Default)]
pub struct EnvCredentials;

impl CredentialProvider for EnvCredentials {
    fn credentials(&self) -> Result<Credentials> {
        dotenv::dotenv().ok();
        Credentials::from_lookup(|name| env::var(name).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_from_lookup() {
        let credentials = Credentials::from_lookup(lookup(&[
            (CLIENT_ID, "client"),
            (ACCESS_TOKEN, " token\n"),
        ]))
        .unwrap();

        assert_eq!(credentials.client_id, "client");
        assert_eq!(credentials.access_token, "token");
        assert_eq!(credentials.tmdb_api_key, None);
    }

    #[test]
    fn test_from_lookup_missing() {
        let result = Credentials::from_lookup(lookup(&[(CLIENT_ID, "client"), (ACCESS_TOKEN, "")]));

        assert!(matches!(result, Err(Error::MissingCredential(ACCESS_TOKEN))));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let credentials = Credentials::from_lookup(lookup(&[
            (CLIENT_ID, "client"),
            (ACCESS_TOKEN, "secret-token"),
            (TMDB_API_KEY, "secret-key"),
        ]))
        .unwrap();

        let debug = format!("{:?}", credentials);
        assert!(debug.contains("client"));
        assert!(!debug.contains("secret"));
    }
}
