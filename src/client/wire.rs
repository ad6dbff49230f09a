//! Bodies exchanged with the token endpoint.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use ::serde::{de, Deserialize, Serialize};

use crate::scope::ScopeSet;

macro_rules! literal_marker {
    ( $(
        $( #[$m:meta] )*
        $name:ident = $lit:literal;
    )+ ) => { ::paste::paste! { $(
        $( #[$m] )*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
        pub struct $name(());

        impl $name {
            pub const STR: &'static str = $lit;

            pub const fn new() -> Self {
                Self(())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(Self::STR)
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.eq_ignore_ascii_case(Self::STR) {
                    Ok(Self::new())
                } else {
                    Err(format!("expected {}, found {s}", Self::STR))
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: ::serde::Serializer,
            {
                serializer.serialize_str(Self::STR)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: de::Deserializer<'de>,
            {
                deserializer.deserialize_str([< $name Visitor >])
            }
        }

        struct [< $name Visitor >];

        impl<'de> de::Visitor<'de> for [< $name Visitor >] {
            type Value = $name;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(formatter, r#"a str "{}""#, $name::STR)
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                v.parse().map_err(E::custom)
            }
        }
    )+ } };
}

literal_marker! {
    /// `grant_type` of an authorization code exchange.
    AuthorizationCode = "authorization_code";
    /// `token_type` the provider issues. Compared case-insensitively.
    Bearer = "Bearer";
}

#[derive(PartialEq, Eq, Hash, Serialize)]
pub(crate) struct TokenRequest<'a> {
    pub client_id: Cow<'a, str>,
    pub client_secret: Cow<'a, str>,
    pub code: Cow<'a, str>,
    pub grant_type: AuthorizationCode,
    pub redirect_uri: Cow<'a, str>,
}

impl TokenRequest<'_> {
    pub fn urlencoded(self) -> String {
        macro_rules! encode_form {
            [ $($i:ident),+ ] => {
                [$(
                    format!(
                        concat!(stringify!($i), "={}"),
                        ::percent_encoding::utf8_percent_encode(& $i, ::percent_encoding::NON_ALPHANUMERIC)
                    )
                ),+]
            };
        }

        let Self {
            client_id,
            client_secret,
            code,
            grant_type,
            redirect_uri,
        } = self;
        let grant_type = grant_type.to_string();
        let params = encode_form![client_id, client_secret, code, grant_type, redirect_uri];
        params.join("&")
    }
}

/// Successful answer of the token endpoint.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<ScopeSet>,
    pub token_type: Bearer,
    #[serde(default)]
    pub id_token: Option<String>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("expires_in", &self.expires_in)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .finish_non_exhaustive()
    }
}

/// RFC 6749 section 5.2 error body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl ErrorResponse {
    pub const INVALID_GRANT: &'static str = "invalid_grant";

    pub fn is_invalid_grant(&self) -> bool {
        self.error == Self::INVALID_GRANT
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{} ({description})", self.error),
            None => f.write_str(&self.error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_request_urlencoded() {
        let request = TokenRequest {
            client_id: "id.apps".into(),
            client_secret: "s3cret".into(),
            code: "4/0Ab".into(),
            grant_type: AuthorizationCode::new(),
            redirect_uri: "http://localhost:8080/".into(),
        };
        assert_eq!(
            request.urlencoded(),
            "client_id=id%2Eapps&client_secret=s3cret&code=4%2F0Ab\
             &grant_type=authorization%5Fcode\
             &redirect_uri=http%3A%2F%2Flocalhost%3A8080%2F"
        );
    }

    #[test]
    fn test_token_response_de() {
        let payload = r#"{
            "access_token": "ya29.a0",
            "expires_in": 3599,
            "refresh_token": "1//0g",
            "scope": "https://www.googleapis.com/auth/calendar.readonly",
            "token_type": "Bearer"
        }"#;
        let response: TokenResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(response.expires_in, Some(3599));
        assert_eq!(response.refresh_token.as_deref(), Some("1//0g"));
        assert_eq!(response.scope, Some(crate::scope_set![calendar.readonly]));
        assert!(response.id_token.is_none());
    }

    #[test]
    fn test_bearer_case_insensitive() {
        let bearer: Bearer = serde_json::from_str(r#""bearer""#).unwrap();
        assert_eq!(bearer.to_string(), "Bearer");
        assert!(serde_json::from_str::<Bearer>(r#""mac""#).is_err());
    }

    #[test]
    fn test_error_response_display() {
        let payload = r#"{"error": "invalid_grant", "error_description": "Bad Request"}"#;
        let error: ErrorResponse = serde_json::from_str(payload).unwrap();
        assert!(error.is_invalid_grant());
        assert_eq!(error.to_string(), "invalid_grant (Bad Request)");
    }
}
