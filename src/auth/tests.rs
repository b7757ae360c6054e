use super::*;
use axum::http::HeaderMap;

const STAFF_TOKEN: &str = "7f3c2a10-5b1e-4c8d-9a2f-3e6b1d0c4f88";

fn headers_with(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("authorization", value.parse().unwrap());
    headers
}

#[cfg(test)]
mod extract_bearer_token_tests {
    use super::*;

    #[test]
    fn accepts_bearer_scheme_in_any_case() {
        for value in [
            format!("Bearer {}", STAFF_TOKEN),
            format!("bearer {}", STAFF_TOKEN),
            format!("BEARER {}", STAFF_TOKEN),
        ] {
            assert_eq!(
                extract_bearer_token(&headers_with(&value)).as_deref(),
                Ok(STAFF_TOKEN),
                "{}",
                value
            );
        }
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let headers = headers_with(&format!("Bearer   {}  ", STAFF_TOKEN));
        assert_eq!(extract_bearer_token(&headers).unwrap(), STAFF_TOKEN);
    }

    #[test]
    fn missing_header() {
        assert_eq!(
            extract_bearer_token(&HeaderMap::new()),
            Err(TokenError::Missing)
        );
    }

    #[test]
    fn malformed_headers_are_invalid_format() {
        for value in ["", STAFF_TOKEN, "Basic dXNlcjpwYXNz", "Bearer"] {
            assert_eq!(
                extract_bearer_token(&headers_with(value)),
                Err(TokenError::InvalidFormat),
                "{:?}",
                value
            );
        }
    }

    #[test]
    fn blank_token_after_scheme() {
        assert_eq!(
            extract_bearer_token(&headers_with("Bearer  ")),
            Err(TokenError::Empty)
        );
    }
}

#[cfg(test)]
mod normalize_query_token_tests {
    use super::*;

    #[test]
    fn valid_query_token() {
        assert_eq!(normalize_query_token(Some(STAFF_TOKEN)).unwrap(), STAFF_TOKEN);
    }

    #[test]
    fn query_token_is_trimmed() {
        let result = normalize_query_token(Some("  family-3  "));
        assert_eq!(result.unwrap(), "family-3");
    }

    #[test]
    fn missing_query_token() {
        assert_eq!(normalize_query_token(None), Err(TokenError::Missing));
    }

    #[test]
    fn blank_query_token() {
        assert_eq!(normalize_query_token(Some("   ")), Err(TokenError::Empty));
    }
}

#[test]
fn token_errors_render_for_401_bodies() {
    let cases = [
        (TokenError::Missing, "Authorization token not provided"),
        (TokenError::InvalidFormat, "Invalid authorization token format"),
        (TokenError::Empty, "Authorization token is empty"),
        (TokenError::Unknown, "Authorization token not recognized"),
    ];
    for (error, message) in cases {
        assert_eq!(error.to_string(), message);
    }
}
