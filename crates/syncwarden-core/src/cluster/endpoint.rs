//! Connection endpoints.
//!
//! An endpoint is either a `postgres://` URL or a libpq keyword string such
//! as `host=db1 port=5432 dbname=postgres`. Values in the keyword form may be
//! single-quoted, and a backslash escapes the next character. Settings the
//! endpoint leaves out fall back to the `PG*` environment variables.

use std::str::FromStr;

use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::error::{Result, WardenError};

/// Parse an endpoint into connection options.
pub fn connect_options(endpoint: &str) -> Result<PgConnectOptions> {
    let endpoint = endpoint.trim();
    if endpoint.starts_with("postgres://") || endpoint.starts_with("postgresql://") {
        return PgConnectOptions::from_str(endpoint).map_err(|e| invalid(e.to_string()));
    }

    let pairs = keyword_pairs(endpoint)?;
    if pairs.is_empty() {
        return Err(invalid("no connection parameters given".to_string()));
    }

    pairs
        .into_iter()
        .try_fold(PgConnectOptions::new(), |options, (key, value)| {
            apply(options, &key, &value)
        })
}

fn apply(options: PgConnectOptions, key: &str, value: &str) -> Result<PgConnectOptions> {
    let options = match key {
        "host" | "hostaddr" => options.host(value),
        "port" => options.port(
            value
                .parse()
                .map_err(|_| invalid(format!("invalid port \"{}\"", value)))?,
        ),
        "dbname" => options.database(value),
        "user" => options.username(value),
        "password" => options.password(value),
        "sslmode" => options.ssl_mode(
            PgSslMode::from_str(value)
                .map_err(|_| invalid(format!("invalid sslmode \"{}\"", value)))?,
        ),
        "application_name" => options.application_name(value),
        // Every attempt is already bounded by the probe timeout.
        "connect_timeout" => options,
        other => {
            return Err(invalid(format!(
                "unsupported connection parameter \"{}\"",
                other
            )))
        }
    };
    Ok(options)
}

fn keyword_pairs(conninfo: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    let mut chars = conninfo.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            return Ok(pairs);
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && !c.is_whitespace()) {
            key.push(c);
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if key.is_empty() || chars.next() != Some('=') {
            return Err(invalid(format!("missing \"=\" after \"{}\"", key)));
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'\'').is_some() {
            loop {
                match chars.next() {
                    Some('\\') => match chars.next() {
                        Some(c) => value.push(c),
                        None => return Err(invalid("unterminated quoted value".to_string())),
                    },
                    Some('\'') => break,
                    Some(c) => value.push(c),
                    None => return Err(invalid("unterminated quoted value".to_string())),
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        value.push(escaped);
                    }
                } else {
                    value.push(c);
                }
            }
        }

        pairs.push((key, value));
    }
}

fn invalid(msg: String) -> WardenError {
    WardenError::InvalidArgument(format!("invalid endpoint: {}", msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_form() {
        let options =
            connect_options("host=10.0.0.5 port=5433 dbname=app user=replicator").unwrap();
        assert_eq!(options.get_host(), "10.0.0.5");
        assert_eq!(options.get_port(), 5433);
        assert_eq!(options.get_database(), Some("app"));
        assert_eq!(options.get_username(), "replicator");
    }

    #[test]
    fn test_quoted_values_and_spacing() {
        let options =
            connect_options("host = db1  dbname='my db' application_name='it\\'s' port=5432")
                .unwrap();
        assert_eq!(options.get_host(), "db1");
        assert_eq!(options.get_database(), Some("my db"));
        assert_eq!(options.get_application_name(), Some("it's"));
    }

    #[test]
    fn test_url_form() {
        let options = connect_options("postgres://app@db2:6432/orders").unwrap();
        assert_eq!(options.get_host(), "db2");
        assert_eq!(options.get_port(), 6432);
        assert_eq!(options.get_database(), Some("orders"));
    }

    #[test]
    fn test_rejects_malformed() {
        for endpoint in [
            "",
            "   ",
            "host",
            "=db1",
            "host=db1 port=abc",
            "host=db1 sslmode=sometimes",
            "host=db1 dbname='open",
            "host=db1 target_session_attrs=any",
        ] {
            let err = connect_options(endpoint).unwrap_err();
            assert!(
                matches!(err, WardenError::InvalidArgument(_)),
                "{:?} was accepted",
                endpoint
            );
        }
    }
}
