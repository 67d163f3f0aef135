mod common;

#[cfg(test)]
mod tests {
    use super::*;

    use common::*;
    use couchsess::store::Error;
    use couchsess::store::memory::MemoryConnector;
    use couchsess::{ConfigError, ConnectionDescriptor, Scheme, SessionAdapter, SessionConfig};
    use std::io::Write;
    use std::path::PathBuf;

    fn connection_string(config: &SessionConfig) -> String {
        ConnectionDescriptor::build(config)
            .unwrap()
            .connection_string()
    }

    #[test]
    fn test_single_host_defaults() {
        let config = SessionConfig::from_json(r#"{"server": "localhost"}"#).unwrap();
        let conn = connection_string(&config);

        assert!(conn.starts_with("couchbase://localhost/default?"));
        assert!(conn.contains("config_node_timeout=6000000"));
    }

    #[test]
    fn test_multiple_hosts_and_bucket() {
        let config =
            SessionConfig::from_json(r#"{"server": "host1,host2,host3", "bucket": "different"}"#)
                .unwrap();

        assert!(connection_string(&config).starts_with("couchbase://host1,host2,host3/different?"));
    }

    #[test]
    fn test_timeout_in_microseconds() {
        for seconds in [1, 6, 30, 120] {
            let config = SessionConfig::build("localhost").timeout(seconds);
            let expected = format!("config_node_timeout={}", seconds * 1_000_000);
            assert!(connection_string(&config).contains(&expected));
        }
    }

    #[test]
    fn test_plain_scheme_never_carries_certpath() {
        let mut config = SessionConfig::build("localhost").password("secret");
        config.certpath = Some(PathBuf::from("/does/not/matter.pem"));

        let conn = connection_string(&config);
        assert!(conn.starts_with("couchbase://"));
        assert!(conn.contains("&password=secret"));
        assert!(!conn.contains("certpath"));
    }

    #[test]
    fn test_ssl_with_existing_certificate() {
        let mut cert = tempfile::NamedTempFile::new().unwrap();
        writeln!(cert, "-----BEGIN CERTIFICATE-----").unwrap();

        let config = SessionConfig::build("secure1,secure2")
            .bucket("sessions")
            .ssl(cert.path());
        let descriptor = ConnectionDescriptor::build(&config).unwrap();
        let conn = descriptor.connection_string();

        assert_eq!(descriptor.scheme(), Scheme::Encrypted);
        assert!(conn.starts_with("couchbases://secure1,secure2/sessions?config_node_timeout=6000000"));

        let (_, encoded) = conn.split_once("&certpath=").unwrap();
        assert!(!encoded.contains('/'));
        let decoded = percent_encoding::percent_decode_str(encoded)
            .decode_utf8()
            .unwrap();
        assert_eq!(decoded, cert.path().to_string_lossy());
    }

    #[test]
    fn test_ssl_without_certificate_is_fatal() {
        let mut config = SessionConfig::build("localhost");
        config.ssl = true;

        assert_eq!(
            ConnectionDescriptor::build(&config),
            Err(ConfigError::MissingCertificate)
        );
    }

    #[test]
    fn test_ssl_with_missing_certificate_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.pem");
        let config = SessionConfig::build("localhost").ssl(&missing);

        assert_eq!(
            ConnectionDescriptor::build(&config),
            Err(ConfigError::CertificateNotFound(missing))
        );
    }

    #[tokio::test]
    async fn test_setup_rejects_out_of_range_default_ttl() {
        let config = SessionConfig::from_json(
            r#"{"server": "localhost", "default_ttl": 18446744073709551615}"#,
        )
        .unwrap();

        let result = SessionAdapter::setup(&config, &MemoryConnector::new()).await;
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidTtl(u64::MAX)))
        ));
    }

    #[test]
    fn test_bucket_cannot_break_the_query_string() {
        let config = SessionConfig::from_json(r#"{"server": "localhost", "bucket": "s?x=1&y"}"#)
            .unwrap();

        assert_eq!(
            ConnectionDescriptor::build(&config),
            Err(ConfigError::MalformedBucket("s?x=1&y".to_string()))
        );
    }

    #[tokio::test]
    async fn test_setup_aborts_on_config_error() {
        let connector = RefusingConnector::default();
        let config = SessionConfig::build("localhost").ssl("/no/such/cert.pem");

        let result = SessionAdapter::setup(&config, &connector).await;
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::CertificateNotFound(_)))
        ));
        assert!(connector.seen.lock().is_none());
    }

    #[tokio::test]
    async fn test_setup_aborts_when_connection_fails() {
        let connector = RefusingConnector::default();
        let config = SessionConfig::build("h1,h2").bucket("sessions");

        let result = SessionAdapter::setup(&config, &connector).await;
        assert!(matches!(result, Err(Error::Connect(_))));
        assert_eq!(
            connector.seen.lock().as_deref(),
            Some("couchbase://h1,h2/sessions?config_node_timeout=6000000")
        );
    }
}
