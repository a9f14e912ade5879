//! Ready-made [`reqwest::Client`]s for plain and TLS-secured nodes.
//!
//! Pass the result to [`crate::RqliteClient::with_http_client`].

use std::{path::Path, time::Duration};

use reqwest::{Certificate, ClientBuilder, Identity};

use crate::Result;

/// Overall request timeout used when nothing else is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

fn builder() -> ClientBuilder {
    reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(DEFAULT_TIMEOUT)
}

async fn read_pem(path: &Path) -> Result<Vec<u8>> {
    Ok(tokio::fs::read(path).await?)
}

/// Plain HTTP(S) client with the default timeout.
pub fn default_http_client() -> Result<reqwest::Client> {
    Ok(builder().build()?)
}

/// HTTPS client that accepts any server certificate.
pub fn insecure_tls_client() -> Result<reqwest::Client> {
    Ok(builder().danger_accept_invalid_certs(true).build()?)
}

/// HTTPS client that trusts the PEM CA bundle at `ca_cert_path`.
pub async fn tls_client(ca_cert_path: impl AsRef<Path>) -> Result<reqwest::Client> {
    let ca = read_pem(ca_cert_path.as_ref()).await?;
    Ok(builder()
        .add_root_certificate(Certificate::from_pem(&ca)?)
        .build()?)
}

/// HTTPS client presenting a client certificate (mutual TLS).
///
/// `cert_path` and `key_path` are PEM files; the optional CA bundle is added
/// to the trusted roots.
pub async fn mutual_tls_client(
    cert_path: impl AsRef<Path>,
    key_path: impl AsRef<Path>,
    ca_cert_path: Option<&Path>,
) -> Result<reqwest::Client> {
    let mut identity = read_pem(cert_path.as_ref()).await?;
    identity.push(b'\n');
    identity.extend(read_pem(key_path.as_ref()).await?);

    let mut builder = builder().identity(Identity::from_pem(&identity)?);
    if let Some(path) = ca_cert_path {
        let ca = read_pem(path).await?;
        builder = builder.add_root_certificate(Certificate::from_pem(&ca)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::{default_http_client, insecure_tls_client, tls_client};
    use crate::RqliteError;

    #[test]
    fn builds_plain_and_insecure_clients() {
        default_http_client().expect("default client");
        insecure_tls_client().expect("insecure client");
    }

    #[tokio::test]
    async fn missing_ca_file_is_io_error() {
        let err = tls_client("/nonexistent/ca.pem")
            .await
            .expect_err("must fail");
        assert!(matches!(err, RqliteError::Io(_)));
    }
}
