use reqwest::{Client, Proxy, Response};
use rustls::{ClientConfig, crypto::ring};
use rustls_platform_verifier::BuilderVerifierExt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{DownloaderConfig, StitchError};

/// Create the reqwest Client shared by every playlist and part fetch
pub fn create_client(config: &DownloaderConfig) -> Result<Client, StitchError> {
    let provider = Arc::new(ring::default_provider());

    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| StitchError::Tls {
            reason: e.to_string(),
        })?
        .with_platform_verifier()
        .map_err(|e| StitchError::Tls {
            reason: e.to_string(),
        })?
        .with_no_client_auth();

    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(16)
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .use_preconfigured_tls(tls_config)
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    if !config.pool_idle_timeout.is_zero() {
        client_builder = client_builder.pool_idle_timeout(config.pool_idle_timeout);
    }

    if let Some(proxy_url) = &config.proxy {
        let proxy = Proxy::all(proxy_url)
            .map_err(|e| StitchError::invalid_url(proxy_url, format!("invalid proxy: {e}")))?;
        client_builder = client_builder.proxy(proxy);
        info!(proxy_url = %proxy_url, "Using explicitly configured proxy for downloads");
    } else if config.use_system_proxy {
        // reqwest picks up system proxy settings unless no_proxy() is called
        debug!("Using system proxy settings for downloads");
    } else {
        client_builder = client_builder.no_proxy();
        debug!("Proxy disabled for downloads");
    }

    client_builder.build().map_err(StitchError::from)
}

/// GET `url` and reject anything but `200 OK`.
pub(crate) async fn get_checked(client: &Client, url: &str) -> Result<Response, StitchError> {
    let parsed = url::Url::parse(url).map_err(|e| StitchError::invalid_url(url, e.to_string()))?;

    let response = client.get(parsed).send().await?;
    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(StitchError::http_status(status, url));
    }
    Ok(response)
}
