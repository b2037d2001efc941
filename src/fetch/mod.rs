use crate::constants::{APP_NAME_HEADER, INSTANCE_ID_HEADER, PKG_VERSION, SDK_HEADER, SDK_NAME};
use crate::errors::{ClientError, ErrorKind};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Url;
use std::time::Duration;

pub mod fetcher;
pub mod reporter;
pub mod service;

pub(crate) fn http_client(
    app_name: &str,
    instance_id: &str,
    api_key: Option<&str>,
    timeout: Duration,
) -> Result<reqwest::Client, ClientError> {
    let mut headers = HeaderMap::new();
    headers.insert(APP_NAME_HEADER, header_value(APP_NAME_HEADER, app_name)?);
    headers.insert(INSTANCE_ID_HEADER, header_value(INSTANCE_ID_HEADER, instance_id)?);
    headers.insert(
        SDK_HEADER,
        header_value(SDK_HEADER, format!("{SDK_NAME}:{PKG_VERSION}").as_str())?,
    );
    if let Some(key) = api_key {
        let mut value = header_value(AUTHORIZATION.as_str(), key)?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    match reqwest::Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
    {
        Ok(client) => Ok(client),
        Err(err) => Err(ClientError::new(
            ErrorKind::HttpClientInitFailure,
            format!("Failed to initialize the HTTP client. {err}"),
        )),
    }
}

pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url, ClientError> {
    match base.join(path) {
        Ok(url) => Ok(url),
        Err(err) => Err(ClientError::new(
            ErrorKind::InvalidConfiguration,
            format!("Failed to build the '{path}' endpoint URL. {err}"),
        )),
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ClientError> {
    match HeaderValue::from_str(value) {
        Ok(val) => Ok(val),
        Err(_) => Err(ClientError::new(
            ErrorKind::InvalidConfiguration,
            format!("The value of the '{name}' HTTP header is invalid."),
        )),
    }
}
