use chrono::Utc;
use log::{debug, error};
use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::Url;

use crate::errors::ClientError;
use crate::errors::ErrorKind::*;
use crate::fetch::fetcher::FetchResponse::{Failed, Fetched, NotModified};
use crate::model::feature::{snapshot_from_json, RepositorySnapshot};

#[derive(Debug)]
pub enum FetchResponse {
    Fetched(RepositorySnapshot),
    NotModified,
    /// The failure and whether it is transient. Polling waits for the maximum backoff after a non-transient one.
    Failed(ClientError, bool),
}

pub struct Fetcher {
    features_url: Url,
    http_client: reqwest::Client,
}

impl Fetcher {
    pub fn new(features_url: Url, http_client: reqwest::Client) -> Self {
        Self {
            features_url,
            http_client,
        }
    }

    pub async fn fetch(&self, etag: &str) -> FetchResponse {
        let mut builder = self.http_client.get(self.features_url.clone());
        if !etag.is_empty() {
            builder = builder.header(IF_NONE_MATCH, etag.to_owned());
        }

        let result = builder.send().await;

        match result {
            Ok(response) => match response.status().as_u16() {
                200 => {
                    debug!("Fetch was successful: new flag definitions fetched");
                    let etag = response
                        .headers()
                        .get(ETAG)
                        .and_then(|header| header.to_str().ok())
                        .unwrap_or("")
                        .to_owned();
                    match response.text().await {
                        Ok(body_str) => {
                            match snapshot_from_json(body_str.as_str(), etag.as_str(), Utc::now()) {
                                Ok(snapshot) => Fetched(snapshot),
                                Err(parse_error) => {
                                    let msg = format!("Fetching flag definitions was successful but the HTTP response content was invalid. {parse_error}");
                                    error!(event_id = MalformedResponse.as_u16(); "{}", msg);
                                    Failed(ClientError::new(MalformedResponse, msg), true)
                                }
                            }
                        }
                        Err(body_error) => {
                            let msg = format!("Fetching flag definitions was successful but the HTTP response content was invalid. {body_error}");
                            error!(event_id = MalformedResponse.as_u16(); "{}", msg);
                            Failed(ClientError::new(MalformedResponse, msg), true)
                        }
                    }
                }
                304 => {
                    debug!("Fetch was successful: not modified");
                    NotModified
                }
                code @ 401 | code @ 403 | code @ 404 => {
                    let msg = format!("Your API key or URL seems to be wrong. Status code: {code}");
                    error!(event_id = InvalidApiKey.as_u16(); "{}", msg);
                    Failed(ClientError::new(InvalidApiKey, msg), false)
                }
                code => {
                    let msg = format!("Unexpected HTTP response was received while trying to fetch flag definitions. Status code: {code}");
                    error!(event_id = UnexpectedHttpResponse.as_u16(); "{}", msg);
                    Failed(ClientError::new(UnexpectedHttpResponse, msg), true)
                }
            },
            Err(error) => {
                if error.is_timeout() {
                    let msg = "Request timed out while trying to fetch flag definitions.".to_owned();
                    error!(event_id = HttpRequestTimeout.as_u16(); "{}", msg);
                    Failed(ClientError::new(HttpRequestTimeout, msg), true)
                } else {
                    let msg = format!("Unexpected error occurred while trying to fetch flag definitions. It is most likely due to a local network issue. Please make sure your application can reach the backend over HTTP. {error}");
                    error!(event_id = BackendUnreachable.as_u16(); "{}", msg);
                    Failed(ClientError::new(BackendUnreachable, msg), true)
                }
            }
        }
    }
}

#[cfg(test)]
mod fetch_tests {
    use std::time::Duration;

    use reqwest::header::{AUTHORIZATION, ETAG, IF_NONE_MATCH};
    use reqwest::Url;

    use crate::constants::test_constants::{MOCK_APP, MOCK_KEY, MOCK_PATH};
    use crate::constants::{APP_NAME_HEADER, INSTANCE_ID_HEADER, PKG_VERSION, SDK_HEADER};
    use crate::errors::ErrorKind;
    use crate::fetch::fetcher::FetchResponse::{Failed, Fetched, NotModified};
    use crate::fetch::fetcher::Fetcher;
    use crate::fetch::http_client;

    fn fetcher(url: String, timeout: Duration) -> Fetcher {
        let client = http_client(MOCK_APP, "instance-1", Some(MOCK_KEY), timeout).unwrap();
        let url = Url::parse(format!("{url}/api/").as_str())
            .unwrap()
            .join("client/features")
            .unwrap();
        Fetcher::new(url, client)
    }

    #[tokio::test]
    async fn fetch_http() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", MOCK_PATH)
            .with_status(200)
            .match_header(AUTHORIZATION.as_str(), MOCK_KEY)
            .match_header(APP_NAME_HEADER, MOCK_APP)
            .match_header(INSTANCE_ID_HEADER, "instance-1")
            .match_header(SDK_HEADER, format!("unleash-rust:{PKG_VERSION}").as_str())
            .with_body(r#"{"version": 1, "features": [{"name": "f", "enabled": true}]}"#)
            .create_async()
            .await;

        let response = fetcher(server.url(), Duration::from_secs(30)).fetch("").await;
        match response {
            Fetched(snapshot) => assert_eq!(snapshot.names(), vec!["f"]),
            _ => panic!(),
        }
        m.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_http_etag() {
        let mut server = mockito::Server::new_async().await;
        let m1 = server
            .mock("GET", MOCK_PATH)
            .with_status(200)
            .with_header(ETAG.as_str(), "etag1")
            .with_body(r#"{"version": 1, "features": []}"#)
            .create_async()
            .await;

        let m2 = server
            .mock("GET", MOCK_PATH)
            .match_header(IF_NONE_MATCH.as_str(), "etag1")
            .with_status(304)
            .with_header(ETAG.as_str(), "etag1")
            .create_async()
            .await;

        let fetcher = fetcher(server.url(), Duration::from_secs(30));
        let etag = match fetcher.fetch("").await {
            Fetched(snapshot) => snapshot.etag,
            _ => panic!(),
        };
        assert_eq!("etag1", etag);

        let response = fetcher.fetch(etag.as_str()).await;
        assert!(matches!(response, NotModified));

        m1.assert_async().await;
        m2.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_http_failed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", MOCK_PATH)
            .with_status(401)
            .create_async()
            .await;

        let fetcher = fetcher(server.url(), Duration::from_secs(30));
        match fetcher.fetch("").await {
            Failed(err, transient) => {
                assert!(!transient);
                assert_eq!(err.kind, ErrorKind::InvalidApiKey);
                assert_eq!(
                    format!("{err}").as_str(),
                    "Your API key or URL seems to be wrong. Status code: 401"
                );
            }
            _ => panic!(),
        }
    }

    #[tokio::test]
    async fn fetch_http_server_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", MOCK_PATH)
            .with_status(500)
            .create_async()
            .await;

        let fetcher = fetcher(server.url(), Duration::from_secs(30));
        match fetcher.fetch("").await {
            Failed(err, transient) => {
                assert!(transient);
                assert_eq!(err.kind, ErrorKind::UnexpectedHttpResponse);
                assert_eq!(format!("{err}").as_str(), "Unexpected HTTP response was received while trying to fetch flag definitions. Status code: 500");
            }
            _ => panic!(),
        }
    }

    #[tokio::test]
    async fn fetch_http_body_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", MOCK_PATH)
            .with_status(200)
            .with_body(r#"{"features": ["#)
            .create_async()
            .await;

        let fetcher = fetcher(server.url(), Duration::from_secs(30));
        match fetcher.fetch("").await {
            Failed(err, transient) => {
                assert!(transient);
                assert_eq!(err.kind, ErrorKind::MalformedResponse);
                assert!(format!("{err}").starts_with("Fetching flag definitions was successful but the HTTP response content was invalid. JSON parsing failed."));
            }
            _ => panic!(),
        }
    }

    #[tokio::test]
    async fn fetch_unreachable() {
        let fetcher = fetcher("http://127.0.0.1:1".to_owned(), Duration::from_secs(5));
        match fetcher.fetch("").await {
            Failed(err, transient) => {
                assert!(transient);
                assert!(matches!(
                    err.kind,
                    ErrorKind::BackendUnreachable | ErrorKind::HttpRequestTimeout
                ));
            }
            _ => panic!(),
        }
    }
}
