use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Request {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}")]
    Status { url: Url, status: StatusCode },
}

impl FetchError {
    /// 4xx responses; fetching the same URL again will not help
    pub fn is_client_error(&self) -> bool {
        matches!(self, FetchError::Status { status, .. } if status.is_client_error())
    }
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: Url,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchedPage {
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map_or(true, |ct| ct.to_ascii_lowercase().contains("html"))
    }
}

#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self { client })
    }

    pub async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let request_error = |source| FetchError::Request {
            url: url.clone(),
            source,
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.clone(),
                status,
            });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(request_error)?;

        Ok(FetchedPage {
            url: final_url,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::{StatusCode as HttpStatus, header};
    use axum::routing::get;

    async fn serve(app: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Url::parse(&format!("http://{}/", addr)).unwrap()
    }

    fn fetcher() -> Fetcher {
        Fetcher::new("crawler-worker-test", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_page() {
        let base = serve(Router::new().route(
            "/page",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                    "<a href=\"/x\">x</a>",
                )
            }),
        ))
        .await;

        let page = fetcher().fetch(&base.join("page").unwrap()).await.unwrap();

        assert_eq!(page.url.path(), "/page");
        assert!(page.is_html());
        assert_eq!(page.body, "<a href=\"/x\">x</a>");
    }

    #[tokio::test]
    async fn test_client_error_status() {
        let base = serve(Router::new().route("/gone", get(|| async { HttpStatus::GONE }))).await;

        let err = fetcher().fetch(&base.join("gone").unwrap()).await.unwrap_err();

        assert!(matches!(err, FetchError::Status { status, .. } if status == StatusCode::GONE));
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_server_error_is_not_client_error() {
        let base = serve(Router::new().route(
            "/broken",
            get(|| async { HttpStatus::INTERNAL_SERVER_ERROR }),
        ))
        .await;

        let err = fetcher().fetch(&base.join("broken").unwrap()).await.unwrap_err();
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_is_html() {
        let mut page = FetchedPage {
            url: Url::parse("https://www.example.org/").unwrap(),
            content_type: Some("text/html".into()),
            body: String::new(),
        };
        assert!(page.is_html());

        page.content_type = Some("image/png".into());
        assert!(!page.is_html());

        page.content_type = None;
        assert!(page.is_html());
    }
}
