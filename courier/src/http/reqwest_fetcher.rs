use reqwest::header::CONTENT_TYPE;

use super::{FetchRequest, FetchResponse};
use crate::error::{Error, ErrorKind, Result};

#[derive(Clone, Debug)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Redirects are not followed: a 3xx is an answer to classify, exactly as
    /// the hyper backend sees it.
    ///
    /// # Errors
    ///
    /// Returns an error if the client's TLS backend cannot be initialized.
    pub fn create() -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::new(ErrorKind::InvalidArgument, e.to_string()))?;
        Ok(Self { client })
    }

    /// # Errors
    ///
    /// Returns an error when no HTTP response was received.
    pub async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        let rsp = self
            .client
            .post(&request.url)
            .header(CONTENT_TYPE, request.content_type)
            .body(request.body)
            .send()
            .await
            .map_err(|e| Error::new(ErrorKind::HttpSendReqFailed, root_cause(&e)))?;

        let status = rsp.status();
        let content_type = rsp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = rsp
            .bytes()
            .await
            .map_err(|e| Error::new(ErrorKind::HttpWaitRspFailed, root_cause(&e)))?;

        Ok(FetchResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            content_type,
            body,
        })
    }
}

/// reqwest wraps the interesting part (refused, unresolvable, reset) several
/// layers deep.
fn root_cause(err: &(dyn std::error::Error + 'static)) -> String {
    let mut cause = err;
    while let Some(source) = cause.source() {
        cause = source;
    }
    cause.to_string()
}
