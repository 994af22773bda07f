use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};

use crate::config::ServiceEndpoint;
use crate::error::GiCatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Option<Duration>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(Method::Post, url).body(body)
    }

    pub fn put(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(Method::Put, url).body(body)
    }

    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets a header, replacing any earlier value with the same
    /// case-insensitive name.
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// `Content-Type: application/xml`, no credentials.
    pub fn standard_headers(self) -> Self {
        self.header("Content-Type", "application/xml")
    }

    pub fn authorized(self, endpoint: &ServiceEndpoint) -> Self {
        self.header("Content-Type", "*/*")
            .header("Accept", "application/xml")
            .header("Authorization", endpoint.authorization())
    }

    /// Authorized headers plus the multipart marker the admin forms expect.
    pub fn multipart(self, endpoint: &ServiceEndpoint) -> Self {
        self.authorized(endpoint)
            .header("enctype", "multipart/form-data")
    }

    pub fn form(self, endpoint: &ServiceEndpoint) -> Self {
        self.multipart(endpoint)
            .header("Content-Type", "application/x-www-form-urlencoded")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpOutcome {
    Success,
    HttpError(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    /// Only 200 counts as success; the admin API never answers 201/204.
    pub fn outcome(&self) -> HttpOutcome {
        match self.status {
            200 => HttpOutcome::Success,
            code => HttpOutcome::HttpError(code),
        }
    }

    pub fn into_success(self) -> Result<String, GiCatError> {
        match self.outcome() {
            HttpOutcome::Success => Ok(self.body),
            HttpOutcome::HttpError(status) => Err(GiCatError::Status {
                status,
                message: if self.body.trim().is_empty() {
                    "GI-Cat request failed".to_string()
                } else {
                    self.body
                },
            }),
        }
    }
}

pub trait HttpTransport: Send + Sync {
    fn send(&self, request: &Request) -> Result<HttpResponse, GiCatError>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for &T {
    fn send(&self, request: &Request) -> Result<HttpResponse, GiCatError> {
        (**self).send(request)
    }
}

#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, GiCatError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("gicat-driver/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| GiCatError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| GiCatError::Http(err.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: &Request) -> Result<HttpResponse, GiCatError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Put => self.client.put(&request.url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| GiCatError::Http(err.to_string()))?;
            let value =
                HeaderValue::from_str(value).map_err(|err| GiCatError::Http(err.to_string()))?;
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .map_err(|err| GiCatError::Http(err.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|err| GiCatError::Http(err.to_string()))?;
        Ok(HttpResponse { status, body })
    }
}
