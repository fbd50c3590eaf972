//! Router URL construction.

use mrp_domain::config::{EndpointStyle, RouterConfig};
use reqwest::Url;

const SERVICE_NAME_KEY: &str = "serviceName";
const SESSION_ID_KEY: &str = "sessionId";

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("invalid endpoint URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Endpoints of one router for one target service.
#[derive(Debug, Clone)]
pub struct RouterEndpoints {
    base_url: String,
    service_name: String,
    sse_style: EndpointStyle,
    message_style: EndpointStyle,
}

impl RouterEndpoints {
    pub fn new(base_url: &str, service_name: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            service_name: service_name.to_owned(),
            sse_style: EndpointStyle::Path,
            message_style: EndpointStyle::Query,
        }
    }

    pub fn from_config(cfg: &RouterConfig) -> Self {
        Self::new(&cfg.base_url, &cfg.service_name)
            .with_sse_style(cfg.sse_style)
            .with_message_style(cfg.message_style)
    }

    pub fn with_sse_style(mut self, style: EndpointStyle) -> Self {
        self.sse_style = style;
        self
    }

    pub fn with_message_style(mut self, style: EndpointStyle) -> Self {
        self.message_style = style;
        self
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET <base>/sse/<svc>` or `GET <base>/sse?serviceName=<svc>`.
    pub fn sse_url(&self) -> Result<String, EndpointError> {
        let mut url = self.parse_base()?;
        match self.sse_style {
            EndpointStyle::Path => {
                push_segments(&mut url, &["sse", &self.service_name])?;
            }
            EndpointStyle::Query => {
                push_segments(&mut url, &["sse"])?;
                url.query_pairs_mut()
                    .append_pair(SERVICE_NAME_KEY, &self.service_name);
            }
        }
        Ok(url.into())
    }

    /// `POST <base>/mcp/<svc>/message?sessionId=<T>` or
    /// `POST <base>/mcp/message?sessionId=<T>&serviceName=<svc>`.
    pub fn message_url(&self, session_id: &str) -> Result<String, EndpointError> {
        let mut url = self.parse_base()?;
        match self.message_style {
            EndpointStyle::Path => {
                push_segments(&mut url, &["mcp", &self.service_name, "message"])?;
                url.query_pairs_mut().append_pair(SESSION_ID_KEY, session_id);
            }
            EndpointStyle::Query => {
                push_segments(&mut url, &["mcp", "message"])?;
                url.query_pairs_mut()
                    .append_pair(SESSION_ID_KEY, session_id)
                    .append_pair(SERVICE_NAME_KEY, &self.service_name);
            }
        }
        Ok(url.into())
    }

    fn parse_base(&self) -> Result<Url, EndpointError> {
        Url::parse(&self.base_url).map_err(|e| EndpointError::InvalidUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })
    }
}

fn push_segments(url: &mut Url, segments: &[&str]) -> Result<(), EndpointError> {
    let display = url.to_string();
    let mut path = url
        .path_segments_mut()
        .map_err(|()| EndpointError::InvalidUrl {
            url: display,
            reason: "URL cannot be a base".into(),
        })?;
    path.pop_if_empty().extend(segments);
    Ok(())
}

/// Append `serviceName=<service>` unless the URL already carries that key.
pub fn ensure_service_name(endpoint: &str, service: Option<&str>) -> Result<String, EndpointError> {
    let mut url = Url::parse(endpoint).map_err(|e| EndpointError::InvalidUrl {
        url: endpoint.to_owned(),
        reason: e.to_string(),
    })?;

    let Some(service) = service.filter(|s| !s.is_empty()) else {
        return Ok(url.into());
    };

    if !url.query_pairs().any(|(k, _)| k == SERVICE_NAME_KEY) {
        url.query_pairs_mut().append_pair(SERVICE_NAME_KEY, service);
    }
    Ok(url.into())
}
