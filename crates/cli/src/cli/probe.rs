//! Shared wiring for the scenarios: endpoints, HTTP clients and options.

use std::time::Duration;

use mrp_client::{
    BootstrapOptions, CorrelatedRequest, CorrelatedSender, RequestId, RouterEndpoints,
    SenderOptions,
};
use mrp_domain::config::Config;

pub struct Probe {
    pub config: Config,
    pub endpoints: RouterEndpoints,
    /// Client for SSE streams (connect timeout only).
    pub http: reqwest::Client,
    pub sender: CorrelatedSender,
}

impl Probe {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let endpoints = RouterEndpoints::from_config(&config.router);
        let http = mrp_client::sse_http_client(Duration::from_millis(config.sse.connect_timeout_ms))?;
        let sender = CorrelatedSender::new(SenderOptions::from_config(&config.request))?;
        Ok(Self {
            config,
            endpoints,
            http,
            sender,
        })
    }

    pub fn bootstrap_options(&self) -> BootstrapOptions {
        BootstrapOptions::from_config(&self.config.sse)
    }

    pub fn service_name(&self) -> &str {
        self.endpoints.service_name()
    }

    /// A request against the configured message endpoint for `session_id`.
    pub fn request(
        &self,
        method: &str,
        id: impl Into<RequestId>,
        session_id: &str,
        max_retries: u32,
    ) -> anyhow::Result<CorrelatedRequest> {
        let endpoint = self.endpoints.message_url(session_id)?;
        Ok(CorrelatedRequest::new(method, id, endpoint)
            .with_service_name(self.service_name())
            .with_max_retries(max_retries))
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.config.scenario.pacing_ms)
    }
}

/// Header block printed at the top of each scenario.
pub fn print_banner(title: &str, probe: &Probe) {
    println!("{title}");
    println!("{}", "=".repeat(title.len()));
    println!("  router:  {}", probe.endpoints.base_url());
    println!("  service: {}", probe.service_name());
    println!();
}
