use mrp_domain::config::{Config, EndpointStyle};

#[test]
fn default_router_targets_local_router() {
    let config = Config::default();
    assert_eq!(config.router.base_url, "http://localhost:8052");
    assert_eq!(config.router.service_name, "mcp-server-v6");
    assert_eq!(config.router.sse_style, EndpointStyle::Path);
    assert_eq!(config.router.message_style, EndpointStyle::Query);
}

#[test]
fn default_request_timeout_exceeds_router_ceiling() {
    let config = Config::default();
    assert_eq!(config.request.timeout_ms, 70_000);
    assert!(config.request.timeout_ms > config.router.server_timeout_ms);
    assert_eq!(config.request.backoff_ms, 1000);
}

#[test]
fn default_sse_line_budget() {
    let config = Config::default();
    assert_eq!(config.sse.line_budget, 10);
    assert_eq!(config.sse.drain_join_timeout_ms, 2000);
}

#[test]
fn empty_toml_yields_defaults() {
    let config: Config = toml::from_str("").unwrap();
    assert_eq!(config.router.base_url, "http://localhost:8052");
    assert_eq!(config.request.transient_markers.len(), 3);
    assert!(config.scenario.warmup);
    assert!(config.scenario.router_log.is_none());
}

#[test]
fn partial_section_keeps_other_defaults() {
    let toml_str = r#"
[router]
service_name = "svc-A"
sse_style = "query"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.router.service_name, "svc-A");
    assert_eq!(config.router.sse_style, EndpointStyle::Query);
    assert_eq!(config.router.message_style, EndpointStyle::Query);
    assert_eq!(config.router.base_url, "http://localhost:8052");
}

#[test]
fn transient_codes_parse() {
    let toml_str = r#"
[request]
transient_markers = []
transient_codes = [-32001, -32603]
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert!(config.request.transient_markers.is_empty());
    assert_eq!(config.request.transient_codes, vec![-32001, -32603]);
}

#[test]
fn router_log_path_parses() {
    let toml_str = r#"
[scenario]
router_log = "/var/log/mcp-router.log"
keepalive_secs = 60
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(
        config.scenario.router_log.as_deref(),
        Some(std::path::Path::new("/var/log/mcp-router.log"))
    );
    assert_eq!(config.scenario.keepalive_secs, 60);
}
