//! `mrp-cli`: diagnostic scenarios for an MCP router, driven by `mcp-router-probe`.

pub mod cli;
