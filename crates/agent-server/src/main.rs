use std::path::PathBuf;

use clap::Parser;

use agent_server::logging::init_logging;
use agent_server::{run_server, GatewayConfig};

#[derive(Parser, Debug, Clone)]
#[command(name = "agent-server")]
#[command(about = "Streaming WebSocket gateway for an OpenAI-compatible chat model")]
#[command(version)]
struct Cli {
    /// JSON config file; flags and environment override its values
    #[arg(long, env = "AGENT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, env = "DEBUG", default_value = "false")]
    debug: bool,

    /// Address to listen on
    #[arg(long, env = "LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// Token clients must present on connect
    #[arg(long, env = "AUTH_TOKEN")]
    auth_token: Option<String>,

    /// LLM API base URL
    #[arg(long, env = "LLM_BASE_URL")]
    llm_base_url: Option<String>,

    /// LLM model name
    #[arg(long, env = "LLM_MODEL")]
    model: Option<String>,

    /// LLM API key
    #[arg(long, env = "LLM_API_KEY")]
    api_key: Option<String>,

    /// System prompt for new sessions
    #[arg(long, env = "SYSTEM_PROMPT")]
    system_prompt: Option<String>,

    /// Prompt token limit; defaults to the model's context window
    #[arg(long, env = "MAX_PROMPT_TOKENS")]
    max_prompt_tokens: Option<i64>,
}

impl Cli {
    fn apply(self, mut config: GatewayConfig) -> GatewayConfig {
        if let Some(listen_addr) = self.listen_addr {
            config.listen_addr = listen_addr;
        }
        if self.auth_token.is_some() {
            config.auth_token = self.auth_token;
        }
        if let Some(base_url) = self.llm_base_url {
            config.llm_base_url = base_url;
        }
        if let Some(model) = self.model {
            config.model = model;
        }
        if let Some(api_key) = self.api_key {
            config.api_key = api_key;
        }
        if self.system_prompt.is_some() {
            config.system_prompt = self.system_prompt;
        }
        if self.max_prompt_tokens.is_some() {
            config.max_prompt_tokens = self.max_prompt_tokens;
        }
        config.debug |= self.debug;
        config
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = GatewayConfig::load(cli.config.as_deref())?;
    let config = cli.apply(config);

    init_logging(config.debug);

    log::info!("Starting agent gateway on {}", config.listen_addr);
    log::info!("LLM Configuration:");
    log::info!("  Base URL: {}", config.llm_base_url);
    log::info!("  Model: {}", config.model);
    log::info!("  Prompt limit: {} tokens", config.effective_max_prompt_tokens());

    if config.debug {
        log::debug!("Debug mode enabled");
        log::debug!("  Heartbeat: {:?}", config.heartbeat_interval());
        log::debug!("  Client timeout: {:?}", config.client_timeout());
        log::debug!("  Request timeout: {}s", config.request_timeout_secs);
    }

    run_server(config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_values() {
        let cli = Cli::parse_from([
            "agent-server",
            "--listen-addr",
            "0.0.0.0:9000",
            "--model",
            "gpt-4o-mini",
            "--max-prompt-tokens",
            "2048",
        ]);
        let config = cli.apply(GatewayConfig::default());
        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_prompt_tokens, Some(2048));
        assert_eq!(config.default_reserve, 800);
    }
}
