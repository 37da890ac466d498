const HUB_URL: &str = "HUB_URL";

const DEFAULT_HUB_URL: &str = "http://127.0.0.1:3000";

pub fn get_hub_url() -> String {
    std::env::var(HUB_URL).unwrap_or_else(|_| DEFAULT_HUB_URL.to_string())
}

const AGENT_NAME: &str = "AGENT_NAME";

/// Server name the agent reports under, falling back to the host name.
pub fn get_agent_name() -> Option<String> {
    std::env::var(AGENT_NAME)
        .ok()
        .or_else(sysinfo::System::host_name)
}

const AGENT_INTERVAL: &str = "AGENT_INTERVAL";

const DEFAULT_AGENT_INTERVAL: u64 = 1;

pub fn get_agent_interval() -> u64 {
    let interval_from_env = std::env::var(AGENT_INTERVAL);
    interval_from_env.map_or(DEFAULT_AGENT_INTERVAL, |res| {
        res.parse().unwrap_or(DEFAULT_AGENT_INTERVAL)
    })
}

const COURIER_AUTH_TOKEN: &str = "COURIER_AUTH_TOKEN";

pub fn get_courier_token() -> Option<String> {
    std::env::var(COURIER_AUTH_TOKEN).ok()
}
