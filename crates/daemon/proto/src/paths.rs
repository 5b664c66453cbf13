//! Default daemon address resolution.

/// Default TCP port of the daemon API.
pub const DEFAULT_PORT: u16 = 5279;

/// Returns the URL clients use to reach the daemon.
///
/// # Resolution Order
///
/// 1. `CTRLD_API_URL` environment variable.
/// 2. `http://127.0.0.1:{DEFAULT_PORT}/`.
#[must_use]
pub fn default_api_url() -> String {
	if let Ok(url) = std::env::var("CTRLD_API_URL")
		&& !url.is_empty()
	{
		return url;
	}
	api_url("127.0.0.1", DEFAULT_PORT)
}

/// Builds the API URL for a host and port.
#[must_use]
pub fn api_url(host: &str, port: u16) -> String {
	format!("http://{host}:{port}/")
}
