use anyhow::{Context, Error as AnyhowError, Result};
use clap::Args;
use cookie::Cookie;
use derive_getters::Getters;
use reqwest::header::{COOKIE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, ClientBuilder, Proxy, redirect::Policy};
use secrecy::{ExposeSecret, SecretString};
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Args, Getters, Clone, Copy)]
pub struct RetryArgs {
    /// Additional attempts made after the first one when the connection
    /// itself fails (refused, DNS, TLS). HTTP error statuses are never retried.
    #[arg(short = 'r', long, default_value_t = 3)]
    pub max_attempts: u32,
}

impl RetryArgs {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }
}

impl Default for RetryArgs {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Where requests get their proxy from.
#[derive(Debug, Clone)]
pub enum ProxySettings {
    Explicit {
        url: String,
        username: Option<String>,
        password: Option<SecretString>,
    },
    /// `ALL_PROXY`, then `HTTP_PROXY`/`HTTPS_PROXY` by scheme, upper case before lower case.
    Environment,
    Disabled,
}

#[derive(Debug, Args, Clone, Default)]
pub struct ProxyArgs {
    /// Proxy used for every request, overrides proxy environment variables.
    #[arg(short = 'p', long, env = "SEGFETCH_PROXY_URL")]
    pub proxy_url: Option<String>,
    #[arg(long, requires = "proxy_url")]
    pub proxy_username: Option<String>,
    #[arg(long, requires = "proxy_url")]
    pub proxy_password: Option<SecretString>,
    /// Ignore proxy environment variables and connect directly.
    #[arg(long, conflicts_with = "proxy_url")]
    pub no_proxy: bool,
}

impl ProxyArgs {
    pub fn settings(&self) -> ProxySettings {
        if self.no_proxy {
            return ProxySettings::Disabled;
        }
        match &self.proxy_url {
            Some(url) => ProxySettings::Explicit {
                url: url.clone(),
                username: self.proxy_username.clone(),
                password: self.proxy_password.clone(),
            },
            None => ProxySettings::Environment,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct HttpArgs {
    #[command(flatten)]
    pub retry_args: RetryArgs,
    #[command(flatten)]
    pub proxy_args: ProxyArgs,
    /// Set http basic authentication username used for login to the site.
    #[arg(short = 'U', long, env = "SEGFETCH_HTTP_USERNAME")]
    pub username: Option<String>,
    /// Set http basic authentication password to used for login to the site.
    #[arg(short = 'P', long, env = "SEGFETCH_HTTP_PASSWORD")]
    pub password: Option<SecretString>,
    /// Maximum http redirects this application will follow.
    #[arg(long)]
    pub max_redirects: Option<usize>,
    /// Timeout (in secs) for each http request attempt.
    #[arg(short = 'T', long, default_value_t = 60)]
    pub timeout: u64,
    /// Skip TLS certificate verification.
    #[arg(short = 'k', long)]
    pub insecure: bool,
    /// Use a colon separated key value pair e.g key1:value1,key2:value2 for request headers.
    #[arg(short = 'H', long)]
    pub request_headers: Option<String>,
    /// Add http cookies from previous http session.
    #[arg(long)]
    pub http_cookies: Option<String>,
}

impl Default for HttpArgs {
    fn default() -> Self {
        Self {
            retry_args: RetryArgs::default(),
            proxy_args: ProxyArgs::default(),
            username: None,
            password: None,
            max_redirects: None,
            timeout: 60,
            insecure: false,
            request_headers: None,
            http_cookies: None,
        }
    }
}

impl TryFrom<&HttpArgs> for Client {
    type Error = AnyhowError;

    /// Tries to convert an `HttpArgs` into a `reqwest::Client`.
    fn try_from(http_args: &HttpArgs) -> Result<Self, Self::Error> {
        build_client(http_args)
    }
}

/// Resolves a proxy for `scheme` from environment variables.
///
/// `ALL_PROXY`/`all_proxy` takes precedence over the scheme specific
/// `HTTP_PROXY`/`http_proxy` or `HTTPS_PROXY`/`https_proxy`. Empty values
/// count as unset.
pub fn proxy_from_env<F>(scheme: &str, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let scheme_vars: &[&str] = match scheme {
        "http" => &["HTTP_PROXY", "http_proxy"],
        "https" => &["HTTPS_PROXY", "https_proxy"],
        _ => &[],
    };
    ["ALL_PROXY", "all_proxy"]
        .iter()
        .chain(scheme_vars)
        .filter_map(|var| lookup(*var))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

/// Proxy environment captured once, when the client is built.
#[derive(Debug, Clone, Default)]
struct EnvProxies {
    http: Option<String>,
    https: Option<String>,
}

impl EnvProxies {
    fn capture() -> Self {
        let lookup = |var: &str| std::env::var(var).ok();
        Self {
            http: proxy_from_env("http", lookup),
            https: proxy_from_env("https", lookup),
        }
    }

    fn for_scheme(&self, scheme: &str) -> Option<&str> {
        match scheme {
            "http" => self.http.as_deref(),
            "https" => self.https.as_deref(),
            _ => None,
        }
    }
}

fn parse_request_headers(request_headers: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    // comma separated header value e.g name:johndoe,age:23
    for header in request_headers.split(',').map(str::trim) {
        match header.split_once(':') {
            Some((name, value)) => {
                headers.insert(
                    HeaderName::from_str(name.trim())
                        .with_context(|| format!("Invalid header name {name:?}"))?,
                    HeaderValue::from_str(value.trim())
                        .with_context(|| format!("Invalid value for header {name:?}"))?,
                );
            }
            None if header.is_empty() => {}
            None => warn!("Ignoring malformed request header {header:?}, expected key:value"),
        }
    }
    Ok(headers)
}

fn build_client(http_args: &HttpArgs) -> Result<Client, AnyhowError> {
    let mut client_config = ClientBuilder::new();
    info!("Initialized client builder.");

    let policy: Policy = if let Some(max_redirects) = http_args.max_redirects {
        info!("Maximum redirect has been set to {}", max_redirects);
        Policy::limited(max_redirects)
    } else {
        Policy::default()
    };

    info!("Setting per attempt timeout to {}s.", http_args.timeout);
    client_config = client_config
        .timeout(Duration::from_secs(http_args.timeout))
        .redirect(policy);

    if http_args.insecure {
        warn!("TLS certificate verification is disabled.");
        client_config = client_config.danger_accept_invalid_certs(true);
    }

    client_config = match http_args.proxy_args.settings() {
        ProxySettings::Explicit { url, username, password } => {
            info!("Setting up user-defined proxy.");
            let mut proxy = Proxy::all(&url).with_context(|| format!("Invalid proxy url {url}"))?;
            if let Some(username) = username {
                let password = password.as_ref().map_or("", |p| p.expose_secret());
                proxy = proxy.basic_auth(&username, password);
            }
            client_config.proxy(proxy)
        }
        ProxySettings::Environment => {
            let env_proxies = EnvProxies::capture();
            info!(
                http = env_proxies.http.is_some(),
                https = env_proxies.https.is_some(),
                "Using proxies from environment."
            );
            client_config.proxy(Proxy::custom(move |url| {
                env_proxies.for_scheme(url.scheme()).map(str::to_owned)
            }))
        }
        ProxySettings::Disabled => {
            info!("Proxy disabled.");
            client_config.no_proxy()
        }
    };

    let mut default_headers = HeaderMap::new();
    if let Some(request_headers) = &http_args.request_headers {
        info!("Setting up user-defined HTTP headers.");
        default_headers.extend(parse_request_headers(request_headers)?);
    }

    if let Some(cookies_str) = &http_args.http_cookies {
        info!("Setting up user-defined HTTP cookies.");
        match Cookie::parse(cookies_str.as_str()) {
            Ok(cookie) => {
                default_headers.insert(COOKIE, HeaderValue::from_str(cookie.to_string().as_ref())?);
            }
            Err(err) => {
                error!(error = %err, "Can't sanitize cookie");
            }
        }
    }

    let client = client_config.default_headers(default_headers).build()?;
    info!("Built HTTP client with User configuration");
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_all_proxy_beats_scheme_proxy() {
        let env = lookup(&[("HTTPS_PROXY", "http://scheme:1"), ("all_proxy", "http://all:1")]);
        assert_eq!(proxy_from_env("https", &env), Some("http://all:1".into()));
    }

    #[test]
    fn test_scheme_specific_proxy() {
        let env = lookup(&[("http_proxy", "http://plain:8080"), ("HTTPS_PROXY", "http://secure:8443")]);
        assert_eq!(proxy_from_env("http", &env), Some("http://plain:8080".into()));
        assert_eq!(proxy_from_env("https", &env), Some("http://secure:8443".into()));
    }

    #[test]
    fn test_upper_case_beats_lower_case() {
        let env = lookup(&[("HTTP_PROXY", "http://upper:1"), ("http_proxy", "http://lower:1")]);
        assert_eq!(proxy_from_env("http", &env), Some("http://upper:1".into()));
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let env = lookup(&[("ALL_PROXY", "  "), ("https_proxy", "http://secure:1")]);
        assert_eq!(proxy_from_env("https", &env), Some("http://secure:1".into()));
        assert_eq!(proxy_from_env("http", &env), None);
        assert_eq!(proxy_from_env("ftp", &lookup(&[("HTTP_PROXY", "http://x:1")])), None);
    }

    #[test]
    fn test_proxy_settings_precedence() {
        let explicit = ProxyArgs {
            proxy_url: Some("http://proxy:3128".into()),
            ..ProxyArgs::default()
        };
        assert!(matches!(explicit.settings(), ProxySettings::Explicit { .. }));
        assert!(matches!(ProxyArgs::default().settings(), ProxySettings::Environment));
        let disabled = ProxyArgs { no_proxy: true, ..ProxyArgs::default() };
        assert!(matches!(disabled.settings(), ProxySettings::Disabled));
    }

    #[test]
    fn test_parse_request_headers() -> Result<()> {
        let headers = parse_request_headers("x-token:abc, accept : application/octet-stream,,bogus")?;
        assert_eq!(headers.len(), 2);
        assert_eq!(headers["x-token"], "abc");
        assert_eq!(headers["accept"], "application/octet-stream");
        Ok(())
    }

    #[test]
    fn test_invalid_header_name_is_rejected() {
        assert!(parse_request_headers("bad header:1").is_err());
    }

    #[test]
    fn test_client_builds_from_args() -> Result<()> {
        let args = HttpArgs {
            request_headers: Some("x-one:1".into()),
            insecure: true,
            max_redirects: Some(2),
            ..HttpArgs::default()
        };
        Client::try_from(&args)?;
        Ok(())
    }
}
