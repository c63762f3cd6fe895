use crate::streamhub::stream::{StreamIdentifier, DEFAULT_VHOST};

/// Pieces of `rtmp://host[:port]/app[/...]/stream[?k=v&...]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RtmpUrlParser {
    pub raw_url: String,
    pub host_with_port: String,
    pub host: String,
    pub port: Option<u16>,
    pub app_name: String,
    pub stream_name: String,
    pub query: Option<String>,
}

impl RtmpUrlParser {
    #[must_use]
    pub fn new(url: String) -> Self {
        Self {
            raw_url: url,
            ..Self::default()
        }
    }

    pub fn parse_url(&mut self) -> Result<(), String> {
        let without_scheme = self
            .raw_url
            .strip_prefix("rtmp://")
            .ok_or_else(|| format!("not an rtmp url: {}", self.raw_url))?;

        let mut parts = without_scheme.splitn(2, '/');
        self.host_with_port = parts
            .next()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| format!("no host in url: {}", self.raw_url))?
            .to_string();
        let path = parts
            .next()
            .ok_or_else(|| format!("no app/stream in url: {}", self.raw_url))?;

        match self.host_with_port.rsplit_once(':') {
            Some((host, port)) => {
                self.host = host.to_string();
                self.port = Some(
                    port.parse::<u16>()
                        .map_err(|_| format!("bad port in url: {}", self.raw_url))?,
                );
            }
            None => {
                self.host = self.host_with_port.clone();
            }
        }

        //the last path segment is the stream name, everything before
        //it belongs to the app
        let (app_name, stream_with_query) = path
            .rsplit_once('/')
            .ok_or_else(|| format!("no stream name in url: {}", self.raw_url))?;
        if app_name.is_empty() {
            return Err(format!("empty app name in url: {}", self.raw_url));
        }
        self.app_name = app_name.to_string();

        let (stream_name, query) = split_stream_query(stream_with_query);
        if stream_name.is_empty() {
            return Err(format!("empty stream name in url: {}", self.raw_url));
        }
        self.stream_name = stream_name;
        self.query = query;

        Ok(())
    }

    /// The vhost this URL resolves to (query beats host).
    #[must_use]
    pub fn vhost(&self) -> String {
        resolve_vhost(&self.host, self.query.as_deref())
    }

    #[must_use]
    pub fn identifier(&self) -> StreamIdentifier {
        StreamIdentifier::new(self.vhost(), self.app_name.clone(), self.stream_name.clone())
    }
}

/// Splits `name?k=v&...` into the bare stream name and its query.
#[must_use]
pub fn split_stream_query(stream: &str) -> (String, Option<String>) {
    match stream.split_once('?') {
        Some((name, query)) => (name.to_string(), Some(query.to_string())),
        None => (stream.to_string(), None),
    }
}

/// Vhost resolution priority: `?vhost=`, `?domain=`, then the host
/// itself. An IP-literal host falls through to the default vhost.
#[must_use]
pub fn resolve_vhost(host: &str, query: Option<&str>) -> String {
    if let Some(query) = query {
        for pair in query.split('&') {
            if let Some((key, value)) = pair.split_once('=') {
                if (key == "vhost" || key == "domain") && !value.is_empty() {
                    return value.to_string();
                }
            }
        }
    }

    if host.is_empty() || host.parse::<std::net::IpAddr>().is_ok() {
        DEFAULT_VHOST.to_string()
    } else {
        host.to_string()
    }
}

/// Extracts the host part of an RTMP `tcUrl`.
#[must_use]
pub fn tc_url_host(tc_url: &str) -> Option<String> {
    let without_scheme = tc_url.strip_prefix("rtmp://")?;
    let host_with_port = without_scheme.split('/').next()?;
    let host = host_with_port
        .rsplit_once(':')
        .map_or(host_with_port, |(host, _)| host);
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_url() {
        let mut parser =
            RtmpUrlParser::new("rtmp://example.com:1936/live/foo?vhost=cdn.example.com".to_string());
        parser.parse_url().unwrap();
        assert_eq!(parser.host, "example.com");
        assert_eq!(parser.port, Some(1936));
        assert_eq!(parser.app_name, "live");
        assert_eq!(parser.stream_name, "foo");
        assert_eq!(parser.query.as_deref(), Some("vhost=cdn.example.com"));
        assert_eq!(parser.vhost(), "cdn.example.com");
    }

    #[test]
    fn test_parse_nested_app() {
        let mut parser = RtmpUrlParser::new("rtmp://host/live/sub/foo".to_string());
        parser.parse_url().unwrap();
        assert_eq!(parser.app_name, "live/sub");
        assert_eq!(parser.stream_name, "foo");
    }

    #[test]
    fn test_parse_rejects_non_rtmp() {
        let mut parser = RtmpUrlParser::new("http://host/live/foo".to_string());
        assert!(parser.parse_url().is_err());
    }

    #[test]
    fn test_vhost_falls_back_to_default_for_ip() {
        assert_eq!(resolve_vhost("192.168.1.7", None), DEFAULT_VHOST);
        assert_eq!(resolve_vhost("example.com", None), "example.com");
    }

    #[test]
    fn test_vhost_query_beats_domain() {
        assert_eq!(
            resolve_vhost("example.com", Some("domain=a.com&vhost=b.com")),
            "b.com"
        );
        assert_eq!(resolve_vhost("example.com", Some("domain=a.com")), "a.com");
    }

    #[test]
    fn test_tc_url_host() {
        assert_eq!(
            tc_url_host("rtmp://example.com:1935/live"),
            Some("example.com".to_string())
        );
        assert_eq!(tc_url_host("bogus"), None);
    }
}
