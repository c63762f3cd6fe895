use serde::Serialize;
use std::fmt;

/// Vhost substituted when the client names none.
pub const DEFAULT_VHOST: &str = "__defaultVhost__";

/// The key a live stream is published and played under. Comparison is
/// byte-exact; the default vhost is substituted at parse time, never
/// during comparison.
#[derive(Debug, Clone, Serialize, Hash, PartialEq, Eq)]
pub struct StreamIdentifier {
    pub vhost: String,
    pub app_name: String,
    pub stream_name: String,
}

impl StreamIdentifier {
    #[must_use]
    pub fn new(vhost: impl Into<String>, app_name: impl Into<String>, stream_name: impl Into<String>) -> Self {
        let vhost = vhost.into();
        Self {
            vhost: if vhost.is_empty() {
                DEFAULT_VHOST.to_string()
            } else {
                vhost
            },
            app_name: app_name.into(),
            stream_name: stream_name.into(),
        }
    }

    #[must_use]
    pub fn with_default_vhost(app_name: impl Into<String>, stream_name: impl Into<String>) -> Self {
        Self::new(DEFAULT_VHOST, app_name, stream_name)
    }
}

impl fmt::Display for StreamIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}/{}", self.vhost, self.app_name, self.stream_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_vhost_becomes_default() {
        let id = StreamIdentifier::new("", "live", "foo");
        assert_eq!(id.vhost, DEFAULT_VHOST);
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let a = StreamIdentifier::with_default_vhost("live", "Foo");
        let b = StreamIdentifier::with_default_vhost("live", "foo");
        assert_ne!(a, b);
    }

    #[test]
    fn test_display() {
        let id = StreamIdentifier::new("example.com", "live", "foo");
        assert_eq!(id.to_string(), "example.com/live/foo");
    }
}
