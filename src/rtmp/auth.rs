use async_trait::async_trait;

/// Hook points for admission control on the RTMP paths. This is the
/// in-process seam for external policy (HTTP callbacks, referer and IP
/// checks); implementations decide, the session enforces.
///
/// Publish/play errors deny the operation; the unpublish/unplay
/// notifications are fire-and-forget.
#[async_trait]
pub trait AuthCallback: Send + Sync {
    /// Called before a publish is accepted.
    async fn on_publish(
        &self,
        app_name: &str,
        stream_name: &str,
        query: Option<&str>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Called before a play is accepted.
    async fn on_play(
        &self,
        app_name: &str,
        stream_name: &str,
        query: Option<&str>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Called when a publisher goes away, for cleanup.
    async fn on_unpublish(&self, _app_name: &str, _stream_name: &str, _query: Option<&str>) {}

    /// Called when a player goes away, for cleanup.
    async fn on_unplay(&self, _app_name: &str, _stream_name: &str, _query: Option<&str>) {}
}
