use crate::error::{ErrorKind, Result};
use crate::transport::{Outbound, TransportHandle, Upstream};
use exn::ResultExt;
use hondana_extension::error::ErrorKind as ExtensionErrorKind;
use hondana_extension::{ExtensionDescriptor, StoreHandle};
use reqwest::Url;
use reqwest::header::{HeaderMap, HeaderValue, REFERER, USER_AGENT};
use tracing::{debug, instrument};

/// Replays image fetches with the originating source's spoofed headers.
///
/// The request headers come from the source's header policy. When the
/// policy leaves them out, `Referer` defaults to the source's endpoint and
/// `User-Agent` to the configured default (if any). The response is
/// returned as-is: status, content type and body bytes are not touched,
/// and nothing is cached.
pub struct Relay {
    store: StoreHandle,
    transport: TransportHandle,
    user_agent: Option<HeaderValue>,
}

impl Relay {
    pub fn new(store: StoreHandle, transport: TransportHandle) -> Self {
        Self {
            store,
            transport,
            user_agent: None,
        }
    }

    /// Default `User-Agent` for sources whose policy doesn't set one.
    pub fn with_user_agent(mut self, user_agent: &str) -> Result<Self> {
        let value = HeaderValue::from_str(user_agent).or_raise(|| ErrorKind::InvalidPolicy(USER_AGENT.to_string()))?;
        self.user_agent = Some(value);
        Ok(self)
    }

    #[instrument(skip(self))]
    pub async fn fetch(&self, source_key: &str, target: &str) -> Result<Upstream> {
        let url = Url::parse(target).or_raise(|| ErrorKind::InvalidUrl)?;
        if !matches!(url.scheme(), "http" | "https") {
            exn::bail!(ErrorKind::InvalidUrl);
        }
        let descriptor = match self.store.get(source_key).await {
            Ok(descriptor) => descriptor,
            Err(err) => {
                let kind = match &*err {
                    ExtensionErrorKind::NotFound(_) => ErrorKind::NotFound(source_key.to_string()),
                    _ => ErrorKind::StoreUnavailable,
                };
                return Err(err.raise(kind));
            },
        };
        let headers = self.headers(&descriptor)?;
        debug!(headers = headers.len(), "relaying request");
        self.transport.send(Outbound { url, headers }).await
    }

    fn headers(&self, descriptor: &ExtensionDescriptor) -> Result<HeaderMap> {
        let mut headers = descriptor
            .headers
            .to_header_map()
            .map_err(|err| ErrorKind::InvalidPolicy(err.name().to_string()))?;
        if !headers.contains_key(REFERER)
            && let Ok(endpoint) = HeaderValue::from_str(&descriptor.endpoint)
        {
            headers.insert(REFERER, endpoint);
        }
        if !headers.contains_key(USER_AGENT)
            && let Some(user_agent) = &self.user_agent
        {
            headers.insert(USER_AGENT, user_agent.clone());
        }
        Ok(headers)
    }
}
