//! Per-request dispatch.
//!
//! The dispatcher resolves an operation by name, checks the query against the
//! operation's shape, fetches the remote image for paste operations and hands
//! the arguments to the engine. Argument errors are raised before the engine
//! or the fetcher are touched.

use std::sync::Arc;

use tracing::{debug, instrument};
use url::Url;

use crate::engine::{GenerateArgs, ImageEngine, ImageStream};
use crate::error::{DispatchError, RegistryError};

use super::fetch::ImageFetcher;
use super::registry::{OperationRegistry, Shape};

/// Query parameters of an operation request.
///
/// `texts` keeps every occurrence in order; for `url` the last occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchRequest {
    pub texts: Vec<String>,
    pub url: Option<String>,
}

impl DispatchRequest {
    /// Parse a raw (still percent-encoded) query string.
    pub fn from_query(query: &str) -> Self {
        let mut request = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "texts" => request.texts.push(value.into_owned()),
                "url" => request.url = Some(value.into_owned()),
                _ => {}
            }
        }
        request
    }

    pub fn texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            texts: texts.into_iter().map(Into::into).collect(),
            url: None,
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self {
            texts: Vec::new(),
            url: Some(url.into()),
        }
    }
}

/// Turns validated requests into engine invocations.
///
/// Holds the registry built from the engine at construction, so every name it
/// routes is one the engine declared.
pub struct Dispatcher<E, F> {
    engine: Arc<E>,
    fetcher: F,
    registry: OperationRegistry,
}

impl<E: ImageEngine, F: ImageFetcher> Dispatcher<E, F> {
    /// Build the registry from `engine` and wrap both collaborators.
    pub fn new(engine: E, fetcher: F) -> Result<Self, RegistryError> {
        Self::from_shared(Arc::new(engine), fetcher)
    }

    /// Same as [`Dispatcher::new`] for an engine that is shared elsewhere.
    pub fn from_shared(engine: Arc<E>, fetcher: F) -> Result<Self, RegistryError> {
        let registry = OperationRegistry::from_engine(engine.as_ref())?;
        Ok(Self {
            engine,
            fetcher,
            registry,
        })
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Validate arguments for `name`, resolve them and invoke the engine.
    ///
    /// For text operations `url` is ignored; for paste operations `texts` is.
    #[instrument(skip(self, request), fields(operation = %name))]
    pub async fn dispatch(
        &self,
        name: &str,
        request: DispatchRequest,
    ) -> Result<ImageStream, DispatchError> {
        let descriptor = self
            .registry
            .get(name)
            .ok_or_else(|| DispatchError::UnknownOperation(name.to_string()))?;

        let args = match descriptor.shape() {
            Shape::Text { arity } => {
                if request.texts.len() != arity {
                    return Err(DispatchError::ArityMismatch {
                        expected: arity,
                        actual: request.texts.len(),
                    });
                }
                GenerateArgs::Texts(request.texts)
            }
            Shape::Paste => {
                let raw = request.url.ok_or(DispatchError::MissingUrl)?;
                let url = parse_remote_url(&raw)?;
                let data = self.fetcher.fetch(&url).await?;
                debug!(bytes = data.len(), "Input image fetched");
                GenerateArgs::Image(data)
            }
        };

        Ok(self.engine.generate(descriptor.name(), args).await?)
    }
}

/// Accept only absolute `http`/`https` URLs with a host.
fn parse_remote_url(raw: &str) -> Result<Url, DispatchError> {
    let url = Url::parse(raw).map_err(|e| DispatchError::InvalidUrl(format!("{}: {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" if url.host_str().is_some_and(|h| !h.is_empty()) => Ok(url),
        "http" | "https" => Err(DispatchError::InvalidUrl(format!("{}: missing host", raw))),
        scheme => Err(DispatchError::InvalidUrl(format!(
            "{}: unsupported scheme '{}'",
            raw, scheme
        ))),
    }
}
