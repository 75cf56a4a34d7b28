//! Image generation engine seam.
//!
//! The gateway treats the engine as an opaque capability: it declares a table
//! of operations up front and turns arguments into a stream of JPEG bytes.
//!
//! ```text
//! ┌──────────────────────────────┐
//! │          Dispatcher          │
//! └──────────────┬───────────────┘
//!                │ generate(name, args)
//!                ▼
//! ┌──────────────────────────────┐      ┌──────────────────────┐
//! │     ImageEngine (trait)      │─────▶│ ImageStream (chunks) │
//! └──────────────┬───────────────┘      └──────────────────────┘
//!                │
//!                ▼
//! ┌──────────────────────────────┐
//! │  BasicEngine (image crate)   │
//! └──────────────────────────────┘
//! ```
//!
//! Operation declarations are explicit: each lists its parameters (without
//! any receiver) so the registry can classify it once at startup.

mod basic;
mod color;
mod stream;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;

use crate::error::EngineError;

pub use basic::{BasicEngine, CANVAS_SIZE, MAX_INPUT_DIMENSION};
pub use color::parse_color;
pub use stream::{stream_blocking, ChunkWriter, CHUNK_SIZE};

/// Default JPEG quality for generated images (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Declared type of one operation parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// A string
    Text,
    /// An image reference (bytes of an encoded image)
    Image,
    Integer,
    Float,
    Boolean,
}

/// One operation as declared by an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDecl {
    /// Operation name, also used as the route segment
    pub name: String,

    /// Parameter kinds in positional order
    pub params: Vec<ParamKind>,
}

impl OperationDecl {
    pub fn new(name: impl Into<String>, params: Vec<ParamKind>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// An operation taking `arity` strings.
    pub fn text(name: impl Into<String>, arity: usize) -> Self {
        Self::new(name, vec![ParamKind::Text; arity])
    }

    /// An operation taking one image.
    pub fn paste(name: impl Into<String>) -> Self {
        Self::new(name, vec![ParamKind::Image])
    }
}

/// Arguments passed to [`ImageEngine::generate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateArgs {
    /// Positional strings for a text operation
    Texts(Vec<String>),
    /// Encoded input image for a paste operation
    Image(Bytes),
}

/// Lazily produced image bytes.
pub type ImageStream = Pin<Box<dyn Stream<Item = Result<Bytes, EngineError>> + Send>>;

/// An image generator exposing named operations.
#[async_trait]
pub trait ImageEngine: Send + Sync + 'static {
    /// The operations this engine exposes.
    fn operations(&self) -> Vec<OperationDecl>;

    /// Run an operation.
    ///
    /// Argument problems should be reported here, before the stream starts;
    /// the stream itself yields encoded output as it is produced.
    async fn generate(&self, operation: &str, args: GenerateArgs)
        -> Result<ImageStream, EngineError>;
}
