//! Built-in engine on the `image` crate.
//!
//! Text operations render a canvas from color arguments; paste operations
//! transform the supplied image. Every result is re-encoded as JPEG.
//!
//! | Operation      | Arguments                | Output                          |
//! |----------------|--------------------------|---------------------------------|
//! | `solid`        | color                    | filled canvas                   |
//! | `gradient`     | from, to                 | horizontal gradient             |
//! | `checkerboard` | light, dark              | 8x8 checkerboard                |
//! | `tricolor`     | top, middle, bottom      | three horizontal bands          |
//! | `grayscale`    | image                    | luminance only                  |
//! | `invert`       | image                    | inverted colors                 |
//! | `blur`         | image                    | gaussian blur                   |
//! | `flip`         | image                    | flipped vertically              |
//! | `rotate`       | image                    | rotated 90° clockwise           |

use std::io::Cursor;

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageReader, Rgb, RgbImage};
use tracing::debug;

use crate::error::EngineError;

use super::color::parse_color;
use super::stream::{stream_blocking, ChunkWriter};
use super::{GenerateArgs, ImageEngine, ImageStream, OperationDecl, DEFAULT_JPEG_QUALITY};

/// Width and height of rendered canvases.
pub const CANVAS_SIZE: u32 = 512;

/// Largest accepted width or height for pasted images.
pub const MAX_INPUT_DIMENSION: u32 = 8192;

const BLUR_SIGMA: f32 = 4.0;
const CHECKERBOARD_CELLS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BasicOperation {
    Solid,
    Gradient,
    Checkerboard,
    Tricolor,
    Grayscale,
    Invert,
    Blur,
    Flip,
    Rotate,
}

impl BasicOperation {
    const ALL: [BasicOperation; 9] = [
        BasicOperation::Solid,
        BasicOperation::Gradient,
        BasicOperation::Checkerboard,
        BasicOperation::Tricolor,
        BasicOperation::Grayscale,
        BasicOperation::Invert,
        BasicOperation::Blur,
        BasicOperation::Flip,
        BasicOperation::Rotate,
    ];

    fn name(self) -> &'static str {
        match self {
            BasicOperation::Solid => "solid",
            BasicOperation::Gradient => "gradient",
            BasicOperation::Checkerboard => "checkerboard",
            BasicOperation::Tricolor => "tricolor",
            BasicOperation::Grayscale => "grayscale",
            BasicOperation::Invert => "invert",
            BasicOperation::Blur => "blur",
            BasicOperation::Flip => "flip",
            BasicOperation::Rotate => "rotate",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    /// Number of color arguments for text operations, `None` for paste operations.
    fn color_count(self) -> Option<usize> {
        match self {
            BasicOperation::Solid => Some(1),
            BasicOperation::Gradient | BasicOperation::Checkerboard => Some(2),
            BasicOperation::Tricolor => Some(3),
            _ => None,
        }
    }

    fn decl(self) -> OperationDecl {
        match self.color_count() {
            Some(arity) => OperationDecl::text(self.name(), arity),
            None => OperationDecl::paste(self.name()),
        }
    }
}

/// The built-in image engine.
#[derive(Debug, Clone)]
pub struct BasicEngine {
    quality: u8,
    canvas_size: u32,
}

impl Default for BasicEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl BasicEngine {
    /// Create an engine with default JPEG quality.
    pub fn new() -> Self {
        Self::with_quality(DEFAULT_JPEG_QUALITY)
    }

    /// Create an engine encoding at `quality` (clamped to 1-100).
    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            canvas_size: CANVAS_SIZE,
        }
    }

    /// Override the canvas size for text operations.
    pub fn with_canvas_size(mut self, size: u32) -> Self {
        self.canvas_size = size.max(CHECKERBOARD_CELLS);
        self
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

#[async_trait]
impl ImageEngine for BasicEngine {
    fn operations(&self) -> Vec<OperationDecl> {
        BasicOperation::ALL.iter().map(|op| op.decl()).collect()
    }

    async fn generate(
        &self,
        operation: &str,
        args: GenerateArgs,
    ) -> Result<ImageStream, EngineError> {
        let op = BasicOperation::from_name(operation)
            .ok_or_else(|| EngineError::UnknownOperation(operation.to_string()))?;
        let quality = self.quality;

        match (op.color_count(), args) {
            (Some(expected), GenerateArgs::Texts(texts)) => {
                if texts.len() != expected {
                    return Err(EngineError::InvalidArgument(format!(
                        "'{}' takes {} colors, got {}",
                        op.name(),
                        expected,
                        texts.len()
                    )));
                }
                let colors = texts
                    .iter()
                    .map(|t| parse_color(t))
                    .collect::<Result<Vec<_>, _>>()?;

                debug!(operation = op.name(), "Rendering canvas");
                let size = self.canvas_size;
                Ok(stream_blocking(move |writer| {
                    let canvas = render(op, &colors, size);
                    encode_jpeg(&DynamicImage::ImageRgb8(canvas), quality, writer)
                }))
            }
            (None, GenerateArgs::Image(data)) => {
                let image = tokio::task::spawn_blocking(move || decode_input(&data))
                    .await
                    .map_err(|e| EngineError::Generation(e.to_string()))??;

                debug!(
                    operation = op.name(),
                    width = image.width(),
                    height = image.height(),
                    "Transforming image"
                );
                Ok(stream_blocking(move |writer| {
                    let output = transform(op, image);
                    encode_jpeg(&output, quality, writer)
                }))
            }
            (Some(_), GenerateArgs::Image(_)) => Err(EngineError::InvalidArgument(format!(
                "'{}' takes text arguments, not an image",
                op.name()
            ))),
            (None, GenerateArgs::Texts(_)) => Err(EngineError::InvalidArgument(format!(
                "'{}' takes an image, not text arguments",
                op.name()
            ))),
        }
    }
}

fn render(op: BasicOperation, colors: &[Rgb<u8>], size: u32) -> RgbImage {
    match (op, colors) {
        (BasicOperation::Solid, [color]) => RgbImage::from_pixel(size, size, *color),
        (BasicOperation::Gradient, [from, to]) => {
            let span = (size - 1).max(1) as f32;
            RgbImage::from_fn(size, size, |x, _| lerp(*from, *to, x as f32 / span))
        }
        (BasicOperation::Checkerboard, [light, dark]) => {
            let cell = (size / CHECKERBOARD_CELLS).max(1);
            RgbImage::from_fn(size, size, |x, y| {
                if ((x / cell) + (y / cell)) % 2 == 0 {
                    *light
                } else {
                    *dark
                }
            })
        }
        (BasicOperation::Tricolor, [top, middle, bottom]) => {
            RgbImage::from_fn(size, size, |_, y| match y * 3 / size {
                0 => *top,
                1 => *middle,
                _ => *bottom,
            })
        }
        // Colors are validated against color_count before rendering.
        _ => RgbImage::new(size, size),
    }
}

fn lerp(from: Rgb<u8>, to: Rgb<u8>, t: f32) -> Rgb<u8> {
    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
    Rgb([
        mix(from[0], to[0]),
        mix(from[1], to[1]),
        mix(from[2], to[2]),
    ])
}

fn transform(op: BasicOperation, mut image: DynamicImage) -> DynamicImage {
    match op {
        BasicOperation::Grayscale => image.grayscale(),
        BasicOperation::Invert => {
            image.invert();
            image
        }
        BasicOperation::Blur => image.blur(BLUR_SIGMA),
        BasicOperation::Flip => image.flipv(),
        BasicOperation::Rotate => image.rotate90(),
        _ => image,
    }
}

fn decode_input(data: &Bytes) -> Result<DynamicImage, EngineError> {
    let reader = ImageReader::new(Cursor::new(data.as_ref()))
        .with_guessed_format()
        .map_err(|e| EngineError::InvalidArgument(format!("Unreadable image: {}", e)))?;

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| EngineError::InvalidArgument(format!("Unsupported image: {}", e)))?;
    if width > MAX_INPUT_DIMENSION || height > MAX_INPUT_DIMENSION {
        return Err(EngineError::InvalidArgument(format!(
            "Image is {}x{}, limit is {}x{}",
            width, height, MAX_INPUT_DIMENSION, MAX_INPUT_DIMENSION
        )));
    }

    image::load_from_memory(data)
        .map_err(|e| EngineError::InvalidArgument(format!("Unsupported image: {}", e)))
}

fn encode_jpeg(
    image: &DynamicImage,
    quality: u8,
    writer: &mut ChunkWriter,
) -> Result<(), EngineError> {
    let mut encoder = JpegEncoder::new_with_quality(writer, quality);
    // JPEG has no alpha channel
    let result = match image {
        DynamicImage::ImageLuma8(gray) => encoder.encode_image(gray),
        other => encoder.encode_image(&other.to_rgb8()),
    };
    result.map_err(|e| EngineError::Generation(format!("JPEG encoding failed: {}", e)))
}
