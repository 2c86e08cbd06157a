//! Embedder: `fastembed`-backed text and image embedding (SPEC_FULL.md §4.C).
//!
//! Text path mirrors the teacher's `EmbeddingService` almost unchanged, trimmed from its
//! original 30+ model catalog down to a handful of well-trodden choices. The image path is new:
//! a second `fastembed::ImageEmbedding` runner behind the same service, gated on a vision model
//! being configured and returning [`CoreError::Unsupported`] otherwise.

use crate::types::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use tokio::task::spawn_blocking;

pub use fastembed::{EmbeddingModel as FastEmbedModel, InitOptions, TextEmbedding};

/// Dimension the core always expects from text embeddings, per SPEC_FULL.md §3's invariant 2.
pub const TEXT_DIMENSIONS: usize = 384;
/// Dimension the core always expects from image embeddings.
pub const IMAGE_DIMENSIONS: usize = 768;

/// Supported text embedding models. Trimmed from the full fastembed catalog to the models this
/// service actually configures: one fast default, one higher-quality English model, one
/// multilingual model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingModelType {
    /// BAAI/bge-small-en-v1.5 - 384 dimensions (default).
    #[default]
    BgeSmallEnV15,
    /// BAAI/bge-base-en-v1.5 - 768 dimensions, higher quality / slower.
    BgeBaseEnV15,
    /// intfloat/multilingual-e5-small - 384 dimensions.
    MultilingualE5Small,
}

impl EmbeddingModelType {
    pub fn to_fastembed_model(self) -> FastEmbedModel {
        match self {
            Self::BgeSmallEnV15 => FastEmbedModel::BGESmallENV15,
            Self::BgeBaseEnV15 => FastEmbedModel::BGEBaseENV15,
            Self::MultilingualE5Small => FastEmbedModel::MultilingualE5Small,
        }
    }

    pub fn dimensions(self) -> usize {
        match self {
            Self::BgeSmallEnV15 => 384,
            Self::BgeBaseEnV15 => 768,
            Self::MultilingualE5Small => 384,
        }
    }

    pub fn all() -> Vec<Self> {
        vec![Self::BgeSmallEnV15, Self::BgeBaseEnV15, Self::MultilingualE5Small]
    }
}

impl Display for EmbeddingModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::BgeSmallEnV15 => "bge-small-en-v1.5",
            Self::BgeBaseEnV15 => "bge-base-en-v1.5",
            Self::MultilingualE5Small => "multilingual-e5-small",
        };
        write!(f, "{name}")
    }
}

impl FromStr for EmbeddingModelType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "bge-small-en-v1.5" | "bge-small" => Ok(Self::BgeSmallEnV15),
            "bge-base-en-v1.5" | "bge-base" => Ok(Self::BgeBaseEnV15),
            "multilingual-e5-small" | "e5-small" => Ok(Self::MultilingualE5Small),
            other => Err(CoreError::Validation(format!("unknown embedding model: {other}"))),
        }
    }
}

/// Supported image embedding models. A single vision model pairing `NomicEmbedVisionV15`'s
/// 768-dim output (chosen to match [`IMAGE_DIMENSIONS`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ImageEmbeddingModelType {
    #[default]
    NomicEmbedVisionV15,
}

impl ImageEmbeddingModelType {
    pub fn to_fastembed_model(self) -> fastembed::ImageEmbeddingModel {
        match self {
            Self::NomicEmbedVisionV15 => fastembed::ImageEmbeddingModel::NomicEmbedVisionV15,
        }
    }

    pub fn dimensions(self) -> usize {
        IMAGE_DIMENSIONS
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub model: EmbeddingModelType,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_show_download_progress")]
    pub show_download_progress: bool,
    /// When set, the image embedding path is enabled; otherwise `embed_image` returns
    /// [`CoreError::Unsupported`].
    #[serde(default)]
    pub image_model: Option<ImageEmbeddingModelType>,
}

fn default_batch_size() -> usize {
    32
}

fn default_show_download_progress() -> bool {
    true
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: EmbeddingModelType::default(),
            batch_size: default_batch_size(),
            show_download_progress: default_show_download_progress(),
            image_model: None,
        }
    }
}

/// Text and (optional) image embedding runner. Uses `spawn_blocking` to run fastembed's
/// synchronous operations without blocking the async runtime.
pub struct EmbeddingService {
    config: EmbeddingConfig,
}

impl EmbeddingService {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self { config }
    }

    pub fn with_default_model() -> Self {
        Self::new(EmbeddingConfig::default())
    }

    pub fn with_model(model: EmbeddingModelType) -> Self {
        Self::new(EmbeddingConfig {
            model,
            ..Default::default()
        })
    }

    pub fn model_type(&self) -> EmbeddingModelType {
        self.config.model
    }

    pub fn dimensions(&self) -> usize {
        self.config.model.dimensions()
    }

    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    fn normalize(mut v: Vec<f32>) -> Vec<f32> {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        v
    }

    /// Embed a single text. Unit-normalized, dimension `D` (SPEC_FULL.md §3, invariant 2).
    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_text_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::Internal("no embedding generated".to_string()))
    }

    pub async fn embed_text_batch<S: AsRef<str> + Send + Sync + 'static>(
        &self,
        texts: &[S],
    ) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let texts_owned: Vec<String> = texts.iter().map(|s| s.as_ref().to_string()).collect();
        let batch_size = self.config.batch_size;
        let model_type = self.config.model.to_fastembed_model();
        let show_progress = self.config.show_download_progress;

        let raw = spawn_blocking(move || {
            let mut model = TextEmbedding::try_new(
                InitOptions::new(model_type).with_show_download_progress(show_progress),
            )
            .map_err(|e| CoreError::Internal(format!("initializing embedding model: {e}")))?;
            let refs: Vec<&str> = texts_owned.iter().map(|s| s.as_str()).collect();
            model
                .embed(refs, Some(batch_size))
                .map_err(|e| CoreError::Internal(format!("embedding failed: {e}")))
        })
        .await
        .map_err(|e| CoreError::Internal(format!("embedding task panicked: {e}")))??;

        Ok(raw.into_iter().map(Self::normalize).collect())
    }

    /// Embed a single image. Returns [`CoreError::Unsupported`] when no `image_model` is
    /// configured. Unit-normalized, dimension `D_img` (SPEC_FULL.md §3, invariant 2).
    pub async fn embed_image(&self, bytes: &[u8]) -> Result<Vec<f32>> {
        let Some(image_model) = self.config.image_model else {
            return Err(CoreError::Unsupported(
                "image embedding requires an image_model to be configured".to_string(),
            ));
        };
        let bytes_owned = bytes.to_vec();
        let show_progress = self.config.show_download_progress;

        let raw = spawn_blocking(move || {
            let mut model = fastembed::ImageEmbedding::try_new(
                fastembed::ImageInitOptions::new(image_model.to_fastembed_model())
                    .with_show_download_progress(show_progress),
            )
            .map_err(|e| CoreError::Internal(format!("initializing image embedding model: {e}")))?;
            model
                .embed_bytes(vec![bytes_owned], None)
                .map_err(|e| CoreError::Internal(format!("image embedding failed: {e}")))
        })
        .await
        .map_err(|e| CoreError::Internal(format!("embedding task panicked: {e}")))??;

        raw.into_iter()
            .next()
            .map(Self::normalize)
            .ok_or_else(|| CoreError::Internal("no image embedding generated".to_string()))
    }
}
