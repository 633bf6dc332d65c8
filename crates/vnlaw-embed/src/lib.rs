use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;

use vnlaw_core::config::{expand_path, EmbedderKind, EmbeddingSettings};
use vnlaw_core::error::Error;
use vnlaw_core::traits::Embedder;

pub mod pool;
pub mod tokenize;

pub use pool::masked_mean_l2;

/// Sentence embedding model (XLM-RoBERTa family, e.g.
/// paraphrase-multilingual-mpnet-base-v2) loaded from a local directory
/// holding `tokenizer.json`, `config.json` and the weights.
pub struct SentenceEmbedder {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
    dim: usize,
}

impl SentenceEmbedder {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        tracing::info!(dir = %model_dir.display(), "loading embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_path = model_dir.join("config.json");
        let config_text = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let config: XLMRobertaConfig = serde_json::from_str(&config_text)?;
        let raw: serde_json::Value = serde_json::from_str(&config_text)?;
        let dim = raw
            .get("hidden_size")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| anyhow!("config.json has no hidden_size"))? as usize;

        let weights = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        tracing::info!(dim, max_len, "embedding model loaded");
        Ok(Self { model, tokenizer, device, max_len, dim })
    }

    fn embed_inner(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize::tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let token_type_ids = Tensor::zeros((1, self.max_len), DType::I64, &self.device)?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = pool::masked_mean_l2(&hidden, &attention_mask)?;
        let v: Vec<f32> = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1()?;
        if v.len() != self.dim {
            return Err(anyhow!("model produced {} values, expected {}", v.len(), self.dim));
        }
        if start.elapsed().as_millis() > 100 {
            tracing::debug!(ms = start.elapsed().as_millis() as u64, "slow embedding");
        }
        Ok(v)
    }
}

fn select_device() -> Device {
    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(dev) => {
                tracing::info!(device = "metal", "embedding device selected");
                return dev;
            }
            Err(e) => tracing::warn!(error = %e, "metal unavailable"),
        }
    }
    tracing::info!(device = "cpu", "embedding device selected");
    Device::Cpu
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<std::collections::HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return Ok(candle_core::safetensors::load(&safetensors, device)?);
    }
    let bin = model_dir.join("pytorch_model.bin");
    let weights = candle_core::pickle::read_all(&bin).with_context(|| format!("reading {}", bin.display()))?;
    weights
        .into_iter()
        .map(|(name, t)| -> Result<(String, Tensor)> { Ok((name, t.to_device(device)?)) })
        .collect()
}

impl Embedder for SentenceEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn embed(&self, text: &str) -> vnlaw_core::Result<Vec<f32>> {
        self.embed_inner(text).map_err(Error::embedding)
    }
}

/// Deterministic bag-of-words embedder: each lowercased word is hashed into a
/// bucket, the vector is L2-normalized. Texts sharing words get a positive
/// cosine similarity, which is enough for tests and offline demos.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim } }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn embed(&self, text: &str) -> vnlaw_core::Result<Vec<f32>> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;

        if self.dim == 0 {
            return Err(Error::Embedding("hash embedder dimension is zero".into()));
        }
        let mut v = vec![0f32; self.dim];
        for token in text.split_whitespace() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            if token.is_empty() {
                continue;
            }
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            v[idx] += 0.5 + ((h >> 32) as u32 as f32) / (u32::MAX as f32);
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        Ok(v)
    }
}

/// Builds the embedder selected by `embedding.kind`.
pub fn default_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    match settings.kind {
        EmbedderKind::Hash => {
            tracing::info!(dim = settings.dim, "using hash embedder");
            Ok(Arc::new(HashEmbedder::new(settings.dim)))
        }
        EmbedderKind::Model => {
            let dir = resolve_model_dir(&settings.model_dir)?;
            Ok(Arc::new(SentenceEmbedder::load(&dir, settings.max_len)?))
        }
    }
}

/// The configured directory, or the same path one level up (running from a
/// crate directory).
fn resolve_model_dir(configured: &str) -> Result<PathBuf> {
    let p = expand_path(configured);
    if p.exists() { return Ok(p); }
    if p.is_relative() {
        let parent = Path::new("..").join(&p);
        if parent.exists() { return Ok(parent); }
    }
    Err(anyhow!("Could not locate embedding model directory {}", p.display()))
}
