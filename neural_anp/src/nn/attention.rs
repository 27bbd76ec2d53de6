//! Attention over point sets.
//!
//! Every variant maps queries [batch, n_queries, query_dim], keys
//! [batch, n_keys, key_dim] and values [batch, n_keys, value_dim] to
//! [batch, n_queries, value_dim]. The weights a query assigns to the keys are
//! non-negative and sum to one; batch instances never interact.

use std::fmt;
use std::str::FromStr;

use burn::module::{Ignored, Module};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::softmax;

use crate::config::AttentionConfig;
use crate::error::{AnpError, Result};
use crate::nn::mlp::{Mlp, MlpConfig};
use crate::params::{NamedParameters, ParameterMap};

/// Attention variant, resolved once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttentionKind {
    /// Equal weight on every key.
    Uniform,
    /// Softmax of the negative L1 distance between query and key.
    Laplace,
    /// Softmax of the scaled dot product.
    Dot,
    /// Scaled dot product per head over learned projections.
    MultiHead,
}

impl FromStr for AttentionKind {
    type Err = AnpError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "uniform" => Ok(Self::Uniform),
            "laplace" => Ok(Self::Laplace),
            "dot" => Ok(Self::Dot),
            "multihead" => Ok(Self::MultiHead),
            other => Err(AnpError::config(format!(
                "unknown attention type '{other}' (expected uniform, laplace, dot or multihead)"
            ))),
        }
    }
}

impl fmt::Display for AttentionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uniform => "uniform",
            Self::Laplace => "laplace",
            Self::Dot => "dot",
            Self::MultiHead => "multihead",
        };
        f.write_str(name)
    }
}

/// One multihead layer: per-head projections plus an output projection.
#[derive(Module, Debug)]
pub struct MultiHeadLayer<B: Backend> {
    w_q: Linear<B>,
    w_k: Linear<B>,
    w_v: Linear<B>,
    w_o: Linear<B>,
    #[module(skip)]
    num_heads: usize,
}

impl<B: Backend> MultiHeadLayer<B> {
    fn new(query_dim: usize, key_dim: usize, model_dim: usize, num_heads: usize, device: &B::Device) -> Self {
        let linear = |d_in, d_out| LinearConfig::new(d_in, d_out).with_bias(false).init::<B>(device);
        Self {
            w_q: linear(query_dim, model_dim),
            w_k: linear(key_dim, model_dim),
            w_v: linear(model_dim, model_dim),
            w_o: linear(model_dim, model_dim),
            num_heads,
        }
    }

    fn query_dim(&self) -> usize {
        self.w_q.weight.dims()[0]
    }

    fn model_dim(&self) -> usize {
        self.w_o.weight.dims()[1]
    }

    /// Split [batch, n, model_dim] into [batch, heads, n, head_dim].
    fn split_heads(&self, x: Tensor<B, 3>) -> Tensor<B, 4> {
        let [batch, n, model_dim] = x.dims();
        x.reshape([batch, n, self.num_heads, model_dim / self.num_heads])
            .swap_dims(1, 2)
    }

    /// Per-head weights: [batch, heads, n_queries, n_keys].
    fn weights(&self, queries: Tensor<B, 3>, keys: Tensor<B, 3>) -> Tensor<B, 4> {
        let q = self.split_heads(self.w_q.forward(queries));
        let k = self.split_heads(self.w_k.forward(keys));
        let head_dim = (self.model_dim() / self.num_heads) as f64;

        let logits = q.matmul(k.swap_dims(2, 3)).div_scalar(head_dim.sqrt());
        softmax(logits, 3)
    }

    fn forward(
        &self,
        queries: Tensor<B, 3>,
        keys: Tensor<B, 3>,
        values: Tensor<B, 3>,
        dropout: Option<&Dropout>,
    ) -> Tensor<B, 3> {
        let [batch, n_queries, _] = queries.dims();
        let mut weights = self.weights(queries.clone(), keys);
        if let Some(dropout) = dropout {
            weights = dropout.forward(weights);
        }

        let v = self.split_heads(self.w_v.forward(values));
        let heads = weights
            .matmul(v)
            .swap_dims(1, 2)
            .reshape([batch, n_queries, self.model_dim()]);
        let out = self.w_o.forward(heads);

        if self.query_dim() == self.model_dim() {
            queries + out
        } else {
            out
        }
    }
}

impl<B: Backend> NamedParameters for MultiHeadLayer<B> {
    fn collect_parameters(&self, prefix: &str, out: &mut ParameterMap) -> Result<()> {
        self.w_q.collect_parameters(&format!("{prefix}.w_q"), out)?;
        self.w_k.collect_parameters(&format!("{prefix}.w_k"), out)?;
        self.w_v.collect_parameters(&format!("{prefix}.w_v"), out)?;
        self.w_o.collect_parameters(&format!("{prefix}.w_o"), out)
    }

    fn load_parameters(&mut self, prefix: &str, params: &ParameterMap) -> Result<()> {
        self.w_q.load_parameters(&format!("{prefix}.w_q"), params)?;
        self.w_k.load_parameters(&format!("{prefix}.w_k"), params)?;
        self.w_v.load_parameters(&format!("{prefix}.w_v"), params)?;
        self.w_o.load_parameters(&format!("{prefix}.w_o"), params)
    }
}

/// Attention block with an optional learned query/key projection.
#[derive(Module, Debug)]
pub struct Attention<B: Backend> {
    /// Query projection (when configured).
    query_proj: Option<Mlp<B>>,
    /// Key projection (when configured).
    key_proj: Option<Mlp<B>>,
    /// Stacked layers, only populated for multihead.
    layers: Vec<MultiHeadLayer<B>>,
    /// Dropout on attention weights.
    dropout: Option<Dropout>,
    kind: Ignored<AttentionKind>,
    #[module(skip)]
    laplace_scale: f64,
    #[module(skip)]
    query_dim: usize,
    #[module(skip)]
    key_dim: usize,
    #[module(skip)]
    value_dim: usize,
}

impl<B: Backend> Attention<B> {
    /// Create an attention block, rejecting invalid configurations.
    pub fn new(config: &AttentionConfig, device: &B::Device) -> Result<Self> {
        let kind = config.validate()?;

        let (query_proj, key_proj) = if config.projection && kind != AttentionKind::Uniform {
            let hidden = vec![config.value_dim; config.num_layers.saturating_sub(1).max(1)];
            let q = MlpConfig::new(config.query_dim, config.value_dim, hidden.clone()).init(device)?;
            let k = MlpConfig::new(config.key_dim, config.value_dim, hidden).init(device)?;
            (Some(q), Some(k))
        } else {
            (None, None)
        };

        let layers = if kind == AttentionKind::MultiHead {
            let (q_dim, k_dim) = config.similarity_dims();
            (0..config.num_layers)
                .map(|i| {
                    let layer_q_dim = if i == 0 { q_dim } else { config.value_dim };
                    MultiHeadLayer::new(layer_q_dim, k_dim, config.value_dim, config.num_heads, device)
                })
                .collect()
        } else {
            Vec::new()
        };

        let dropout = (config.dropout > 0.0).then(|| DropoutConfig::new(config.dropout).init());

        Ok(Self {
            query_proj,
            key_proj,
            layers,
            dropout,
            kind: Ignored(kind),
            laplace_scale: config.laplace_scale,
            query_dim: config.query_dim,
            key_dim: config.key_dim,
            value_dim: config.value_dim,
        })
    }

    /// The attention variant.
    pub fn kind(&self) -> AttentionKind {
        *self.kind
    }

    fn check(&self, queries: &Tensor<B, 3>, keys: &Tensor<B, 3>, values: Option<&Tensor<B, 3>>) -> Result<()> {
        let [batch, n_queries, q_dim] = queries.dims();
        let [k_batch, n_keys, k_dim] = keys.dims();

        if q_dim != self.query_dim {
            return Err(AnpError::ShapeMismatch {
                name: "queries".into(),
                expected: vec![batch, n_queries, self.query_dim],
                got: queries.dims().to_vec(),
            });
        }
        if k_batch != batch || k_dim != self.key_dim {
            return Err(AnpError::ShapeMismatch {
                name: "keys".into(),
                expected: vec![batch, n_keys, self.key_dim],
                got: keys.dims().to_vec(),
            });
        }
        if n_keys == 0 {
            return Err(AnpError::EmptyPointSet { name: "keys".into() });
        }
        if let Some(values) = values {
            if values.dims() != [batch, n_keys, self.value_dim] {
                return Err(AnpError::ShapeMismatch {
                    name: "values".into(),
                    expected: vec![batch, n_keys, self.value_dim],
                    got: values.dims().to_vec(),
                });
            }
        }
        Ok(())
    }

    fn project(&self, queries: Tensor<B, 3>, keys: Tensor<B, 3>) -> (Tensor<B, 3>, Tensor<B, 3>) {
        match (&self.query_proj, &self.key_proj) {
            (Some(q_proj), Some(k_proj)) => (q_proj.forward(queries), k_proj.forward(keys)),
            _ => (queries, keys),
        }
    }

    /// Weights for one head: [batch, n_queries, n_keys], rows summing to 1.
    fn single_head_weights(&self, queries: Tensor<B, 3>, keys: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, n_queries, dim] = queries.dims();
        let n_keys = keys.dims()[1];

        match *self.kind {
            AttentionKind::Uniform => {
                Tensor::ones([batch, n_queries, n_keys], &queries.device()).div_scalar(n_keys as f64)
            }
            AttentionKind::Laplace => {
                let q: Tensor<B, 4> = queries.unsqueeze_dim::<4>(2).repeat_dim(2, n_keys);
                let k: Tensor<B, 4> = keys.unsqueeze_dim::<4>(1).repeat_dim(1, n_queries);
                let distance = (q - k)
                    .abs()
                    .sum_dim(3)
                    .reshape([batch, n_queries, n_keys]);
                softmax(distance.div_scalar(-self.laplace_scale), 2)
            }
            AttentionKind::Dot | AttentionKind::MultiHead => {
                let logits = queries.matmul(keys.swap_dims(1, 2)).div_scalar((dim as f64).sqrt());
                softmax(logits, 2)
            }
        }
    }

    /// Attention weights: [batch, heads, n_queries, n_keys].
    ///
    /// `heads` is 1 except for multihead, where the first layer's per-head
    /// weights are returned. Dropout is not applied.
    pub fn weights(&self, queries: Tensor<B, 3>, keys: Tensor<B, 3>) -> Result<Tensor<B, 4>> {
        self.check(&queries, &keys, None)?;
        let (queries, keys) = self.project(queries, keys);

        match self.layers.first() {
            Some(layer) => Ok(layer.weights(queries, keys)),
            None => Ok(self.single_head_weights(queries, keys).unsqueeze_dim(1)),
        }
    }

    /// Aggregate `values` for every query.
    pub fn forward(
        &self,
        queries: Tensor<B, 3>,
        keys: Tensor<B, 3>,
        values: Tensor<B, 3>,
    ) -> Result<Tensor<B, 3>> {
        self.check(&queries, &keys, Some(&values))?;
        let (queries, keys) = self.project(queries, keys);

        if *self.kind == AttentionKind::MultiHead {
            let mut out = queries;
            for layer in &self.layers {
                out = layer.forward(out, keys.clone(), values.clone(), self.dropout.as_ref());
            }
            return Ok(out);
        }

        let mut weights = self.single_head_weights(queries, keys);
        if let Some(dropout) = &self.dropout {
            weights = dropout.forward(weights);
        }
        Ok(weights.matmul(values))
    }
}

impl<B: Backend> NamedParameters for Attention<B> {
    fn collect_parameters(&self, prefix: &str, out: &mut ParameterMap) -> Result<()> {
        if let Some(q_proj) = &self.query_proj {
            q_proj.collect_parameters(&format!("{prefix}.query_proj"), out)?;
        }
        if let Some(k_proj) = &self.key_proj {
            k_proj.collect_parameters(&format!("{prefix}.key_proj"), out)?;
        }
        for (i, layer) in self.layers.iter().enumerate() {
            layer.collect_parameters(&format!("{prefix}.layers.{i}"), out)?;
        }
        Ok(())
    }

    fn load_parameters(&mut self, prefix: &str, params: &ParameterMap) -> Result<()> {
        if let Some(q_proj) = &mut self.query_proj {
            q_proj.load_parameters(&format!("{prefix}.query_proj"), params)?;
        }
        if let Some(k_proj) = &mut self.key_proj {
            k_proj.load_parameters(&format!("{prefix}.key_proj"), params)?;
        }
        for (i, layer) in self.layers.iter_mut().enumerate() {
            layer.load_parameters(&format!("{prefix}.layers.{i}"), params)?;
        }
        Ok(())
    }
}
