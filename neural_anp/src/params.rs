//! Flat, named view of a model's learnable parameters.
//!
//! Every component implements [`NamedParameters`], writing its tensors into a
//! [`ParameterMap`] under dotted paths such as `decoder.mlp.layers.0.weight`.
//! Loading goes the other way and checks every shape before swapping values in.

use std::collections::BTreeMap;

use burn::module::Param;
use burn::nn::{Linear, Lstm};
use burn::prelude::*;

use crate::error::{AnpError, Result};

/// Raw values of one parameter tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamTensor {
    /// Tensor shape.
    pub shape: Vec<usize>,
    /// Row-major values.
    pub values: Vec<f32>,
}

impl ParamTensor {
    /// Capture a tensor's values.
    pub fn from_tensor<B: Backend, const D: usize>(tensor: &Tensor<B, D>) -> Result<Self> {
        let data = tensor.to_data().convert::<f32>();
        let shape = data.shape.clone();
        let values = data
            .to_vec::<f32>()
            .map_err(|e| AnpError::InvalidData(format!("{e:?}")))?;
        Ok(Self { shape, values })
    }

    /// Number of scalar values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the tensor holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Rebuild a tensor, checking the shape against `expected`.
    pub fn to_tensor<B: Backend, const D: usize>(
        &self,
        name: &str,
        expected: [usize; D],
        device: &B::Device,
    ) -> Result<Tensor<B, D>> {
        if self.shape.as_slice() != expected.as_slice() {
            return Err(AnpError::ShapeMismatch {
                name: name.to_string(),
                expected: expected.to_vec(),
                got: self.shape.clone(),
            });
        }
        if self.values.len() != expected.iter().product::<usize>() {
            return Err(AnpError::InvalidData(format!(
                "{name}: {} values for shape {:?}",
                self.values.len(),
                self.shape
            )));
        }
        let data = TensorData::new(self.values.clone(), expected);
        Ok(Tensor::from_data(data, device))
    }
}

/// Ordered mapping from parameter path to values.
pub type ParameterMap = BTreeMap<String, ParamTensor>;

/// Components whose learnable parameters can be enumerated and restored by name.
pub trait NamedParameters {
    /// Write every parameter under `prefix` into `out`.
    fn collect_parameters(&self, prefix: &str, out: &mut ParameterMap) -> Result<()>;

    /// Replace every parameter under `prefix` with the values in `params`.
    fn load_parameters(&mut self, prefix: &str, params: &ParameterMap) -> Result<()>;
}

fn lookup<'a>(params: &'a ParameterMap, name: &str) -> Result<&'a ParamTensor> {
    params.get(name).ok_or_else(|| AnpError::MissingParameter {
        name: name.to_string(),
    })
}

fn load_param<B: Backend, const D: usize>(
    param: &Param<Tensor<B, D>>,
    name: &str,
    params: &ParameterMap,
) -> Result<Param<Tensor<B, D>>> {
    let current = param.val();
    let tensor = lookup(params, name)?.to_tensor(name, current.dims(), &current.device())?;
    Ok(Param::from_tensor(tensor))
}

impl<B: Backend> NamedParameters for Linear<B> {
    fn collect_parameters(&self, prefix: &str, out: &mut ParameterMap) -> Result<()> {
        out.insert(
            format!("{prefix}.weight"),
            ParamTensor::from_tensor(&self.weight.val())?,
        );
        if let Some(bias) = &self.bias {
            out.insert(format!("{prefix}.bias"), ParamTensor::from_tensor(&bias.val())?);
        }
        Ok(())
    }

    fn load_parameters(&mut self, prefix: &str, params: &ParameterMap) -> Result<()> {
        self.weight = load_param(&self.weight, &format!("{prefix}.weight"), params)?;
        if let Some(bias) = &self.bias {
            let bias = load_param(bias, &format!("{prefix}.bias"), params)?;
            self.bias = Some(bias);
        }
        Ok(())
    }
}

impl<B: Backend> NamedParameters for Lstm<B> {
    fn collect_parameters(&self, prefix: &str, out: &mut ParameterMap) -> Result<()> {
        let gates = [
            ("input_gate", &self.input_gate),
            ("forget_gate", &self.forget_gate),
            ("output_gate", &self.output_gate),
            ("cell_gate", &self.cell_gate),
        ];
        for (name, gate) in gates {
            gate.input_transform
                .collect_parameters(&format!("{prefix}.{name}.input_transform"), out)?;
            gate.hidden_transform
                .collect_parameters(&format!("{prefix}.{name}.hidden_transform"), out)?;
        }
        Ok(())
    }

    fn load_parameters(&mut self, prefix: &str, params: &ParameterMap) -> Result<()> {
        let gates = [
            ("input_gate", &mut self.input_gate),
            ("forget_gate", &mut self.forget_gate),
            ("output_gate", &mut self.output_gate),
            ("cell_gate", &mut self.cell_gate),
        ];
        for (name, gate) in gates {
            gate.input_transform
                .load_parameters(&format!("{prefix}.{name}.input_transform"), params)?;
            gate.hidden_transform
                .load_parameters(&format!("{prefix}.{name}.hidden_transform"), params)?;
        }
        Ok(())
    }
}

/// Total number of scalar parameters in a map.
pub fn num_values(params: &ParameterMap) -> usize {
    params.values().map(ParamTensor::len).sum()
}
