//! Conversion of gathered batches to libtorch tensors.

use crate::{
    common::*,
    store::{MajorBatch, MinorBatch},
};
use ndarray::{ArrayBase, Data, Dimension};
use tch::{kind::Element, Tensor};

/// Major fields of a batch as tensors.
#[derive(Debug)]
pub struct MajorTensors {
    /// `[batch, max_label_len]`, int64.
    pub labels: Tensor,
    /// `[batch]`, int64.
    pub label_lens: Tensor,
    /// `[batch, channels, depth / step, height, width]`, float.
    pub videos: Tensor,
}

/// Minor fields of a batch as tensors.
#[derive(Debug)]
pub struct MinorTensors {
    /// One 1D int64 tensor per record, as object encodings vary in shape.
    pub objects: Vec<Tensor>,
    /// `[batch, max_action_len]`, int64.
    pub actions: Tensor,
    /// `[batch]`, int64.
    pub action_lens: Tensor,
}

impl MajorBatch {
    pub fn to_tensors(&self) -> Result<MajorTensors> {
        Ok(MajorTensors {
            labels: array_to_tensor(&self.labels)?,
            label_lens: array_to_tensor(&self.label_lens)?,
            videos: array_to_tensor(&self.videos)?,
        })
    }
}

impl MinorBatch {
    pub fn to_tensors(&self) -> Result<MinorTensors> {
        Ok(MinorTensors {
            objects: self
                .objects
                .iter()
                .map(|object| Tensor::of_slice(object.values()))
                .collect(),
            actions: array_to_tensor(&self.actions)?,
            action_lens: array_to_tensor(&self.action_lens)?,
        })
    }
}

fn array_to_tensor<S, A, D>(array: &ArrayBase<S, D>) -> Result<Tensor>
where
    S: Data<Elem = A>,
    A: Element + Clone,
    D: Dimension,
{
    let shape: Vec<i64> = array.shape().iter().map(|&size| size as i64).collect();
    let array = array.as_standard_layout();
    let slice = array
        .as_slice()
        .ok_or_else(|| format_err!("the array is not contiguous"))?;
    let tensor = Tensor::of_slice(slice).f_view(shape.as_slice())?;
    Ok(tensor)
}
