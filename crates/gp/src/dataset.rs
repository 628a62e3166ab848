use crate::errors::{GpError, Result};
use crate::utils::check_dimension;
use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, ArrayView1, ArrayView2, Axis, Data, Ix1, Ix2};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Observed dataset: `n` input points of dimension `d` as a (n, d) matrix
/// and their `n` scalar responses.
///
/// The dimension is fixed at construction, observations can only be appended.
#[derive(Debug)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(deserialize = "F: Deserialize<'de>"))
)]
pub struct TrainingData<F: Float> {
    x: Array2<F>,
    y: Array1<F>,
}

impl<F: Float> Clone for TrainingData<F> {
    fn clone(&self) -> Self {
        Self {
            x: self.x.to_owned(),
            y: self.y.to_owned(),
        }
    }
}

impl<F: Float> TrainingData<F> {
    /// Constructor from (n, d) inputs and (n,) responses
    pub fn new(
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        y: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<Self> {
        if x.ncols() == 0 {
            return Err(GpError::InvalidValueError(
                "Training inputs should have at least one component".to_string(),
            ));
        }
        if x.nrows() != y.len() {
            return Err(GpError::InvalidValueError(format!(
                "Number of inputs ({}) and responses ({}) differ",
                x.nrows(),
                y.len()
            )));
        }
        Ok(TrainingData {
            x: x.to_owned(),
            y: y.to_owned(),
        })
    }

    /// An empty dataset of inputs of dimension `dim`
    pub fn empty(dim: usize) -> Result<Self> {
        Self::new(&Array2::<F>::zeros((0, dim)), &Array1::<F>::zeros(0))
    }

    /// Append one observation
    pub fn push(&mut self, x: &ArrayBase<impl Data<Elem = F>, Ix1>, y: F) -> Result<()> {
        check_dimension(self.dim(), x.len())?;
        self.x.push_row(x.view())?;
        self.y.push(Axis(0), ndarray::aview0(&y))?;
        Ok(())
    }

    /// Number of observations
    pub fn len(&self) -> usize {
        self.y.len()
    }

    /// Whether no observation is recorded
    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// Input dimension
    pub fn dim(&self) -> usize {
        self.x.ncols()
    }

    /// Inputs (n, d)
    pub fn inputs(&self) -> ArrayView2<'_, F> {
        self.x.view()
    }

    /// Responses (n,)
    pub fn responses(&self) -> ArrayView1<'_, F> {
        self.y.view()
    }

    /// Index and value of the largest response, the first one on ties
    pub fn best(&self) -> Option<(usize, F)> {
        self.y.iter().enumerate().fold(None, |best, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_push_and_best() {
        let mut data = TrainingData::new(&array![[0., 1.], [1., 1.]], &array![0.5, 2.0]).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.dim(), 2);
        assert_eq!(data.best(), Some((1, 2.0)));

        data.push(&array![2., 0.], 2.0).unwrap();
        assert_eq!(data.len(), 3);
        // first maximum wins
        assert_eq!(data.best(), Some((1, 2.0)));
        assert_eq!(data.inputs().row(2), array![2., 0.]);

        assert!(matches!(
            data.push(&array![2.], 1.0),
            Err(GpError::DimensionMismatch {
                expected: 2,
                found: 1
            })
        ));
        assert_eq!(data.len(), 3);
    }

    #[test]
    fn test_empty_dataset() {
        let mut data = TrainingData::<f64>::empty(3).unwrap();
        assert!(data.is_empty());
        assert_eq!(data.best(), None);
        data.push(&array![1., 2., 3.], -1.).unwrap();
        assert_eq!(data.best(), Some((0, -1.)));
        assert!(TrainingData::<f64>::empty(0).is_err());
    }

    #[test]
    fn test_inconsistent_lengths() {
        assert!(TrainingData::new(&array![[0.], [1.]], &array![0.5]).is_err());
    }
}
