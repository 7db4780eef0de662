use crate::error::OptikitError;
use crate::tensor::Tensor;

// In-place methods never record autograd history and never reallocate the
// element storage.
impl Tensor {
    fn zip_inplace(
        &self,
        other: &Tensor,
        operation: &str,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<(), OptikitError> {
        self.check_compatible(other, operation)?;
        // Copy the operand out first: `other` may alias `self`.
        let rhs = other.to_f64_vec();
        self.write_data().buffer.zip_map_inplace(&rhs, f);
        Ok(())
    }

    /// Sets every element to zero.
    pub fn zero_(&self) {
        self.fill_(0.0);
    }

    /// Sets every element to `value`.
    pub fn fill_(&self, value: f64) {
        self.write_data().buffer.fill(value);
    }

    /// Overwrites the values of `self` with those of `src`.
    pub fn copy_(&self, src: &Tensor) -> Result<(), OptikitError> {
        self.zip_inplace(src, "copy_", |_, b| b)
    }

    /// `self += other`
    pub fn add_(&self, other: &Tensor) -> Result<(), OptikitError> {
        self.zip_inplace(other, "add_", |a, b| a + b)
    }

    /// `self -= other`
    pub fn sub_(&self, other: &Tensor) -> Result<(), OptikitError> {
        self.zip_inplace(other, "sub_", |a, b| a - b)
    }

    /// `self *= other`, element-wise.
    pub fn mul_(&self, other: &Tensor) -> Result<(), OptikitError> {
        self.zip_inplace(other, "mul_", |a, b| a * b)
    }

    /// `self += alpha * other`
    pub fn add_scaled_(&self, other: &Tensor, alpha: f64) -> Result<(), OptikitError> {
        self.zip_inplace(other, "add_scaled_", |a, b| a + alpha * b)
    }

    /// `self *= scalar`
    pub fn mul_scalar_(&self, scalar: f64) {
        self.write_data().buffer.map_inplace(|a| a * scalar);
    }

    /// `self += value * t1 * t2`
    pub fn addcmul_(&self, t1: &Tensor, t2: &Tensor, value: f64) -> Result<(), OptikitError> {
        self.check_compatible(t1, "addcmul_")?;
        self.check_compatible(t2, "addcmul_")?;
        let lhs = t1.to_f64_vec();
        let rhs: Vec<f64> = lhs
            .iter()
            .zip(t2.to_f64_vec())
            .map(|(a, b)| value * a * b)
            .collect();
        self.write_data().buffer.zip_map_inplace(&rhs, |s, r| s + r);
        Ok(())
    }

    /// `self += value * t1 / t2`
    pub fn addcdiv_(&self, t1: &Tensor, t2: &Tensor, value: f64) -> Result<(), OptikitError> {
        self.check_compatible(t1, "addcdiv_")?;
        self.check_compatible(t2, "addcdiv_")?;
        let num = t1.to_f64_vec();
        let rhs: Vec<f64> = num
            .iter()
            .zip(t2.to_f64_vec())
            .map(|(a, b)| value * a / b)
            .collect();
        self.write_data().buffer.zip_map_inplace(&rhs, |s, r| s + r);
        Ok(())
    }

    /// Element-wise square root, as a new leaf tensor.
    pub fn sqrt(&self) -> Tensor {
        let out = self.detach();
        out.write_data().buffer.map_inplace(f64::sqrt);
        out
    }

    /// `self += scalar`
    pub fn add_scalar_(&self, scalar: f64) {
        self.write_data().buffer.map_inplace(|a| a + scalar);
    }

    /// Dot product of the flattened values of two same-shaped tensors.
    pub fn dot(&self, other: &Tensor) -> Result<f64, OptikitError> {
        self.check_compatible(other, "dot")?;
        Ok(self
            .to_f64_vec()
            .iter()
            .zip(other.to_f64_vec())
            .map(|(a, b)| a * b)
            .sum())
    }
}
