//! Utilities.
use anyhow::{anyhow, Context, Result};
use candle_core::{Tensor, D};
use candle_nn::VarMap;
use log::trace;

/// Apply soft update on variables.
///
/// Variables are identified by their names.
///
/// dest = tau * src + (1.0 - tau) * dest
pub fn track(dest: &VarMap, src: &VarMap, tau: f64) -> Result<()> {
    trace!("dest");
    let dest = dest
        .data()
        .lock()
        .map_err(|_| anyhow!("The lock of the destination VarMap is poisoned"))?;
    trace!("src");
    let src = src
        .data()
        .lock()
        .map_err(|_| anyhow!("The lock of the source VarMap is poisoned"))?;

    for (k_dest, v_dest) in dest.iter() {
        let v_src = src
            .get(k_dest)
            .with_context(|| format!("Variable {} is not found in the source", k_dest))?;
        let t_src = v_src.as_tensor();
        let t_dest = v_dest.as_tensor();
        let t_dest = ((tau * t_src)? + (1.0 - tau) * t_dest)?;
        v_dest.set(&t_dest)?;
    }

    Ok(())
}

/// Interface for handling output dimensions.
pub trait OutDim {
    /// Returns the output dimension.
    fn get_out_dim(&self) -> usize;

    /// Sets the  output dimension.
    fn set_out_dim(&mut self, v: usize);
}

/// `log(1 + exp(x))`, computed without overflow.
pub fn softplus(xs: &Tensor) -> Result<Tensor> {
    let tail = (xs.abs()?.neg()?.exp()? + 1.0)?.log()?;
    Ok((xs.relu()? + tail)?)
}

/// Elementwise negative log-likelihood of `x` under `N(mean, std^2)`.
pub fn gaussian_nll(x: &Tensor, mean: &Tensor, std: &Tensor) -> Result<Tensor> {
    let noise = ((x - mean)? / (std + 1e-8)?)?;
    let log_2pi = (2.0 * std::f64::consts::PI).ln();
    Ok(((0.5 * noise.sqr()?)? + std.log()?)?.affine(1.0, 0.5 * log_2pi)?)
}

/// Elementwise KL divergence `KL(N(p_mean, p_std^2) || N(q_mean, q_std^2))`.
pub fn gaussian_kl(p_mean: &Tensor, p_std: &Tensor, q_mean: &Tensor, q_std: &Tensor) -> Result<Tensor> {
    let var_ratio = (p_std / q_std)?.sqr()?;
    let t1 = ((p_mean - q_mean)? / q_std)?.sqr()?;
    let kl = (((&var_ratio + t1)? - 1.0)? - var_ratio.log()?)?;
    Ok((0.5 * kl)?)
}

/// Builds the inputs of the actor at two consecutive steps.
///
/// Given features `(B, S + 1, F)` and actions `(B, S, A)`, returns
/// `(fa_t, fa_t+1)`, where `fa_t` is the flattened features of the first `S`
/// observations followed by the first `S - 1` actions, and `fa_t+1` is the
/// same one step later. The shape of both is `(B, S * F + (S - 1) * A)`.
pub fn feature_actions(features: &Tensor, actions: &Tensor) -> Result<(Tensor, Tensor)> {
    let s = actions.dim(1)?;
    let f = features.narrow(1, 0, s)?.flatten_from(1)?;
    let n_f = features.narrow(1, 1, s)?.flatten_from(1)?;
    let a = actions.narrow(1, 0, s - 1)?.flatten_from(1)?;
    let n_a = actions.narrow(1, 1, s - 1)?.flatten_from(1)?;
    let fa = Tensor::cat(&[f, a], D::Minus1)?;
    let n_fa = Tensor::cat(&[n_f, n_a], D::Minus1)?;
    Ok((fa, n_fa))
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::Init;

    fn varmap_with(t: &Tensor) -> Result<VarMap> {
        let vm = VarMap::new();
        let init = Init::Randn {
            mean: 0.0,
            stdev: 1.0,
        };
        vm.get((3,), "var1", init, DType::F32, &Device::Cpu)?;
        vm.data().lock().unwrap().get("var1").unwrap().set(t)?;
        Ok(vm)
    }

    #[test]
    fn test_track() -> Result<()> {
        let tau = 0.7;
        let t_src = Tensor::from_slice(&[1.0f32, 2.0, 3.0], (3,), &Device::Cpu)?;
        let t_dest = Tensor::from_slice(&[4.0f32, 5.0, 6.0], (3,), &Device::Cpu)?;
        let t = ((tau * &t_src)? + (1.0 - tau) * &t_dest)?;

        let vm_src = varmap_with(&t_src)?;
        let vm_dest = varmap_with(&t_dest)?;
        track(&vm_dest, &vm_src, tau)?;

        let t_ = vm_dest
            .data()
            .lock()
            .unwrap()
            .get("var1")
            .unwrap()
            .as_tensor()
            .clone();
        assert_eq!(t.to_vec1::<f32>()?, t_.to_vec1::<f32>()?);

        // The source is unchanged
        let t_src_ = vm_src.data().lock().unwrap()["var1"].as_tensor().clone();
        assert_eq!(t_src_.to_vec1::<f32>()?, vec![1.0, 2.0, 3.0]);
        Ok(())
    }

    #[test]
    fn test_softplus() -> Result<()> {
        let x = Tensor::from_slice(&[-100f32, 0.0, 1.0, 100.0], (4,), &Device::Cpu)?;
        let y = softplus(&x)?.to_vec1::<f32>()?;
        assert!(y[0] >= 0.0 && y[0] < 1e-6);
        assert!((y[1] - 2f32.ln()).abs() < 1e-6);
        assert!((y[2] - (1.0 + 1f32.exp()).ln()).abs() < 1e-5);
        assert!((y[3] - 100.0).abs() < 1e-4);
        Ok(())
    }

    #[test]
    fn test_gaussian_kl_and_nll() -> Result<()> {
        let dev = Device::Cpu;
        let zeros = Tensor::zeros((2, 3), DType::F32, &dev)?;
        let ones = Tensor::ones((2, 3), DType::F32, &dev)?;

        // Identical distributions
        let kl = gaussian_kl(&zeros, &ones, &zeros, &ones)?;
        assert!(kl.abs()?.sum_all()?.to_scalar::<f32>()? < 1e-6);

        // KL(N(1, 1) || N(0, 1)) = 0.5
        let kl = gaussian_kl(&ones, &ones, &zeros, &ones)?;
        assert!((kl.mean_all()?.to_scalar::<f32>()? - 0.5).abs() < 1e-6);

        // -log N(0 | 0, 1) = 0.5 * log(2 * pi)
        let nll = gaussian_nll(&zeros, &zeros, &ones)?;
        let expected = 0.5 * (2.0 * std::f32::consts::PI).ln();
        assert!((nll.mean_all()?.to_scalar::<f32>()? - expected).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_feature_actions() -> Result<()> {
        let dev = Device::Cpu;
        // B = 1, S = 3, F = 2, A = 1
        let features = Tensor::arange(0f32, 8.0, &dev)?.reshape((1, 4, 2))?;
        let actions = Tensor::from_slice(&[10f32, 11.0, 12.0], (1, 3, 1), &dev)?;
        let (fa, n_fa) = feature_actions(&features, &actions)?;

        assert_eq!(fa.dims(), &[1, 3 * 2 + 2 * 1]);
        assert_eq!(
            fa.flatten_all()?.to_vec1::<f32>()?,
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 10.0, 11.0]
        );
        assert_eq!(
            n_fa.flatten_all()?.to_vec1::<f32>()?,
            vec![2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 11.0, 12.0]
        );
        Ok(())
    }
}
