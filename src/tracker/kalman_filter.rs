//! Constant-velocity Kalman filter on a region's centre, used by the template
//! backend to place its search window.

use ndarray::{Array1, Array2, array};

/// State is `[cx, cy, vx, vy]`; measurements are `[cx, cy]`.
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    motion_mat: Array2<f64>,
    update_mat: Array2<f64>,
    process_noise: f64,
    measurement_noise: f64,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new(1.0, 4.0)
    }
}

impl KalmanFilter {
    pub fn new(process_noise: f64, measurement_noise: f64) -> Self {
        let ndim = 2;
        let mut motion_mat = Array2::eye(2 * ndim);
        for i in 0..ndim {
            motion_mat[[i, ndim + i]] = 1.0;
        }

        let mut update_mat = Array2::zeros((ndim, 2 * ndim));
        for i in 0..ndim {
            update_mat[[i, i]] = 1.0;
        }

        Self {
            motion_mat,
            update_mat,
            process_noise,
            measurement_noise,
        }
    }

    pub fn initiate(&self, center: [f64; 2]) -> (Array1<f64>, Array2<f64>) {
        let mean = array![center[0], center[1], 0.0, 0.0];
        let mut cov = Array2::zeros((4, 4));
        for i in 0..2 {
            cov[[i, i]] = self.measurement_noise;
            cov[[i + 2, i + 2]] = 10.0 * self.process_noise;
        }
        (mean, cov)
    }

    pub fn predict(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let motion_cov = Array2::<f64>::eye(4) * self.process_noise;
        let new_mean = self.motion_mat.dot(mean);
        let new_covariance = self.motion_mat.dot(covariance).dot(&self.motion_mat.t()) + motion_cov;
        (new_mean, new_covariance)
    }

    /// Fold in a measured centre. Returns the prior unchanged if the
    /// innovation covariance is singular.
    pub fn update(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        measurement: [f64; 2],
    ) -> (Array1<f64>, Array2<f64>) {
        let innovation_cov = self.update_mat.dot(covariance).dot(&self.update_mat.t())
            + Array2::<f64>::eye(2) * self.measurement_noise;

        let Some(s_inv) = invert_2x2(&innovation_cov) else {
            return (mean.clone(), covariance.clone());
        };

        let innovation = array![measurement[0], measurement[1]] - self.update_mat.dot(mean);
        let kalman_gain = covariance.dot(&self.update_mat.t()).dot(&s_inv); // 4x2

        let new_mean = mean + &kalman_gain.dot(&innovation);
        let new_covariance = covariance - &kalman_gain.dot(&innovation_cov).dot(&kalman_gain.t());
        (new_mean, new_covariance)
    }
}

/// Invert a 2x2 matrix through nalgebra.
fn invert_2x2(m: &Array2<f64>) -> Option<Array2<f64>> {
    let nm = nalgebra::Matrix2::new(m[[0, 0]], m[[0, 1]], m[[1, 0]], m[[1, 1]]);
    let inv = nm.try_inverse()?;
    Some(Array2::from_shape_fn((2, 2), |(i, j)| inv[(i, j)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_initiate() {
        let kf = KalmanFilter::default();
        let (mean, _) = kf.initiate([100.0, 200.0]);
        assert_eq!(mean[0], 100.0);
        assert_eq!(mean[1], 200.0);
        assert_eq!(mean[2], 0.0);
    }

    #[test]
    fn test_learns_constant_velocity() {
        let kf = KalmanFilter::default();
        let (mut mean, mut cov) = kf.initiate([0.0, 0.0]);
        for step in 1..=20 {
            let (m, c) = kf.predict(&mean, &cov);
            let (m, c) = kf.update(&m, &c, [3.0 * step as f64, -1.0 * step as f64]);
            mean = m;
            cov = c;
        }
        assert_relative_eq!(mean[2], 3.0, epsilon = 0.2);
        assert_relative_eq!(mean[3], -1.0, epsilon = 0.2);

        let (predicted, _) = kf.predict(&mean, &cov);
        assert_relative_eq!(predicted[0], 63.0, epsilon = 1.0);
    }

    #[test]
    fn test_singular_inverse() {
        let singular = Array2::<f64>::zeros((2, 2));
        assert!(invert_2x2(&singular).is_none());
    }
}
