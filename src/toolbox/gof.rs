//! Goodness-of-fit statistics for SERIES_COMPARE

use serde::Serialize;

use crate::error::{TsError, TsResult};

use super::mean;

/// Simulated, observed and optional base values at common timestamps
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Paired {
    pub sim: Vec<f64>,
    pub obs: Vec<f64>,
    pub base: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FitStatistic {
    Bias,
    StandardError,
    RelativeBias,
    RelativeStandardError,
    NashSutcliffe,
    CoefficientOfEfficiency,
    IndexOfAgreement,
    VolumetricEfficiency,
}

impl FitStatistic {
    pub const ALL: [FitStatistic; 8] = [
        FitStatistic::Bias,
        FitStatistic::StandardError,
        FitStatistic::RelativeBias,
        FitStatistic::RelativeStandardError,
        FitStatistic::NashSutcliffe,
        FitStatistic::CoefficientOfEfficiency,
        FitStatistic::IndexOfAgreement,
        FitStatistic::VolumetricEfficiency,
    ];

    /// Control-file keyword that requests this statistic
    pub fn keyword(&self) -> &'static str {
        match self {
            FitStatistic::Bias => "bias",
            FitStatistic::StandardError => "standard_error",
            FitStatistic::RelativeBias => "relative_bias",
            FitStatistic::RelativeStandardError => "relative_standard_error",
            FitStatistic::NashSutcliffe => "nash_sutcliffe",
            FitStatistic::CoefficientOfEfficiency => "coefficient_of_efficiency",
            FitStatistic::IndexOfAgreement => "index_of_agreement",
            FitStatistic::VolumetricEfficiency => "volumetric_efficiency",
        }
    }

    /// Row label in c_table reports
    pub fn label(&self) -> &'static str {
        match self {
            FitStatistic::Bias => "Bias:",
            FitStatistic::StandardError => "Standard error:",
            FitStatistic::RelativeBias => "Relative bias:",
            FitStatistic::RelativeStandardError => "Relative standard error:",
            FitStatistic::NashSutcliffe => "Nash-Sutcliffe coefficient:",
            FitStatistic::CoefficientOfEfficiency => "Coefficient of efficiency:",
            FitStatistic::IndexOfAgreement => "Index of agreement:",
            FitStatistic::VolumetricEfficiency => "Volumetric efficiency:",
        }
    }

    pub fn compute(&self, pairs: &Paired, exponent: u32) -> TsResult<f64> {
        let n = pairs.sim.len();
        if n == 0 || pairs.obs.len() != n {
            return Err(TsError::Validation(
                "no common timestamps between simulated and observed series".into(),
            ));
        }
        let obs_mean = mean(&pairs.obs).unwrap_or(0.0);
        let errors = || pairs.sim.iter().zip(&pairs.obs).map(|(s, o)| s - o);
        let base_at = |i: usize| match &pairs.base {
            Some(b) => b[i],
            None => obs_mean,
        };
        let mse = errors().map(|e| e * e).sum::<f64>() / n as f64;
        let value = match self {
            FitStatistic::Bias => errors().sum::<f64>() / n as f64,
            FitStatistic::StandardError => mse.sqrt(),
            FitStatistic::RelativeBias => ratio(errors().sum::<f64>() / n as f64, obs_mean)?,
            FitStatistic::RelativeStandardError => ratio(mse.sqrt(), obs_mean)?,
            FitStatistic::NashSutcliffe => {
                let spread: f64 = pairs.obs.iter().map(|o| (o - obs_mean).powi(2)).sum();
                1.0 - ratio(mse * n as f64, spread)?
            }
            FitStatistic::CoefficientOfEfficiency => {
                let num: f64 = errors().map(|e| e.abs().powi(exponent as i32)).sum();
                let den: f64 = pairs
                    .obs
                    .iter()
                    .enumerate()
                    .map(|(i, o)| (o - base_at(i)).abs().powi(exponent as i32))
                    .sum();
                1.0 - ratio(num, den)?
            }
            FitStatistic::IndexOfAgreement => {
                let num: f64 = errors().map(|e| e.abs().powi(exponent as i32)).sum();
                let den: f64 = pairs
                    .sim
                    .iter()
                    .zip(&pairs.obs)
                    .enumerate()
                    .map(|(i, (s, o))| {
                        let b = base_at(i);
                        ((s - b).abs() + (o - b).abs()).powi(exponent as i32)
                    })
                    .sum();
                1.0 - ratio(num, den)?
            }
            FitStatistic::VolumetricEfficiency => {
                let abs_err: f64 = errors().map(f64::abs).sum();
                1.0 - ratio(abs_err, pairs.obs.iter().sum())?
            }
        };
        Ok(value)
    }
}

fn ratio(num: f64, den: f64) -> TsResult<f64> {
    if den == 0.0 {
        return Err(TsError::Validation(
            "statistic is undefined: observed values give a zero denominator".into(),
        ));
    }
    Ok(num / den)
}

/// Accepted exponents for the efficiency and agreement statistics
pub fn check_exponent(exponent: f64) -> TsResult<u32> {
    if exponent == 1.0 {
        Ok(1)
    } else if exponent == 2.0 {
        Ok(2)
    } else {
        Err(TsError::invalid(
            "exponent",
            exponent.to_string(),
            "must be 1 or 2",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs() -> Paired {
        Paired {
            sim: vec![2.0, 4.0, 6.0],
            obs: vec![1.0, 4.0, 7.0],
            base: None,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_bias_and_errors() {
        let p = pairs();
        assert!(approx(FitStatistic::Bias.compute(&p, 1).unwrap(), 0.0));
        let rmse = (2.0f64 / 3.0).sqrt();
        assert!(approx(FitStatistic::StandardError.compute(&p, 1).unwrap(), rmse));
        assert!(approx(
            FitStatistic::RelativeStandardError.compute(&p, 1).unwrap(),
            rmse / 4.0
        ));
        // 1 - 2 / 18
        assert!(approx(
            FitStatistic::NashSutcliffe.compute(&p, 1).unwrap(),
            1.0 - 2.0 / 18.0
        ));
        assert!(approx(
            FitStatistic::VolumetricEfficiency.compute(&p, 1).unwrap(),
            1.0 - 2.0 / 12.0
        ));
    }

    #[test]
    fn test_efficiency_uses_base_or_mean() {
        let p = pairs();
        // |o - mean| = 3, 0, 3
        assert!(approx(
            FitStatistic::CoefficientOfEfficiency.compute(&p, 1).unwrap(),
            1.0 - 2.0 / 6.0
        ));
        let with_base = Paired {
            base: Some(vec![0.0, 0.0, 0.0]),
            ..pairs()
        };
        assert!(approx(
            FitStatistic::CoefficientOfEfficiency
                .compute(&with_base, 2)
                .unwrap(),
            1.0 - 2.0 / 66.0
        ));
        // (|s-b| + |o-b|): 3, 8, 13
        assert!(approx(
            FitStatistic::IndexOfAgreement.compute(&with_base, 1).unwrap(),
            1.0 - 2.0 / 24.0
        ));
    }

    #[test]
    fn test_exponent_and_empty() {
        assert_eq!(check_exponent(2.0).unwrap(), 2);
        assert!(check_exponent(3.0).is_err());
        assert!(FitStatistic::Bias.compute(&Paired::default(), 1).is_err());
    }
}
