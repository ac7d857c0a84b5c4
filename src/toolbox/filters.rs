//! Digital filters
//!
//! Butterworth low/high/band pass filters built from cascaded second order
//! sections (bilinear transform with frequency prewarping), and the Chapman
//! one-parameter baseflow filter. Filters run over the valid values in time
//! order; missing values are skipped, not interpolated.

use serde::Serialize;

use crate::error::{TsError, TsResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Pass {
    Low,
    High,
    Band,
}

impl Pass {
    pub fn parse(text: &str) -> TsResult<Pass> {
        match text.trim().to_lowercase().as_str() {
            "low" => Ok(Pass::Low),
            "high" => Ok(Pass::High),
            "band" | "bandpass" => Ok(Pass::Band),
            _ => Err(TsError::invalid("filter_pass", text, "expected low, high or band")),
        }
    }
}

/// One second order section, `a0` normalized to 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b: [f64; 3],
    pub a: [f64; 2],
}

impl Biquad {
    pub fn run(&self, input: &[f64]) -> Vec<f64> {
        let (mut x1, mut x2, mut y1, mut y2) = (0.0, 0.0, 0.0, 0.0);
        input
            .iter()
            .map(|&x| {
                let y = self.b[0] * x + self.b[1] * x1 + self.b[2] * x2
                    - self.a[0] * y1
                    - self.a[1] * y2;
                x2 = x1;
                x1 = x;
                y2 = y1;
                y1 = y;
                y
            })
            .collect()
    }
}

/// Sections of an order-`order` Butterworth filter with cutoff `cutoff`
/// (cycles per unit time) at sampling rate `rate` (samples per unit time)
pub fn butterworth_sections(order: usize, cutoff: f64, rate: f64, high: bool) -> TsResult<Vec<Biquad>> {
    if order == 0 {
        return Err(TsError::invalid("stages", "0", "must be at least 1"));
    }
    if !(cutoff > 0.0 && cutoff < rate / 2.0) {
        return Err(TsError::invalid(
            "cutoff_frequency",
            cutoff.to_string(),
            format!("must be between 0 and the Nyquist frequency {}", rate / 2.0),
        ));
    }
    let k = (std::f64::consts::PI * cutoff / rate).tan();
    let mut sections = Vec::new();
    for i in 0..order / 2 {
        let theta = std::f64::consts::PI * (2 * i + 1) as f64 / (2 * order) as f64;
        let q = 1.0 / (2.0 * theta.sin());
        let norm = 1.0 / (1.0 + k / q + k * k);
        let a = [2.0 * (k * k - 1.0) * norm, (1.0 - k / q + k * k) * norm];
        let b = if high {
            [norm, -2.0 * norm, norm]
        } else {
            let b0 = k * k * norm;
            [b0, 2.0 * b0, b0]
        };
        sections.push(Biquad { b, a });
    }
    if order % 2 == 1 {
        let norm = 1.0 / (1.0 + k);
        let a = [(k - 1.0) * norm, 0.0];
        let b = if high {
            [norm, -norm, 0.0]
        } else {
            [k * norm, k * norm, 0.0]
        };
        sections.push(Biquad { b, a });
    }
    Ok(sections)
}

/// Butterworth settings as given in a DIGITAL_FILTER block
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Butterworth {
    pub pass: Pass,
    /// Low/high cutoff, or `(low, high)` band edges, in cycles per day
    pub cutoff: (f64, Option<f64>),
    pub stages: usize,
    pub reverse_second_stage: bool,
}

impl Butterworth {
    pub fn apply(&self, values: &[f64], samples_per_day: f64) -> TsResult<Vec<f64>> {
        let cascade = |sections: Vec<Biquad>, input: Vec<f64>| {
            sections.iter().fold(input, |acc, s| s.run(&acc))
        };
        match self.pass {
            Pass::Band => {
                let (low, Some(high)) = self.cutoff else {
                    return Err(TsError::Validation(
                        "band pass filtering needs CUTOFF_FREQUENCY_1 and CUTOFF_FREQUENCY_2".into(),
                    ));
                };
                if low >= high {
                    return Err(TsError::Validation(
                        "CUTOFF_FREQUENCY_1 must be below CUTOFF_FREQUENCY_2".into(),
                    ));
                }
                let highpassed = cascade(
                    butterworth_sections(self.stages, low, samples_per_day, true)?,
                    values.to_vec(),
                );
                Ok(cascade(
                    butterworth_sections(self.stages, high, samples_per_day, false)?,
                    highpassed,
                ))
            }
            Pass::Low if self.reverse_second_stage && self.stages == 2 => {
                // first order forward, then first order backward
                let section = butterworth_sections(1, self.cutoff.0, samples_per_day, false)?;
                let forward = cascade(section.clone(), values.to_vec());
                let mut reversed: Vec<f64> = forward.into_iter().rev().collect();
                reversed = cascade(section, reversed);
                Ok(reversed.into_iter().rev().collect())
            }
            Pass::Low | Pass::High => Ok(cascade(
                butterworth_sections(
                    self.stages,
                    self.cutoff.0,
                    samples_per_day,
                    self.pass == Pass::High,
                )?,
                values.to_vec(),
            )),
        }
    }
}

/// Chapman (1991) baseflow filter settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Chapman {
    pub alpha: f64,
    /// 1 or 3: forward, or forward/backward/forward
    pub passes: usize,
    pub clip_input: bool,
    pub clip_zero: bool,
}

impl Default for Chapman {
    fn default() -> Self {
        Self {
            alpha: 0.925,
            passes: 1,
            clip_input: false,
            clip_zero: false,
        }
    }
}

impl Chapman {
    pub fn apply(&self, flow: &[f64]) -> TsResult<Vec<f64>> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(TsError::invalid(
                "alpha",
                self.alpha.to_string(),
                "must be between 0 and 1",
            ));
        }
        if self.passes != 1 && self.passes != 3 {
            return Err(TsError::invalid(
                "passes",
                self.passes.to_string(),
                "must be 1 or 3",
            ));
        }
        let mut current = self.pass(flow, flow.to_vec());
        if self.passes == 3 {
            let rev_flow: Vec<f64> = flow.iter().rev().copied().collect();
            let rev: Vec<f64> = current.into_iter().rev().collect();
            let backward: Vec<f64> = self.pass(&rev_flow, rev).into_iter().rev().collect();
            current = self.pass(flow, backward);
        }
        Ok(current)
    }

    fn pass(&self, flow: &[f64], input: Vec<f64>) -> Vec<f64> {
        let k = self.alpha;
        let mut out: Vec<f64> = Vec::with_capacity(input.len());
        for (i, q) in input.iter().enumerate() {
            let mut b = match out.last() {
                None => *q,
                Some(prev) => k / (2.0 - k) * prev + (1.0 - k) / (2.0 - k) * q,
            };
            if self.clip_input {
                b = b.min(flow[i]);
            }
            if self.clip_zero {
                b = b.max(0.0);
            }
            out.push(b);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_lowpass_unity_dc_gain() {
        let f = Butterworth {
            pass: Pass::Low,
            cutoff: (0.1, None),
            stages: 3,
            reverse_second_stage: false,
        };
        let out = f.apply(&vec![2.0; 400], 1.0).unwrap();
        assert!(approx(*out.last().unwrap(), 2.0));
    }

    #[test]
    fn test_highpass_removes_constant() {
        let f = Butterworth {
            pass: Pass::High,
            cutoff: (0.1, None),
            stages: 2,
            reverse_second_stage: false,
        };
        let out = f.apply(&vec![5.0; 400], 1.0).unwrap();
        assert!(out.last().unwrap().abs() < 1e-6);
    }

    #[test]
    fn test_cutoff_above_nyquist() {
        assert!(butterworth_sections(1, 0.6, 1.0, false).is_err());
    }

    #[test]
    fn test_chapman_below_flow_with_clip() {
        let flow = [10.0, 50.0, 30.0, 12.0, 11.0];
        let chapman = Chapman {
            clip_input: true,
            ..Chapman::default()
        };
        let base = chapman.apply(&flow).unwrap();
        assert_eq!(base[0], 10.0);
        assert!(base.iter().zip(flow).all(|(b, q)| *b <= q));
        let three = Chapman {
            passes: 3,
            ..chapman
        };
        assert_eq!(three.apply(&flow).unwrap().len(), flow.len());
        assert!(Chapman {
            passes: 2,
            ..chapman
        }
        .apply(&flow)
        .is_err());
    }
}
