//! USGS HYSEP baseflow separation (Sloto and Crouse, 1996)
//!
//! All three methods work on consecutive daily values and an interval of
//! `2N*` days. The returned baseflow never exceeds the streamflow.

use serde::Serialize;

use crate::error::{TsError, TsResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HysepMethod {
    Fixed,
    Local,
    Sliding,
}

impl HysepMethod {
    pub fn parse(text: &str) -> TsResult<HysepMethod> {
        match text.trim().to_lowercase().as_str() {
            "fixed" => Ok(HysepMethod::Fixed),
            "local" => Ok(HysepMethod::Local),
            "sliding" | "slide" => Ok(HysepMethod::Sliding),
            _ => Err(TsError::invalid(
                "hysep_type",
                text,
                "expected fixed, local or sliding",
            )),
        }
    }
}

pub fn separate(flow: &[f64], method: HysepMethod, interval: usize) -> TsResult<Vec<f64>> {
    if interval == 0 {
        return Err(TsError::invalid("time_interval", "0", "must be at least 1"));
    }
    let base = match method {
        HysepMethod::Fixed => fixed(flow, interval),
        HysepMethod::Sliding => sliding(flow, interval),
        HysepMethod::Local => local(flow, interval),
    };
    Ok(base.into_iter().zip(flow).map(|(b, q)| b.min(*q)).collect())
}

fn window_min(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

/// Centered window bounds for position `i`
fn centered(i: usize, interval: usize, len: usize) -> (usize, usize) {
    let half = (interval.saturating_sub(1)) / 2;
    (i.saturating_sub(half), (i + half + 1).min(len))
}

fn fixed(flow: &[f64], interval: usize) -> Vec<f64> {
    flow.chunks(interval)
        .flat_map(|chunk| std::iter::repeat(window_min(chunk)).take(chunk.len()))
        .collect()
}

fn sliding(flow: &[f64], interval: usize) -> Vec<f64> {
    (0..flow.len())
        .map(|i| {
            let (lo, hi) = centered(i, interval, flow.len());
            window_min(&flow[lo..hi])
        })
        .collect()
}

fn local(flow: &[f64], interval: usize) -> Vec<f64> {
    let minima: Vec<usize> = (0..flow.len())
        .filter(|&i| {
            let (lo, hi) = centered(i, interval, flow.len());
            flow[i] <= window_min(&flow[lo..hi])
        })
        .collect();
    let (Some(&first), Some(&last)) = (minima.first(), minima.last()) else {
        return flow.to_vec();
    };
    let mut base = vec![0.0; flow.len()];
    for (i, slot) in base.iter_mut().enumerate() {
        *slot = if i <= first {
            flow[first]
        } else if i >= last {
            flow[last]
        } else {
            let right = minima.partition_point(|&m| m < i);
            let (a, b) = (minima[right - 1], minima[right]);
            if a == i || b == i {
                flow[i]
            } else {
                let frac = (i - a) as f64 / (b - a) as f64;
                flow[a] + (flow[b] - flow[a]) * frac
            }
        };
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLOW: [f64; 10] = [5.0, 4.0, 9.0, 12.0, 6.0, 3.0, 8.0, 7.0, 2.0, 4.0];

    #[test]
    fn test_fixed_takes_interval_minimum() {
        let base = separate(&FLOW, HysepMethod::Fixed, 5).unwrap();
        assert_eq!(&base[..5], &[4.0; 5]);
        assert_eq!(&base[5..], &[2.0; 5]);
    }

    #[test]
    fn test_sliding_is_centered() {
        let base = separate(&FLOW, HysepMethod::Sliding, 3).unwrap();
        assert_eq!(base[0], 4.0);
        assert_eq!(base[3], 6.0);
        assert_eq!(base[9], 2.0);
    }

    #[test]
    fn test_local_interpolates_between_minima() {
        let base = separate(&FLOW, HysepMethod::Local, 5).unwrap();
        assert!(base.iter().zip(FLOW).all(|(b, q)| *b <= q));
        assert_eq!(base[5], 3.0);
        assert_eq!(base[8], 2.0);
        assert!((base[6] - (3.0 - 1.0 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn test_method_names() {
        assert_eq!(HysepMethod::parse("SLIDING").unwrap(), HysepMethod::Sliding);
        assert!(HysepMethod::parse("moving").is_err());
    }
}
