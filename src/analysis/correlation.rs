use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::analysis::statistics::mean;
use crate::error::{Error, Result};

/// Pearson correlation coefficient with its two-sided p-value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correlation {
    pub r: f64,
    pub p_value: f64,
}

pub fn pearson(x: &[f64], y: &[f64]) -> Result<Correlation> {
    if x.len() != y.len() {
        return Err(Error::InvalidInput(format!(
            "series lengths differ: {} vs {}",
            x.len(),
            y.len()
        )));
    }
    let n = x.len();
    if n < 3 {
        return Err(Error::InsufficientData(format!(
            "correlation needs at least 3 points, got {}",
            n
        )));
    }

    let mx = mean(x);
    let my = mean(y);
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx).powi(2);
        syy += (b - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return Err(Error::DegenerateInput("correlation of a constant series".to_string()));
    }

    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    let dof = n as f64 - 2.0;
    let p_value = if (1.0 - r.abs()) < 1e-12 {
        0.0
    } else {
        let t = r * (dof / (1.0 - r * r)).sqrt();
        let dist = StudentsT::new(0.0, 1.0, dof)
            .map_err(|e| Error::InvalidInput(format!("Student t with {} dof: {}", dof, e)))?;
        2.0 * dist.sf(t.abs())
    };

    Ok(Correlation { r, p_value })
}

/// Indices of the `n` series most correlated with `target`, weakest of them first
///
/// Used to rank per-symbol volume series against the index price.
pub fn top_correlated(series: &[Vec<f64>], target: &[f64], n: usize) -> Result<Vec<usize>> {
    if n > series.len() {
        return Err(Error::InvalidInput(format!(
            "requested top {} of {} series",
            n,
            series.len()
        )));
    }

    let mut scored = series
        .iter()
        .enumerate()
        .map(|(i, s)| pearson(s, target).map(|c| (i, c.r)))
        .collect::<Result<Vec<_>>>()?;

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(n);
    scored.reverse();
    Ok(scored.into_iter().map(|(i, _)| i).collect())
}

/// Lag of `a` relative to `b` that maximizes their full cross-correlation
///
/// A positive lag means `a` trails `b`: `a[i + lag]` lines up with `b[i]`.
pub fn cross_correlation_lag(a: &[f64], b: &[f64]) -> Result<isize> {
    if a.is_empty() || b.is_empty() {
        return Err(Error::InvalidInput("cross-correlation of an empty series".to_string()));
    }

    let na = a.len() as isize;
    let nb = b.len() as isize;
    let mut best_lag = -(nb - 1);
    let mut best = f64::NEG_INFINITY;

    for lag in -(nb - 1)..na {
        let start = (-lag).max(0);
        let end = nb.min(na - lag);
        let sum: f64 = (start..end)
            .map(|i| a[(i + lag) as usize] * b[i as usize])
            .sum();
        if sum > best {
            best = sum;
            best_lag = lag;
        }
    }

    Ok(best_lag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pearson_perfect() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        let c = pearson(&x, &y).unwrap();
        assert!((c.r - 1.0).abs() < 1e-12);
        assert_eq!(c.p_value, 0.0);

        let neg: Vec<f64> = y.iter().map(|v| -v).collect();
        assert!((pearson(&x, &neg).unwrap().r + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_p_value() {
        // r = 0.8 with n = 5 -> t = 0.8 * sqrt(3 / 0.36) = 2.3094, two-sided p ~ 0.1041
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 1.0, 4.0, 3.0, 5.0];
        let c = pearson(&x, &y).unwrap();
        assert!((c.r - 0.8).abs() < 1e-12);
        assert!((c.p_value - 0.1041).abs() < 1e-3);
    }

    #[test]
    fn test_pearson_tiny_p_value_stays_positive() {
        // r ~ 0.985 over 30 points, t ~ 30 with 28 dof
        let x: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, v)| if i % 2 == 0 { v + 1.5 } else { v - 1.5 })
            .collect();
        let c = pearson(&x, &y).unwrap();
        assert!((c.r - 0.98507).abs() < 1e-4);
        assert!(c.p_value > 0.0);
        assert!(c.p_value < 1e-15);
    }

    #[test]
    fn test_pearson_errors() {
        assert!(pearson(&[1.0, 2.0], &[1.0, 2.0]).is_err());
        assert!(pearson(&[1.0, 2.0, 3.0], &[1.0, 2.0]).is_err());
        assert!(matches!(
            pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]),
            Err(Error::DegenerateInput(_))
        ));
    }

    #[test]
    fn test_top_correlated_orders_ascending() {
        let target = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let series = vec![
            vec![5.0, 4.0, 3.0, 2.0, 1.0], // r = -1
            vec![1.0, 2.0, 3.0, 4.0, 5.0], // r = 1
            vec![2.0, 1.0, 4.0, 3.0, 5.0], // r = 0.8
        ];
        assert_eq!(top_correlated(&series, &target, 2).unwrap(), vec![2, 1]);
        assert!(top_correlated(&series, &target, 4).is_err());
    }

    #[test]
    fn test_cross_correlation_lag() {
        let b = [0.0, 1.0, 0.0, 0.0];
        let a = [0.0, 0.0, 1.0, 0.0];
        assert_eq!(cross_correlation_lag(&a, &b).unwrap(), 1);
        assert_eq!(cross_correlation_lag(&b, &a).unwrap(), -1);
        assert_eq!(cross_correlation_lag(&b, &b).unwrap(), 0);
        assert!(cross_correlation_lag(&[], &b).is_err());
    }
}
