//! Console output of solve results.

use anyhow::{Result, ensure};
use lattix::{MixedPrecisionResult, MultigridResult};

pub fn print_header(title: &str) {
    println!("{}", title);
    println!("{}", "=".repeat(title.len()));
    println!();
}

pub fn print_vcycle(result: &MultigridResult) {
    println!("Status:    {} after {} V-cycles", result.status, result.iterations);
    println!(
        "Defect:    {:.3e} -> {:.3e}",
        result.initial_defect, result.defect
    );
    if let Some(kappa) = result.kappa {
        println!("Rate:      {:.4}", kappa);
    }
}

pub fn print_mixed(result: &MixedPrecisionResult) {
    let status = if result.converged {
        "converged"
    } else {
        "not converged"
    };
    println!(
        "Status:    {} after {} outer iterations ({} inner V-cycles)",
        status, result.outer_iterations, result.inner_cycles
    );
    println!(
        "Defect:    {:.3e} -> {:.3e}",
        result.initial_defect, result.defect
    );
}

/// Largest pointwise deviation of `x` from `reference`.
pub fn max_error(x: &[f64], reference: &[f64]) -> Result<f64> {
    ensure!(
        x.len() == reference.len(),
        "reference solution has {} entries, expected {}",
        reference.len(),
        x.len()
    );
    Ok(x.iter()
        .zip(reference)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max))
}

pub fn print_error(x: &[f64], reference: &[f64]) -> Result<()> {
    println!("Max error vs reference: {:.3e}", max_error(x, reference)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_error_is_pointwise() {
        let e = max_error(&[1.0, 2.0, 3.5], &[1.0, 2.25, 3.0]).unwrap();
        assert_eq!(e, 0.5);
    }

    #[test]
    fn max_error_rejects_length_mismatch() {
        assert!(max_error(&[1.0], &[1.0, 2.0]).is_err());
    }
}
