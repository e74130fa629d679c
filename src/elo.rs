//! Pure logistic Elo estimator.

const EPSILON: f64 = 1e-9;

/// Estimate the Elo difference (and its 2σ band) implied by a match outcome
/// `(wins, losses, draws)` from the perspective of the first side.
///
/// Returns `(0.0, 0.0)` for zero games, never panics or produces `NaN`.
pub fn estimate(wins: u32, losses: u32, draws: u32) -> (f64, f64) {
    let total = wins + losses + draws;
    if total == 0 {
        return (0.0, 0.0);
    }

    let score = wins as f64 + 0.5 * draws as f64;
    let n = total as f64;
    let p = (score / n).clamp(EPSILON, 1.0 - EPSILON);

    let elo = 400.0 * (p / (1.0 - p)).log10();
    let sigma_p = (p * (1.0 - p) / n).sqrt();
    let sigma_elo = sigma_p * 400.0 / (std::f64::consts::LN_10 * p * (1.0 - p));

    (elo, 2.0 * sigma_elo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_games_returns_zero() {
        assert_eq!(estimate(0, 0, 0), (0.0, 0.0));
    }

    #[test]
    fn balanced_outcomes_are_zero_elo() {
        for (w, l, d) in [(3, 3, 0), (0, 0, 5), (10, 10, 10), (1, 1, 1)] {
            let (elo, sigma2) = estimate(w, l, d);
            assert!(elo.abs() < 1e-9, "expected 0 elo for ({w},{l},{d}), got {elo}");
            assert!(sigma2 >= 0.0);
        }
    }

    #[test]
    fn all_wins_is_positive_and_finite() {
        let (elo, sigma2) = estimate(10, 0, 0);
        assert!(elo > 0.0);
        assert!(elo.is_finite());
        assert!(sigma2.is_finite());
    }

    #[test]
    fn all_losses_is_negative_and_finite() {
        let (elo, _) = estimate(0, 10, 0);
        assert!(elo < 0.0);
        assert!(elo.is_finite());
    }

    #[test]
    fn matches_worked_example() {
        // W=10, L=4, D=6 -> p=0.65, elo ~= 107.54, 2sigma ~= 162.88
        let (elo, sigma2) = estimate(10, 4, 6);
        assert!((elo - 107.54).abs() < 0.1, "elo = {elo}");
        assert!((sigma2 - 162.88).abs() < 1.0, "2sigma = {sigma2}");
    }

    #[test]
    fn is_a_pure_function() {
        let a = estimate(7, 2, 3);
        let b = estimate(7, 2, 3);
        assert_eq!(a, b);
    }
}
