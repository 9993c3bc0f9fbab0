//! Per-class correctness bookkeeping and macro-F1.

/// Additive guard against zero denominators in F1.
pub const F1_EPSILON: f64 = 1e-10;

/// Epsilon-guarded F1 from raw counts.
///
/// Equals `2·precision·recall / (precision + recall)` when all counts are
/// positive, and 0 when a class was never predicted nor seen.
pub fn f1(correct: f64, predicted: f64, golden: f64) -> f64 {
    2.0 * correct / (predicted + golden + F1_EPSILON)
}

/// Running per-class counters for macro-F1 and accuracy.
#[derive(Debug, Clone)]
pub struct F1Counters {
    correct: Vec<f64>,
    predicted: Vec<f64>,
    golden: Vec<f64>,
    correct_total: f64,
    total: f64,
}

impl F1Counters {
    pub fn new(num_classes: usize) -> Self {
        Self {
            correct: vec![0.0; num_classes],
            predicted: vec![0.0; num_classes],
            golden: vec![0.0; num_classes],
            correct_total: 0.0,
            total: 0.0,
        }
    }

    /// Records one final-segment prediction against the gold label.
    pub fn record(&mut self, predicted: usize, golden: usize) {
        if predicted == golden {
            self.correct[predicted] += 1.0;
            self.correct_total += 1.0;
        }
        self.predicted[predicted] += 1.0;
        self.golden[golden] += 1.0;
        self.total += 1.0;
    }

    /// F1 of one class.
    pub fn class_f1(&self, class: usize) -> f64 {
        f1(self.correct[class], self.predicted[class], self.golden[class])
    }

    /// Mean F1 over the classes observed in the gold data.
    pub fn macro_f1(&self) -> f64 {
        let mut sum = 0.0;
        let mut n = 0;
        for class in 0..self.golden.len() {
            if self.golden[class] > 0.0 {
                sum += self.class_f1(class);
                n += 1;
            }
        }
        if n == 0 {
            0.0
        } else {
            sum / f64::from(n)
        }
    }

    /// Fraction of recorded predictions that were correct.
    pub fn accuracy(&self) -> f64 {
        if self.total == 0.0 {
            0.0
        } else {
            self.correct_total / self.total
        }
    }

    /// Number of recorded predictions.
    pub fn total(&self) -> f64 {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f1_guards_zero_counts() {
        let v = f1(0.0, 0.0, 0.0);
        assert_eq!(0.0, v);
        assert!(v.is_finite());
    }

    #[test]
    fn test_f1_perfect_class() {
        let v = f1(7.0, 7.0, 7.0);
        assert!((v - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_f1_range() {
        for &(c, p, g) in &[(0.0, 5.0, 3.0), (2.0, 4.0, 6.0), (3.0, 3.0, 3.0)] {
            let v = f1(c, p, g);
            assert!((0.0..=2.0).contains(&v));
        }
    }

    #[test]
    fn test_macro_f1_hand_computed() {
        // Three classes with known counts:
        //   class 0: correct 2, predicted 3, golden 2
        //   class 1: correct 1, predicted 1, golden 3
        //   class 2: never seen in gold, predicted once (excluded from mean)
        let mut counters = F1Counters::new(3);
        counters.record(0, 0);
        counters.record(0, 0);
        counters.record(0, 1);
        counters.record(1, 1);
        counters.record(2, 1);
        let f0 = 2.0 * 2.0 / (3.0 + 2.0 + F1_EPSILON);
        let f1_ = 2.0 * 1.0 / (1.0 + 3.0 + F1_EPSILON);
        let expected = (f0 + f1_) / 2.0;
        assert!((counters.macro_f1() - expected).abs() < 1e-9);
        assert!((counters.accuracy() - 3.0 / 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_counters() {
        let counters = F1Counters::new(4);
        assert_eq!(0.0, counters.macro_f1());
        assert_eq!(0.0, counters.accuracy());
    }
}
