use anyhow::{anyhow, Result};
use rayon::prelude::*;

/// Fit/predict contract for the surge classifier. `fit` requires both label
/// classes to be present; callers screen single-class training sets first.
pub trait Classifier: Send {
    fn fit(&mut self, features: &[Vec<f64>], labels: &[bool]) -> Result<()>;

    /// Probability of the positive (surge) class for one feature vector.
    fn predict_probability(&self, features: &[f64]) -> f64;

    fn name(&self) -> &'static str;
}

fn validate_training_set(features: &[Vec<f64>], labels: &[bool]) -> Result<usize> {
    if features.is_empty() {
        return Err(anyhow!("Cannot fit classifier on an empty training set"));
    }
    if features.len() != labels.len() {
        return Err(anyhow!(
            "Feature rows ({}) and labels ({}) differ in length",
            features.len(),
            labels.len()
        ));
    }
    let width = features[0].len();
    if width == 0 {
        return Err(anyhow!("Feature vectors are empty"));
    }
    if features.iter().any(|row| row.len() != width) {
        return Err(anyhow!("Feature rows have inconsistent widths"));
    }
    let positives = labels.iter().filter(|&&label| label).count();
    if positives == 0 || positives == labels.len() {
        return Err(anyhow!(
            "Training set has a single label class ({} of {} positive)",
            positives,
            labels.len()
        ));
    }
    Ok(width)
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Logistic regression fitted by fixed-iteration full-batch gradient descent.
/// Zero initialization and a fixed schedule keep the fit fully deterministic.
/// Features are standardized internally so one learning rate serves all
/// indicator scales.
pub struct LogisticRegression {
    learning_rate: f64,
    iterations: usize,
    weights: Vec<f64>,
    bias: f64,
    feature_means: Vec<f64>,
    feature_stds: Vec<f64>,
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            learning_rate: 0.1,
            iterations: 200,
            weights: Vec::new(),
            bias: 0.0,
            feature_means: Vec::new(),
            feature_stds: Vec::new(),
        }
    }

    fn standardize(&self, features: &[f64]) -> Vec<f64> {
        features
            .iter()
            .enumerate()
            .map(|(i, &value)| {
                let mean = self.feature_means.get(i).copied().unwrap_or(0.0);
                let std = self.feature_stds.get(i).copied().unwrap_or(1.0);
                (value - mean) / std
            })
            .collect()
    }
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, features: &[Vec<f64>], labels: &[bool]) -> Result<()> {
        let width = validate_training_set(features, labels)?;
        let rows = features.len() as f64;

        let mut means = vec![0.0; width];
        for row in features {
            for (i, &value) in row.iter().enumerate() {
                means[i] += value;
            }
        }
        for mean in &mut means {
            *mean /= rows;
        }

        let mut stds = vec![0.0; width];
        for row in features {
            for (i, &value) in row.iter().enumerate() {
                let diff = value - means[i];
                stds[i] += diff * diff;
            }
        }
        for std in &mut stds {
            *std = (*std / rows).sqrt();
            if *std < 1e-9 {
                *std = 1.0;
            }
        }

        self.feature_means = means;
        self.feature_stds = stds;

        let standardized: Vec<Vec<f64>> = features
            .iter()
            .map(|row| self.standardize(row))
            .collect();
        let targets: Vec<f64> = labels
            .iter()
            .map(|&label| if label { 1.0 } else { 0.0 })
            .collect();

        let mut weights = vec![0.0; width];
        let mut bias = 0.0;

        for _ in 0..self.iterations {
            let mut weight_gradients = vec![0.0; width];
            let mut bias_gradient = 0.0;

            for (row, &target) in standardized.iter().zip(targets.iter()) {
                let z: f64 = row
                    .iter()
                    .zip(weights.iter())
                    .map(|(x, w)| x * w)
                    .sum::<f64>()
                    + bias;
                let error = sigmoid(z) - target;
                for (gradient, &x) in weight_gradients.iter_mut().zip(row.iter()) {
                    *gradient += error * x;
                }
                bias_gradient += error;
            }

            for (weight, gradient) in weights.iter_mut().zip(weight_gradients.iter()) {
                *weight -= self.learning_rate * gradient / rows;
            }
            bias -= self.learning_rate * bias_gradient / rows;
        }

        self.weights = weights;
        self.bias = bias;
        Ok(())
    }

    fn predict_probability(&self, features: &[f64]) -> f64 {
        if self.weights.is_empty() || features.len() != self.weights.len() {
            return 0.5;
        }
        let standardized = self.standardize(features);
        let z: f64 = standardized
            .iter()
            .zip(self.weights.iter())
            .map(|(x, w)| x * w)
            .sum::<f64>()
            + self.bias;
        sigmoid(z)
    }

    fn name(&self) -> &'static str {
        "logistic_regression"
    }
}

const VARIANCE_FLOOR: f64 = 1e-9;

struct ClassDensity {
    log_prior: f64,
    means: Vec<f64>,
    variances: Vec<f64>,
}

impl ClassDensity {
    fn from_rows(rows: &[&Vec<f64>], width: usize, total: usize) -> Self {
        let count = rows.len() as f64;
        let mut means = vec![0.0; width];
        for row in rows {
            for (i, &value) in row.iter().enumerate() {
                means[i] += value;
            }
        }
        for mean in &mut means {
            *mean /= count;
        }

        let mut variances = vec![0.0; width];
        for row in rows {
            for (i, &value) in row.iter().enumerate() {
                let diff = value - means[i];
                variances[i] += diff * diff;
            }
        }
        for variance in &mut variances {
            *variance = (*variance / count).max(VARIANCE_FLOOR);
        }

        Self {
            log_prior: (count / total as f64).ln(),
            means,
            variances,
        }
    }

    fn log_likelihood(&self, features: &[f64]) -> f64 {
        let mut total = self.log_prior;
        for (i, &value) in features.iter().enumerate() {
            let mean = self.means[i];
            let variance = self.variances[i];
            let diff = value - mean;
            total += -0.5 * ((2.0 * std::f64::consts::PI * variance).ln() + diff * diff / variance);
        }
        total
    }
}

/// Gaussian naive Bayes with a variance floor so constant features cannot
/// produce degenerate densities.
pub struct GaussianNaiveBayes {
    positive: Option<ClassDensity>,
    negative: Option<ClassDensity>,
}

impl GaussianNaiveBayes {
    pub fn new() -> Self {
        Self {
            positive: None,
            negative: None,
        }
    }
}

impl Default for GaussianNaiveBayes {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for GaussianNaiveBayes {
    fn fit(&mut self, features: &[Vec<f64>], labels: &[bool]) -> Result<()> {
        let width = validate_training_set(features, labels)?;

        let mut positive_rows = Vec::new();
        let mut negative_rows = Vec::new();
        for (row, &label) in features.iter().zip(labels.iter()) {
            if label {
                positive_rows.push(row);
            } else {
                negative_rows.push(row);
            }
        }

        let total = features.len();
        self.positive = Some(ClassDensity::from_rows(&positive_rows, width, total));
        self.negative = Some(ClassDensity::from_rows(&negative_rows, width, total));
        Ok(())
    }

    fn predict_probability(&self, features: &[f64]) -> f64 {
        let (positive, negative) = match (&self.positive, &self.negative) {
            (Some(p), Some(n)) => (p, n),
            _ => return 0.5,
        };
        if features.len() != positive.means.len() {
            return 0.5;
        }

        let log_pos = positive.log_likelihood(features);
        let log_neg = negative.log_likelihood(features);
        // Softmax over the two log joint densities, shifted for stability.
        let max_log = log_pos.max(log_neg);
        let exp_pos = (log_pos - max_log).exp();
        let exp_neg = (log_neg - max_log).exp();
        exp_pos / (exp_pos + exp_neg)
    }

    fn name(&self) -> &'static str {
        "gaussian_naive_bayes"
    }
}

/// Unweighted-mean ensemble. Members are fitted in parallel; averaging is
/// commutative so parallel fitting cannot change the output.
pub struct EnsembleModel {
    members: Vec<Box<dyn Classifier>>,
}

impl EnsembleModel {
    pub fn new(members: Vec<Box<dyn Classifier>>) -> Self {
        Self { members }
    }

    pub fn fit(&mut self, features: &[Vec<f64>], labels: &[bool]) -> Result<()> {
        if self.members.is_empty() {
            return Err(anyhow!("Ensemble has no member classifiers"));
        }
        self.members
            .par_iter_mut()
            .map(|member| member.fit(features, labels))
            .collect::<Result<Vec<_>>>()?;
        Ok(())
    }

    pub fn predict_probability(&self, features: &[f64]) -> f64 {
        if self.members.is_empty() {
            return 0.5;
        }
        let sum: f64 = self
            .members
            .iter()
            .map(|member| member.predict_probability(features))
            .sum();
        sum / self.members.len() as f64
    }

    pub fn member_names(&self) -> Vec<&'static str> {
        self.members.iter().map(|member| member.name()).collect()
    }
}

/// Factory used by the walk-forward loop to build a fresh model per rebalance.
pub type ModelFactory = Box<dyn Fn() -> EnsembleModel + Send + Sync>;

pub fn default_model_factory() -> ModelFactory {
    Box::new(|| {
        EnsembleModel::new(vec![
            Box::new(LogisticRegression::new()),
            Box::new(GaussianNaiveBayes::new()),
        ])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable_training_set() -> (Vec<Vec<f64>>, Vec<bool>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            let offset = (i as f64) * 0.01;
            features.push(vec![1.0 + offset, 0.5 + offset]);
            labels.push(true);
            features.push(vec![-1.0 - offset, -0.5 - offset]);
            labels.push(false);
        }
        (features, labels)
    }

    #[test]
    fn rejects_single_class_training_set() {
        let features = vec![vec![1.0], vec![2.0]];
        let labels = vec![true, true];
        assert!(LogisticRegression::new().fit(&features, &labels).is_err());
        assert!(GaussianNaiveBayes::new().fit(&features, &labels).is_err());
    }

    #[test]
    fn logistic_regression_separates_classes() {
        let (features, labels) = separable_training_set();
        let mut model = LogisticRegression::new();
        model.fit(&features, &labels).expect("fit");
        assert!(model.predict_probability(&[1.2, 0.6]) > 0.5);
        assert!(model.predict_probability(&[-1.2, -0.6]) < 0.5);
    }

    #[test]
    fn naive_bayes_separates_classes() {
        let (features, labels) = separable_training_set();
        let mut model = GaussianNaiveBayes::new();
        model.fit(&features, &labels).expect("fit");
        assert!(model.predict_probability(&[1.2, 0.6]) > 0.5);
        assert!(model.predict_probability(&[-1.2, -0.6]) < 0.5);
    }

    #[test]
    fn ensemble_is_deterministic_across_fits() {
        let (features, labels) = separable_training_set();
        let probe = [0.8, 0.3];

        let factory = default_model_factory();
        let mut first = factory();
        first.fit(&features, &labels).expect("fit");
        let mut second = factory();
        second.fit(&features, &labels).expect("fit");

        assert_eq!(
            first.predict_probability(&probe),
            second.predict_probability(&probe)
        );
    }

    #[test]
    fn ensemble_averages_member_probabilities() {
        let (features, labels) = separable_training_set();

        let mut logistic = LogisticRegression::new();
        logistic.fit(&features, &labels).expect("fit");
        let mut bayes = GaussianNaiveBayes::new();
        bayes.fit(&features, &labels).expect("fit");

        let probe = [0.8, 0.3];
        let expected =
            (logistic.predict_probability(&probe) + bayes.predict_probability(&probe)) / 2.0;

        let mut ensemble = default_model_factory()();
        ensemble.fit(&features, &labels).expect("fit");
        assert!((ensemble.predict_probability(&probe) - expected).abs() < 1e-12);
    }
}
