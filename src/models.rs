use ndarray::Array2;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

pub const FEATURE_COUNT: usize = 35;

/// Column order the model was trained with. Request vectors are read in this order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "Marital status",
    "Application mode",
    "Application order",
    "Course",
    "Daytime/evening attendance",
    "Previous qualification",
    "Nacionality",
    "Mother's qualification",
    "Father's qualification",
    "Mother's occupation",
    "Father's occupation",
    "Displaced",
    "Educational special needs",
    "Debtor",
    "Tuition fees up to date",
    "Gender",
    "Scholarship holder",
    "Age at enrollment",
    "International",
    "Curricular units 1st sem (credited)",
    "Curricular units 1st sem (enrolled)",
    "Curricular units 1st sem (evaluations)",
    "Curricular units 1st sem (approved)",
    "Curricular units 1st sem (grade)",
    "Curricular units 1st sem (without evaluations)",
    "Curricular units 2nd sem (credited)",
    "Curricular units 2nd sem (enrolled)",
    "Curricular units 2nd sem (evaluations)",
    "Curricular units 2nd sem (approved)",
    "Curricular units 2nd sem (grade)",
    "Curricular units 2nd sem (without evaluations)",
    "Unemployment rate",
    "Inflation rate",
    "GDP",
    "Application year",
];

/// Predicted outcome for a student. Discriminants are the model's class indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Dropout = 0,
    Graduate = 1,
    Enrolled = 2,
}

impl Outcome {
    pub const ALL: [Outcome; 3] = [Outcome::Dropout, Outcome::Graduate, Outcome::Enrolled];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Outcome::Dropout => "Dropout",
            Outcome::Graduate => "Graduate",
            Outcome::Enrolled => "Enrolled",
        }
    }
}

pub const CLASS_COUNT: usize = Outcome::ALL.len();

/// A single labeled row ready for inference.
#[derive(Debug, Clone)]
pub struct FeatureRecord {
    values: Array2<f32>,
}

impl FeatureRecord {
    /// Returns `None` unless exactly `FEATURE_COUNT` values are given.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.len() != FEATURE_COUNT {
            return None;
        }
        let row: Vec<f32> = values.iter().map(|&v| v as f32).collect();
        Array2::from_shape_vec((1, FEATURE_COUNT), row)
            .ok()
            .map(|values| Self { values })
    }

    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        let column = FEATURE_NAMES.iter().position(|n| *n == name)?;
        self.values.get((0, column)).copied()
    }
}

/// Per-class probabilities, serialized as a label-keyed object in class-index order.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassProbabilities(pub [f32; CLASS_COUNT]);

impl ClassProbabilities {
    pub fn get(&self, outcome: Outcome) -> f32 {
        self.0[outcome.index()]
    }

    pub fn sum(&self) -> f32 {
        self.0.iter().sum()
    }

    /// Class with the highest probability. Ties go to the lowest index.
    pub fn argmax(&self) -> Outcome {
        let mut best = Outcome::Dropout;
        for outcome in Outcome::ALL {
            if self.get(outcome) > self.get(best) {
                best = outcome;
            }
        }
        best
    }
}

impl Serialize for ClassProbabilities {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(CLASS_COUNT))?;
        for outcome in Outcome::ALL {
            map.serialize_entry(outcome.label(), &self.get(outcome))?;
        }
        map.end()
    }
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub features: Option<Vec<f64>>,
}

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub prediction: Outcome,
    pub probabilities: ClassProbabilities,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Ok,
    Error,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub model_loaded: bool,
    pub catboost_available: bool,
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub model_type: &'static str,
    pub input_features: usize,
    pub target_classes: Vec<&'static str>,
    pub feature_names: &'static [&'static str],
}

impl ModelInfo {
    pub fn current() -> Self {
        Self {
            model_type: "CatBoost",
            input_features: FEATURE_COUNT,
            target_classes: Outcome::ALL.iter().map(|o| o.label()).collect(),
            feature_names: &FEATURE_NAMES,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}
