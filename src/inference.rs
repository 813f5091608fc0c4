use std::path::Path;

use crate::error::{ApiError, ModelError};
use crate::models::{
    ClassProbabilities, FeatureRecord, Outcome, PredictionResponse, CLASS_COUNT,
};

/// Whether this build carries the ONNX inference backend.
pub const INFERENCE_BACKEND_AVAILABLE: bool = cfg!(feature = "onnx");

/// Raw classifier output for a single record.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub class_index: usize,
    pub probabilities: Vec<f32>,
}

impl Classification {
    /// Maps class indices to outcome labels.
    pub fn into_prediction(self) -> Result<PredictionResponse, ModelError> {
        let prediction = Outcome::from_index(self.class_index).ok_or_else(|| {
            ModelError::UnexpectedOutput(format!("unknown class index {}", self.class_index))
        })?;

        let probabilities: [f32; CLASS_COUNT] =
            self.probabilities.as_slice().try_into().map_err(|_| {
                ModelError::UnexpectedOutput(format!(
                    "expected {} probabilities, got {}",
                    CLASS_COUNT,
                    self.probabilities.len()
                ))
            })?;

        Ok(PredictionResponse {
            prediction,
            probabilities: ClassProbabilities(probabilities),
        })
    }
}

pub trait Classifier: Send + Sync {
    fn classify(&self, record: &FeatureRecord) -> Result<Classification, ModelError>;
}

/// Process-wide state shared by every worker. Written once before the server starts.
#[derive(Default)]
pub struct AppState {
    model: Option<Box<dyn Classifier>>,
}

impl AppState {
    pub fn new(model: Option<Box<dyn Classifier>>) -> Self {
        Self { model }
    }

    pub fn with_model(model: impl Classifier + 'static) -> Self {
        Self::new(Some(Box::new(model)))
    }

    /// Loads the model at `path`. A failure is logged and leaves the state without a model.
    pub fn load(path: &Path) -> Self {
        tracing::info!("Loading model from: {}", path.display());

        match load_model(path) {
            Ok(model) => {
                tracing::info!("✅ CatBoost model loaded successfully");
                Self::new(Some(model))
            }
            Err(e) => {
                tracing::warn!("Error loading model: {}", e);
                Self::new(None)
            }
        }
    }

    pub fn model_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn classify(&self, record: &FeatureRecord) -> Result<Classification, ApiError> {
        let model = self.model.as_ref().ok_or(ApiError::ModelNotLoaded)?;
        Ok(model.classify(record)?)
    }
}

pub fn load_model(path: &Path) -> Result<Box<dyn Classifier>, ModelError> {
    if !INFERENCE_BACKEND_AVAILABLE {
        return Err(ModelError::BackendUnavailable);
    }
    if !path.exists() {
        return Err(ModelError::NotFound(path.display().to_string()));
    }

    #[cfg(feature = "onnx")]
    {
        Ok(Box::new(onnx::OnnxClassifier::load(path)?))
    }

    #[cfg(not(feature = "onnx"))]
    {
        Err(ModelError::BackendUnavailable)
    }
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxClassifier;

#[cfg(feature = "onnx")]
mod onnx {
    use std::path::Path;

    use tract_onnx::pb::ModelProto;
    use tract_onnx::prelude::*;

    use super::{Classification, Classifier};
    use crate::error::ModelError;
    use crate::models::{ClassProbabilities, FeatureRecord, CLASS_COUNT, FEATURE_COUNT};

    /// CatBoost classifier exported to ONNX, optimized once at load time.
    pub struct OnnxClassifier {
        plan: TypedRunnableModel<TypedModel>,
    }

    impl OnnxClassifier {
        pub fn load(path: &Path) -> Result<Self, ModelError> {
            let onnx = tract_onnx::onnx();
            let proto = onnx
                .proto_model_for_path(path)
                .map_err(|e| ModelError::Load(e.to_string()))?;
            let unzipped = unzipped_output_names(&proto);

            let mut model = onnx
                .model_for_proto_model(&proto)
                .map_err(|e| ModelError::Load(e.to_string()))?;
            if let Some(names) = unzipped {
                tracing::debug!("Reading outputs {:?} in place of ZipMap", names);
                model
                    .set_output_names(&names)
                    .map_err(|e| ModelError::Load(e.to_string()))?;
            }

            let plan = model
                .with_input_fact(0, f32::fact([1, FEATURE_COUNT]).into())
                .and_then(|model| model.into_optimized())
                .and_then(|model| model.into_runnable())
                .map_err(|e| ModelError::Load(e.to_string()))?;

            Ok(Self { plan })
        }
    }

    /// CatBoost classifier exports end in an `ai.onnx.ml` ZipMap, which tract cannot run.
    /// Returns the graph outputs with every ZipMap output replaced by the tensor it wraps,
    /// or `None` when the graph has no ZipMap output.
    fn unzipped_output_names(proto: &ModelProto) -> Option<Vec<String>> {
        let graph = proto.graph.as_ref()?;
        let mut rewired = false;

        let names: Vec<String> = graph
            .output
            .iter()
            .map(|output| {
                let zipped = graph
                    .node
                    .iter()
                    .find(|node| node.op_type == "ZipMap" && node.output.contains(&output.name))
                    .and_then(|node| node.input.first());
                match zipped {
                    Some(input) => {
                        rewired = true;
                        input.clone()
                    }
                    None => output.name.clone(),
                }
            })
            .collect();

        rewired.then_some(names)
    }

    impl Classifier for OnnxClassifier {
        fn classify(&self, record: &FeatureRecord) -> Result<Classification, ModelError> {
            let row = record
                .values()
                .as_slice()
                .ok_or_else(|| ModelError::Inference("feature row is not contiguous".into()))?;
            let input = Tensor::from_shape(&[1, FEATURE_COUNT], row)
                .map_err(|e| ModelError::Inference(e.to_string()))?;

            let outputs = self
                .plan
                .run(tvec!(input.into()))
                .map_err(|e| ModelError::Inference(e.to_string()))?;

            // CatBoost exports a label tensor (i64) and a probability tensor (f32).
            let mut label = None;
            let mut probabilities = None;
            for output in outputs.iter() {
                if label.is_none() && output.datum_type() == i64::datum_type() {
                    label = output
                        .as_slice::<i64>()
                        .ok()
                        .and_then(|values| values.first().copied());
                } else if probabilities.is_none()
                    && output.datum_type() == f32::datum_type()
                    && output.len() == CLASS_COUNT
                {
                    probabilities = output.as_slice::<f32>().ok().map(|values| values.to_vec());
                }
            }

            let probabilities = probabilities.ok_or_else(|| {
                ModelError::UnexpectedOutput(format!(
                    "no output with {} class probabilities",
                    CLASS_COUNT
                ))
            })?;

            let class_index = match label {
                Some(index) => usize::try_from(index).map_err(|_| {
                    ModelError::UnexpectedOutput(format!("negative class label {}", index))
                })?,
                None => {
                    let mut scores = [0.0f32; CLASS_COUNT];
                    scores.copy_from_slice(&probabilities);
                    ClassProbabilities(scores).argmax().index()
                }
            };

            Ok(Classification {
                class_index,
                probabilities,
            })
        }
    }

    #[cfg(test)]
    mod tests {
        use std::io::Write;

        use prost::Message;
        use tempfile::NamedTempFile;
        use tract_onnx::pb::attribute_proto::AttributeType;
        use tract_onnx::pb::tensor_shape_proto::{dimension, Dimension};
        use tract_onnx::pb::{
            type_proto, AttributeProto, GraphProto, ModelProto, NodeProto, OperatorSetIdProto,
            TensorProto, TensorShapeProto, TypeProto, ValueInfoProto,
        };

        use super::*;
        use crate::models::Outcome;

        const ONNX_FLOAT: i32 = 1;

        fn node(op_type: &str, inputs: &[&str], output: &str) -> NodeProto {
            NodeProto {
                op_type: op_type.to_string(),
                name: output.to_string(),
                input: inputs.iter().map(|i| i.to_string()).collect(),
                output: vec![output.to_string()],
                ..Default::default()
            }
        }

        fn int_attr(name: &str, value: i64) -> AttributeProto {
            AttributeProto {
                name: name.to_string(),
                r#type: AttributeType::Int as i32,
                i: value,
                ..Default::default()
            }
        }

        fn output(name: &str) -> ValueInfoProto {
            ValueInfoProto {
                name: name.to_string(),
                ..Default::default()
            }
        }

        /// input[1, 35] x weights[35, 3] -> Softmax -> ArgMax, optionally wrapped in ZipMap.
        /// Debtor scores Dropout, 2nd sem approved scores Graduate, 2nd sem enrolled scores Enrolled.
        fn write_model(outputs: &[&str], zipmap: bool) -> NamedTempFile {
            let mut weights = vec![0.0f32; FEATURE_COUNT * CLASS_COUNT];
            weights[13 * CLASS_COUNT + Outcome::Dropout.index()] = 1.0;
            weights[28 * CLASS_COUNT + Outcome::Graduate.index()] = 1.0;
            weights[26 * CLASS_COUNT + Outcome::Enrolled.index()] = 1.0;

            let mut argmax = node("ArgMax", &["probability_tensor"], "label");
            argmax.attribute = vec![int_attr("axis", 1), int_attr("keepdims", 0)];

            let mut nodes = vec![
                node("MatMul", &["input", "weights"], "logits"),
                node("Softmax", &["logits"], "probability_tensor"),
                argmax,
            ];
            if zipmap {
                let mut zip = node("ZipMap", &["probability_tensor"], "probabilities");
                zip.domain = "ai.onnx.ml".to_string();
                zip.attribute = vec![AttributeProto {
                    name: "classlabels_int64s".to_string(),
                    r#type: AttributeType::Ints as i32,
                    ints: vec![0, 1, 2],
                    ..Default::default()
                }];
                nodes.push(zip);
            }

            let dim = |value: i64| Dimension {
                value: Some(dimension::Value::DimValue(value)),
                ..Default::default()
            };
            let input = ValueInfoProto {
                name: "input".to_string(),
                r#type: Some(TypeProto {
                    value: Some(type_proto::Value::TensorType(type_proto::Tensor {
                        elem_type: ONNX_FLOAT,
                        shape: Some(TensorShapeProto {
                            dim: vec![dim(1), dim(FEATURE_COUNT as i64)],
                            ..Default::default()
                        }),
                        ..Default::default()
                    })),
                    ..Default::default()
                }),
                ..Default::default()
            };

            let model = ModelProto {
                ir_version: 7,
                opset_import: vec![
                    OperatorSetIdProto {
                        domain: String::new(),
                        version: 13,
                        ..Default::default()
                    },
                    OperatorSetIdProto {
                        domain: "ai.onnx.ml".to_string(),
                        version: 1,
                        ..Default::default()
                    },
                ],
                graph: Some(GraphProto {
                    name: "student_outcome".to_string(),
                    node: nodes,
                    initializer: vec![TensorProto {
                        name: "weights".to_string(),
                        dims: vec![FEATURE_COUNT as i64, CLASS_COUNT as i64],
                        data_type: ONNX_FLOAT,
                        float_data: weights,
                        ..Default::default()
                    }],
                    input: vec![input],
                    output: outputs.iter().map(|name| output(name)).collect(),
                    ..Default::default()
                }),
                ..Default::default()
            };

            let mut file = NamedTempFile::new().unwrap();
            file.write_all(&model.encode_to_vec()).unwrap();
            file
        }

        fn record(overrides: &[(usize, f64)]) -> FeatureRecord {
            let mut values = [0.0; FEATURE_COUNT];
            for &(column, value) in overrides {
                values[column] = value;
            }
            FeatureRecord::from_values(&values).unwrap()
        }

        #[test]
        fn reads_label_and_probability_outputs() {
            let file = write_model(&["label", "probability_tensor"], false);
            let classifier = OnnxClassifier::load(file.path()).unwrap();

            let response = classifier
                .classify(&record(&[(28, 5.0)]))
                .unwrap()
                .into_prediction()
                .unwrap();
            assert_eq!(response.prediction, Outcome::Graduate);
            assert_eq!(response.probabilities.argmax(), Outcome::Graduate);
            assert!((response.probabilities.sum() - 1.0).abs() < 1e-5);
        }

        #[test]
        fn falls_back_to_argmax_without_label_output() {
            let file = write_model(&["probability_tensor"], false);
            let classifier = OnnxClassifier::load(file.path()).unwrap();

            let classification = classifier.classify(&record(&[(13, 4.0)])).unwrap();
            assert_eq!(classification.class_index, Outcome::Dropout.index());
            assert_eq!(classification.probabilities.len(), CLASS_COUNT);
        }

        #[test]
        fn loads_zipmap_terminated_export() {
            let file = write_model(&["label", "probabilities"], true);
            let classifier = OnnxClassifier::load(file.path()).unwrap();

            let response = classifier
                .classify(&record(&[(26, 3.0)]))
                .unwrap()
                .into_prediction()
                .unwrap();
            assert_eq!(response.prediction, Outcome::Enrolled);
            assert!((response.probabilities.sum() - 1.0).abs() < 1e-5);
        }

        #[test]
        fn zipmap_outputs_are_rewired_to_their_input() {
            let file = write_model(&["label", "probabilities"], true);
            let proto = tract_onnx::onnx().proto_model_for_path(file.path()).unwrap();
            assert_eq!(
                unzipped_output_names(&proto),
                Some(vec!["label".to_string(), "probability_tensor".to_string()])
            );

            let plain = write_model(&["label", "probability_tensor"], false);
            let proto = tract_onnx::onnx().proto_model_for_path(plain.path()).unwrap();
            assert_eq!(unzipped_output_names(&proto), None);
        }
    }
}
