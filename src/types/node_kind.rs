//! Kind of a pipeline step and its catalogue entry (label, default parameters,
//! default metrics, output requirement).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Open key-value map used for node parameters, metrics and outputs.
pub type ParamMap = serde_json::Map<String, Value>;

/// Kind of a pipeline step.
///
/// Serialized as its snake_case name. Unknown names round-trip through
/// [NodeKind::Other], which is also the "new node" fallback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
  DataCollection,
  DataValidation,
  FeatureEngineering,
  DataSplit,
  ModelTraining,
  ModelEvaluation,
  ModelAnalysis,
  ModelVersioning,
  ModelDeployment,
  Monitoring,
  DataLoader,
  Preprocessor,
  ModelTrainer,
  Other(String),
}

/// A node output field that must be present (and truthy) before the node may
/// be marked completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputRequirement {
  /// Key looked up inside the node's `output` object.
  pub field: &'static str,
  /// Failure message stored on the node when the field is missing.
  pub message: &'static str,
}

const DATA_LOADER_OUTPUT: OutputRequirement = OutputRequirement {
  field: "data",
  message: "data loader output is missing `data`",
};

const PREPROCESSOR_OUTPUT: OutputRequirement = OutputRequirement {
  field: "processedData",
  message: "preprocessor output is missing `processedData`",
};

const MODEL_TRAINER_OUTPUT: OutputRequirement = OutputRequirement {
  field: "model",
  message: "model trainer output is missing `model`",
};

impl NodeKind {
  /// The ten MLOps step kinds offered by the pipeline palette, in canonical
  /// pipeline order.
  pub const PALETTE: [NodeKind; 10] = [
    NodeKind::DataCollection,
    NodeKind::DataValidation,
    NodeKind::FeatureEngineering,
    NodeKind::DataSplit,
    NodeKind::ModelTraining,
    NodeKind::ModelEvaluation,
    NodeKind::ModelAnalysis,
    NodeKind::ModelVersioning,
    NodeKind::ModelDeployment,
    NodeKind::Monitoring,
  ];

  pub fn as_str(&self) -> &str {
    match self {
      NodeKind::DataCollection => "data_collection",
      NodeKind::DataValidation => "data_validation",
      NodeKind::FeatureEngineering => "feature_engineering",
      NodeKind::DataSplit => "data_split",
      NodeKind::ModelTraining => "model_training",
      NodeKind::ModelEvaluation => "model_evaluation",
      NodeKind::ModelAnalysis => "model_analysis",
      NodeKind::ModelVersioning => "model_versioning",
      NodeKind::ModelDeployment => "model_deployment",
      NodeKind::Monitoring => "monitoring",
      NodeKind::DataLoader => "data_loader",
      NodeKind::Preprocessor => "preprocessor",
      NodeKind::ModelTrainer => "model_trainer",
      NodeKind::Other(name) => name,
    }
  }

  /// Display label given to freshly created nodes of this kind.
  pub fn default_label(&self) -> &'static str {
    match self {
      NodeKind::DataCollection => "Data Collection",
      NodeKind::DataValidation => "Data Validation",
      NodeKind::FeatureEngineering => "Feature Engineering",
      NodeKind::DataSplit => "Data Split",
      NodeKind::ModelTraining => "Model Training",
      NodeKind::ModelEvaluation => "Model Evaluation",
      NodeKind::ModelAnalysis => "Model Analysis",
      NodeKind::ModelVersioning => "Model Versioning",
      NodeKind::ModelDeployment => "Model Deployment",
      NodeKind::Monitoring => "Monitoring",
      NodeKind::DataLoader => "Data Loader",
      NodeKind::Preprocessor => "Preprocessor",
      NodeKind::ModelTrainer => "Model Trainer",
      NodeKind::Other(_) => "New Node",
    }
  }

  /// Default parameter set for freshly created nodes of this kind.
  pub fn default_parameters(&self) -> ParamMap {
    let value = match self {
      NodeKind::DataCollection => json!({
        "source": "Local",
        "format": "Csv",
        "version": "latest"
      }),
      NodeKind::DataValidation => json!({
        "checks": ["missing_values", "duplicates", "data_type"],
        "threshold": 0.8
      }),
      NodeKind::FeatureEngineering => json!({
        "methods": ["scaling", "encoding", "selection"],
        "feature_selection": "correlation"
      }),
      NodeKind::DataSplit => json!({
        "train": 0.7,
        "validation": 0.15,
        "test": 0.15,
        "random_state": 42
      }),
      NodeKind::ModelTraining => json!({
        "model": "xgboost",
        "epochs": 100,
        "batch_size": 32,
        "learning_rate": 0.001
      }),
      NodeKind::ModelEvaluation => json!({
        "metrics": ["accuracy", "precision", "recall", "f1"],
        "cross_validation": 5
      }),
      NodeKind::ModelAnalysis => json!({
        "analysis_type": ["feature_importance", "shap_values"],
        "visualization": true
      }),
      NodeKind::ModelVersioning => json!({
        "storage": "mlflow",
        "tags": ["production", "latest"]
      }),
      NodeKind::ModelDeployment => json!({
        "target": "production",
        "version": "1.0",
        "platform": "kubernetes"
      }),
      NodeKind::Monitoring => json!({
        "metrics": ["performance", "drift"],
        "interval": "1h"
      }),
      NodeKind::DataLoader
      | NodeKind::Preprocessor
      | NodeKind::ModelTrainer
      | NodeKind::Other(_) => json!({}),
    };
    into_map(value)
  }

  /// Display-only metrics attached to freshly created nodes of this kind.
  pub fn default_metrics(&self) -> ParamMap {
    let value = match self {
      NodeKind::DataCollection => json!({ "Data Size": "2.3GB", "Records": "1.2M" }),
      NodeKind::DataValidation => json!({ "Validity": "98.5%", "Missing Rate": "0.2%" }),
      NodeKind::FeatureEngineering => json!({
        "Selected Features": "42",
        "Processing Time": "45s"
      }),
      NodeKind::ModelTraining => json!({
        "Train Loss": "0.234",
        "Val Loss": "0.245",
        "Train Acc": "0.892",
        "Val Acc": "0.885"
      }),
      NodeKind::ModelEvaluation => json!({
        "Test Acc": "0.883",
        "F1 Score": "0.875",
        "AUC": "0.912"
      }),
      NodeKind::ModelAnalysis => json!({ "Top Feature": "age", "Impact Score": "0.324" }),
      NodeKind::ModelDeployment => json!({ "Response Time": "120ms", "TPS": "1000" }),
      NodeKind::Monitoring => json!({ "Accuracy Drift": "0.015", "Avg Latency": "85ms" }),
      _ => json!({}),
    };
    into_map(value)
  }

  /// Output field checked at 100% progress, if this kind has one.
  pub fn output_requirement(&self) -> Option<OutputRequirement> {
    match self {
      NodeKind::DataLoader => Some(DATA_LOADER_OUTPUT),
      NodeKind::Preprocessor => Some(PREPROCESSOR_OUTPUT),
      NodeKind::ModelTrainer => Some(MODEL_TRAINER_OUTPUT),
      _ => None,
    }
  }
}

fn into_map(value: Value) -> ParamMap {
  match value {
    Value::Object(map) => map,
    _ => ParamMap::new(),
  }
}

impl From<String> for NodeKind {
  fn from(name: String) -> Self {
    match name.as_str() {
      "data_collection" => NodeKind::DataCollection,
      "data_validation" => NodeKind::DataValidation,
      "feature_engineering" => NodeKind::FeatureEngineering,
      "data_split" => NodeKind::DataSplit,
      "model_training" => NodeKind::ModelTraining,
      "model_evaluation" => NodeKind::ModelEvaluation,
      "model_analysis" => NodeKind::ModelAnalysis,
      "model_versioning" => NodeKind::ModelVersioning,
      "model_deployment" => NodeKind::ModelDeployment,
      "monitoring" => NodeKind::Monitoring,
      "data_loader" => NodeKind::DataLoader,
      "preprocessor" => NodeKind::Preprocessor,
      "model_trainer" => NodeKind::ModelTrainer,
      _ => NodeKind::Other(name),
    }
  }
}

impl From<&str> for NodeKind {
  fn from(name: &str) -> Self {
    NodeKind::from(name.to_string())
  }
}

impl From<NodeKind> for String {
  fn from(kind: NodeKind) -> Self {
    match kind {
      NodeKind::Other(name) => name,
      other => other.as_str().to_string(),
    }
  }
}

impl fmt::Display for NodeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
