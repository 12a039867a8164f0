//! BERT encoder and classifier hyperparameters.

use hparams_rs_config::{
    Component, ConfigAccessor, ConfigError, LeafSchema, SchemaNode, TreeSchema, TypeTag,
    fetch_subset,
};
use serde::Deserialize;
use serde_json::{Map, Value, json};

/// Pretrained model loaded when none is named.
pub const DEFAULT_PRETRAINED_MODEL: &str = "bert-base-uncased";

/// Transformer encoder with BERT embeddings.
pub struct BertEncoder;

impl Component for BertEncoder {
    const NAME: &'static str = "bert_encoder";

    fn default_schema() -> Result<SchemaNode, ConfigError> {
        let tree = SchemaNode::from_defaults(&json!({
            "embed": { "dim": 768, "name": "word_embeddings" },
            "vocab_size": 30522,
            "segment_embed": { "dim": 768, "name": "token_type_embeddings" },
            "type_vocab_size": 2,
            "position_embed": { "dim": 768, "name": "position_embeddings" },
            "position_size": 512,
            "encoder": {
                "dim": 768,
                "embedding_dropout": 0.1,
                "multihead_attention": {
                    "dropout_rate": 0.1,
                    "name": "self",
                    "num_heads": 12,
                    "num_units": 768,
                    "output_dim": 768,
                    "use_bias": true
                },
                "name": "encoder",
                "num_blocks": 12,
                "eps": 1e-12,
                "poswise_feedforward": {
                    "layers": [
                        {
                            "type": "Linear",
                            "kwargs": { "in_features": 768, "out_features": 3072, "bias": true }
                        },
                        { "type": "BertGELU" },
                        {
                            "type": "Linear",
                            "kwargs": { "in_features": 3072, "out_features": 768, "bias": true }
                        }
                    ],
                    "name": "ffn"
                },
                "residual_dropout": 0.1,
                "use_bert_config": true
            },
            "hidden_size": 768,
            "initializer": null,
            "name": "bert_encoder"
        }))?
        .into_tree()?;

        Ok(tree
            .child(
                "pretrained_model_name",
                LeafSchema::new(DEFAULT_PRETRAINED_MODEL).optional(),
            )
            .into())
    }
}

/// BERT encoder followed by a dropout and a logits layer.
pub struct BertClassifier;

impl Component for BertClassifier {
    const NAME: &'static str = "bert_classifier";

    fn default_schema() -> Result<SchemaNode, ConfigError> {
        let classifier = TreeSchema::new()
            .child("num_classes", LeafSchema::new(2))
            .child(
                "logit_layer_kwargs",
                LeafSchema::new(Value::Null).allow(TypeTag::Map),
            )
            .child(
                "clas_strategy",
                LeafSchema::new("cls_time").choices(["cls_time", "all_time", "time_wise"]),
            )
            .child(
                "max_seq_length",
                LeafSchema::new(Value::Null).allow(TypeTag::Int),
            )
            .child("dropout", LeafSchema::new(0.1))
            .child("name", LeafSchema::new("bert_classifier"));
        let encoder = BertEncoder::default_schema()?.into_tree()?;
        Ok(encoder.extend(classifier).into())
    }
}

/// How encoder outputs are turned into logits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClasStrategy {
    /// One class per sequence from the first (`CLS`) time step.
    ClsTime,
    /// One class per sequence from all time steps, padded to `max_seq_length`.
    AllTime,
    /// One class per time step.
    TimeWise,
}

/// Typed view of the classifier-specific part of a BERT classifier config.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClassifierSettings {
    pub num_classes: i64,
    pub logit_layer_kwargs: Option<Map<String, Value>>,
    pub clas_strategy: ClasStrategy,
    pub max_seq_length: Option<u64>,
    pub dropout: f64,
    pub name: String,
}

impl ClassifierSettings {
    /// Decode and check a classifier config.
    pub fn from_config(config: &ConfigAccessor) -> Result<Self, ConfigError> {
        let settings: Self = config.deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Cross-field rules the schema cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clas_strategy == ClasStrategy::AllTime && self.max_seq_length.is_none() {
            return Err(ConfigError::InvalidField {
                path: "max_seq_length".to_string(),
                message: "required when clas_strategy is all_time".to_string(),
            });
        }
        Ok(())
    }

    /// Whether a logits layer is appended on top of the encoder.
    pub fn has_logits_layer(&self) -> bool {
        self.num_classes > 0
    }

    /// Binary classifiers emit a single logit per prediction.
    pub fn is_binary(&self, encoder_dim: u64) -> bool {
        self.num_classes == 1 || (self.num_classes <= 0 && encoder_dim == 1)
    }

    /// Input width of the logits layer for an encoder of `encoder_output` width.
    pub fn logits_input_dim(&self, encoder_output: u64) -> Result<Option<u64>, ConfigError> {
        if !self.has_logits_layer() {
            return Ok(None);
        }
        match self.clas_strategy {
            ClasStrategy::AllTime => self
                .max_seq_length
                .map(|len| {
                    len.checked_mul(encoder_output)
                        .ok_or_else(|| ConfigError::InvalidField {
                            path: "max_seq_length".to_string(),
                            message: format!(
                                "{len} time steps of width {encoder_output} overflow the logits input"
                            ),
                        })
                })
                .transpose(),
            ClasStrategy::ClsTime | ClasStrategy::TimeWise => Ok(Some(encoder_output)),
        }
    }

    /// Final dimension of the logits.
    pub fn output_size(&self) -> Result<u64, ConfigError> {
        u64::try_from(self.num_classes)
            .ok()
            .filter(|classes| *classes >= 1)
            .ok_or_else(|| ConfigError::InvalidField {
                path: "num_classes".to_string(),
                message: "output size is undefined without a logits layer".to_string(),
            })
    }
}

/// The part of a classifier raw config that its encoder understands.
pub fn encoder_raw(raw: Option<&Value>) -> Result<Value, ConfigError> {
    Ok(fetch_subset(raw, &BertEncoder::default_schema()?))
}
