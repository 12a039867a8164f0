//! Default hyperparameter schemas of the built-in toolkit components.
//!
//! Each component declares its schema through [`Component`]; applications
//! register them once at start-up with [`register_builtin`].

mod bert;
mod data;
mod embedding;

pub use bert::{
    BertClassifier, BertEncoder, ClasStrategy, ClassifierSettings, DEFAULT_PRETRAINED_MODEL,
    encoder_raw,
};
pub use data::{CacheStrategy, DataIterator, DataIteratorSettings, LazyStrategy};
pub use embedding::{Embedding, EmbeddingSettings, InitFn};

use hparams_rs_config::{Component, ConfigError, RegistryBuilder, SchemaRegistry};
use log::debug;

/// Register every built-in component schema.
pub fn register_builtin(builder: RegistryBuilder) -> Result<RegistryBuilder, ConfigError> {
    let builder = builder
        .register_component::<Embedding>()?
        .register_component::<BertEncoder>()?
        .register_component::<BertClassifier>()?
        .register_component::<DataIterator>()?;
    debug!(
        "registered built-in components: {}, {}, {}, {}",
        Embedding::NAME,
        BertEncoder::NAME,
        BertClassifier::NAME,
        DataIterator::NAME
    );
    Ok(builder)
}

/// Registry holding only the built-in components.
pub fn builtin_registry() -> Result<SchemaRegistry, ConfigError> {
    Ok(register_builtin(RegistryBuilder::new())?.build())
}
