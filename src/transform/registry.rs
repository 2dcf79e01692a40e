use std::collections::HashMap;
use std::sync::Arc;

use super::protocols::{Erc20TransferTransformer, LiquidityTransformer, UniswapV2Transformer, UniswapV3Transformer};
use super::transformer::Transformer;

/// Name-keyed lookup from `Contract.transformer_name` to its `Transformer`
/// implementation, built once at startup.
pub struct TransformerRegistry {
    transformers: HashMap<&'static str, Arc<dyn Transformer>>,
}

impl TransformerRegistry {
    pub fn with_defaults() -> Self {
        let mut registry = Self { transformers: HashMap::new() };
        registry.register(Arc::new(UniswapV2Transformer));
        registry.register(Arc::new(UniswapV3Transformer));
        registry.register(Arc::new(Erc20TransferTransformer));
        registry.register(Arc::new(LiquidityTransformer));
        registry
    }

    pub fn register(&mut self, transformer: Arc<dyn Transformer>) {
        self.transformers.insert(transformer.name(), transformer);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Transformer>> {
        self.transformers.get(name).cloned()
    }
}

impl Default for TransformerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
