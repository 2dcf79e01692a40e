pub mod finalize;
pub mod protocols;
pub mod registry;
pub mod transformer;

pub use finalize::{finalize_transaction, CodeChecker, IndexedTransform};
pub use protocols::{Erc20TransferTransformer, LiquidityTransformer, UniswapV2Transformer, UniswapV3Transformer};
pub use registry::TransformerRegistry;
pub use transformer::{RawTransform, Transformer, TransformContext};
