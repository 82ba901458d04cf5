pub mod aggregator;
pub mod codecs;

pub use aggregator::{AggregateFill, ResolvedLeg, ResolvedRoute, SanitizedSwaps, SwapAggregator};
pub use codecs::{CodecRegistry, RfqCodec, SwapCodec, SwapFailure, SwapQuote, UniswapV2Codec};
