// Fee authorization module entry point

pub mod fee_claim;

pub use fee_claim::{fee_claim_digest, sign_fee_claim, FeeAuthorizer, DEFAULT_FEE_DOMAIN_TAG};
