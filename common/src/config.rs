// Number of decimals carried by on-chain amounts and rates
pub const DECIMALS: u32 = 18;
// One whole coin in base units
pub const COIN_VALUE: i128 = 1_000_000_000_000_000_000;

// BLS key material sizes (BLS12-381, public keys in G1, signatures in G2)
pub const BLS_SECRET_KEY_SIZE: usize = 32;
pub const BLS_PUBLIC_KEY_SIZE: usize = 48;
pub const BLS_SIGNATURE_SIZE: usize = 96;

// Message signed to prove possession of a BLS key when none is provided
pub const BLS_VERIFICATION_MESSAGE: &str = "staking-bls-key-verification";

// Domain separation tag used for proof-of-possession signatures
pub const BLS_DOMAIN_SEPARATION_TAG: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

// Description limits enforced by the staking module
pub const MAX_NAME_LENGTH: usize = 140;
pub const MAX_IDENTITY_LENGTH: usize = 140;
pub const MAX_WEBSITE_LENGTH: usize = 140;
pub const MAX_SECURITY_CONTACT_LENGTH: usize = 140;
pub const MAX_DETAILS_LENGTH: usize = 280;

// A validator must always keep at least one registered BLS key
pub const MIN_VALIDATOR_BLS_KEYS: usize = 1;
