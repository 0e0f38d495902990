pub mod fingerprint;
pub mod identity;
pub mod severity;
pub mod signal;
pub mod status;

pub use fingerprint::Fingerprint;
pub use identity::AlertIdentity;
pub use severity::Severity;
pub use signal::AlertSignal;
pub use status::Status;
