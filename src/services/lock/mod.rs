pub mod acquire;
pub mod enforcement;
pub mod release;
pub mod sweeper;
pub mod token;

pub use acquire::{AcquireOutcome, LockAcquisitionService};
pub use enforcement::{
    enforce_application_lock, GrantedLock, LockEnforcer, LockRequestContext, ReadLockPolicy,
    RequestKind,
};
pub use release::LockReleaseService;
pub use token::{LockTokenCodec, VerifiedOwner, VerifiedRelease};
