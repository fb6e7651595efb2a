//! Skein Stager
//!
//! Decides how the bytes behind a `workflow://` reference travel from the
//! producing task's host to the consuming task's host.
//!
//! `LINK`, `COPY`, `SCP` and `FTP` become lines of the consumer's launcher
//! script. `GRIDFTP` and `SKYCDS` are carried out by the stager itself through
//! a [`TransferService`], blocking until the transfer settles.

mod directive;
mod error;
mod select;
mod stager;
mod transfer;

pub use directive::{join_directive, render_directive};
pub use error::{StagingError, TransferError};
pub use select::{PROTOCOL_PREFERENCE, select_mover};
pub use stager::{Site, StagePlan, StageRequest, Stager};
pub use transfer::{HttpTransferService, TransferRequest, TransferService, TransferStatus};
