mod client;
mod upload;

pub use client::{
    ApiErrorClass, DiskInfo, MoveOutcome, OperationStatus, TransferLink, YadiskClient, YadiskError,
};
pub use upload::{ContentRange, RangeError};
