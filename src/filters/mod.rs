//! Operation module.
//!
//! Contains the operation registry, the closed set of operations and their
//! built-in kernels.

pub mod operation;
pub mod registry;
pub mod builtin;

pub use operation::{OpChain, Operation, OperationKind};
pub use registry::{Category, OperationDescriptor, OperationRegistry, RegistryBuilder};
