//! Remote sandbox RPC client contract.
//!
//! The sandbox itself — a remote ephemeral compute environment hosting a
//! filesystem, a shell, and a dynamic set of tool servers — is an opaque
//! vendor capability from this crate's point of view. We depend on nothing
//! but the operations the rest of the workspace actually calls:
//! initialize/reattach, code + shell execution, file I/O, glob/grep, and
//! path virtualization.
//!
//! [`HttpSandbox`] is the one reference implementation, speaking JSON over
//! HTTP to a configurable base URL. [`FakeSandbox`] is an in-memory double
//! used by the `agent` and `cli` crates' test suites.

mod client;
mod fake;
mod http;

pub use client::{
    BashResult, CodeResult, EditOutcome, GrepMatch, GrepMode, GrepOptions, RemoteSandbox,
    SandboxError,
};
pub use fake::FakeSandbox;
pub use http::HttpSandbox;
